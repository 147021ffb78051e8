//! Type coercion registry.
//!
//! Maps a field's semantic type tag to a [`BindingKind`], and converts source
//! values to the shape that kind binds as. Resolution is total: any tag that
//! is not `int`, `boolean`, `blob` or `clob` binds as a string. Value shape is
//! only checked at bind time, so a value that cannot be coerced fails just
//! the row it belongs to.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::core::schema::FieldType;
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// How a value is encoded when bound into the destination INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    String,
    Int,
    Boolean,
    LargeObject,
}

impl BindingKind {
    /// Resolve the binding kind for a type tag.
    pub fn resolve(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::String => BindingKind::String,
            FieldType::Int => BindingKind::Int,
            FieldType::Boolean => BindingKind::Boolean,
            FieldType::Blob | FieldType::Clob => BindingKind::LargeObject,
            // Unknown tags fall through to string binding.
            FieldType::Other(_) => BindingKind::String,
        }
    }

    /// Coerce a source value into the shape this kind binds as.
    ///
    /// # Errors
    ///
    /// `MigrateError::Bind` when the value cannot be represented, e.g. text
    /// that is not an integer under [`BindingKind::Int`].
    pub fn coerce(self, field: &str, value: &SqlValue) -> Result<BoundValue> {
        if value.is_null() {
            return Ok(BoundValue::Null(self));
        }
        let bound = match self {
            BindingKind::String => BoundValue::Text(to_text(field, value)?),
            BindingKind::Int => BoundValue::Int(to_int(field, value)?),
            BindingKind::Boolean => BoundValue::Bool(to_bool(field, value)?),
            BindingKind::LargeObject => BoundValue::Bytes(match value {
                SqlValue::Bytes(b) => b.clone(),
                other => to_text(field, other)?.into_bytes(),
            }),
        };
        Ok(bound)
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingKind::String => "string",
            BindingKind::Int => "int",
            BindingKind::Boolean => "boolean",
            BindingKind::LargeObject => "large_object",
        };
        f.write_str(name)
    }
}

/// A value ready to be handed to a driver's bind call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundValue {
    /// NULL, carrying the kind it would have been bound as.
    Null(BindingKind),
    Text(String),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
}

fn mismatch(field: &str, value: &SqlValue, kind: BindingKind) -> MigrateError {
    MigrateError::bind(
        field,
        format!("{} value cannot be bound as {}", value.kind_name(), kind),
    )
}

fn utf8(field: &str, bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| MigrateError::bind(field, "binary value is not valid UTF-8"))
}

fn to_text(field: &str, value: &SqlValue) -> Result<String> {
    let text = match value {
        SqlValue::Null => String::new(),
        SqlValue::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Decimal(d) => d.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Bytes(b) => utf8(field, b)?,
        SqlValue::Uuid(u) => u.hyphenated().to_string(),
        SqlValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        SqlValue::DateTimeOffset(dt) => dt.to_rfc3339(),
        SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        SqlValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
    };
    Ok(text)
}

fn to_int(field: &str, value: &SqlValue) -> Result<i64> {
    let parse = |s: &str| {
        s.trim().parse::<i64>().map_err(|_| {
            MigrateError::bind(field, format!("'{}' is not an integer", s.trim()))
        })
    };
    match value {
        SqlValue::Int(i) => Ok(*i),
        SqlValue::Bool(b) => Ok(i64::from(*b)),
        SqlValue::Text(s) => parse(s),
        SqlValue::Bytes(b) => parse(&utf8(field, b)?),
        SqlValue::Float(f) if f.fract() == 0.0 && f.is_finite() => f
            .to_i64()
            .ok_or_else(|| MigrateError::bind(field, format!("{} is out of integer range", f))),
        SqlValue::Decimal(d) if d.fract().is_zero() => d
            .to_i64()
            .ok_or_else(|| MigrateError::bind(field, format!("{} is out of integer range", d))),
        other => Err(mismatch(field, other, BindingKind::Int)),
    }
}

/// Recognized boolean spellings, case-insensitive.
pub(crate) fn parse_bool_literal(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool(field: &str, s: &str) -> Result<bool> {
    parse_bool_literal(s).ok_or_else(|| {
        MigrateError::bind(field, format!("'{}' is not a boolean", s.trim().to_lowercase()))
    })
}

fn to_bool(field: &str, value: &SqlValue) -> Result<bool> {
    match value {
        SqlValue::Bool(b) => Ok(*b),
        SqlValue::Int(i) => Ok(*i != 0),
        SqlValue::Float(f) => Ok(*f != 0.0),
        SqlValue::Decimal(d) => Ok(!d.is_zero()),
        SqlValue::Text(s) => parse_bool(field, s),
        // A single 0x00/0x01 byte, as binary(1) flag columns hold.
        SqlValue::Bytes(b) if b.len() == 1 && b[0] <= 1 => Ok(b[0] == 1),
        SqlValue::Bytes(b) => parse_bool(field, &utf8(field, b)?),
        other => Err(mismatch(field, other, BindingKind::Boolean)),
    }
}
