//! Bound value encoding for PostgreSQL.
//!
//! tokio-postgres sends parameters in binary and checks each Rust type
//! against the statement's parameter type. A [`BoundValue`] is therefore
//! converted against the type the server inferred for its placeholder:
//! integers are narrowed to `int2`/`int4`, text is parsed into numeric,
//! temporal, uuid and json columns, and NULL is accepted for any type.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::error::{MigrateError, Result};
use crate::typemap::{parse_bool_literal, BoundValue};

/// One parameter encoded for the target column type.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum PgParam {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Numeric(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl PgParam {
    /// Encode `value` for a placeholder of type `ty`.
    ///
    /// # Errors
    ///
    /// `MigrateError::Bind` when the value does not fit the column type,
    /// e.g. `70000` into `int2` or `"abc"` into `int4`.
    pub(super) fn encode(field: &str, value: &BoundValue, ty: &Type) -> Result<Self> {
        let param = match value {
            BoundValue::Null(_) => PgParam::Null,
            BoundValue::Int(i) => from_int(field, *i, ty)?,
            BoundValue::Bool(b) => match *ty {
                Type::INT2 => PgParam::I16(i16::from(*b)),
                Type::INT4 => PgParam::I32(i32::from(*b)),
                Type::INT8 => PgParam::I64(i64::from(*b)),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => {
                    PgParam::Text(if *b { "1" } else { "0" }.to_string())
                }
                _ => PgParam::Bool(*b),
            },
            BoundValue::Text(s) => from_text(field, s, ty)?,
            BoundValue::Bytes(b) => match *ty {
                Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::JSON | Type::JSONB => {
                    let s = String::from_utf8(b.clone())
                        .map_err(|_| MigrateError::bind(field, "binary value is not valid UTF-8"))?;
                    from_text(field, &s, ty)?
                }
                _ => PgParam::Bytes(b.clone()),
            },
        };
        Ok(param)
    }
}

fn out_of_range(field: &str, value: i64, ty: &Type) -> MigrateError {
    MigrateError::bind(field, format!("{} is out of range for {}", value, ty.name()))
}

fn from_int(field: &str, i: i64, ty: &Type) -> Result<PgParam> {
    let param = match *ty {
        Type::INT2 => PgParam::I16(i16::try_from(i).map_err(|_| out_of_range(field, i, ty))?),
        Type::INT4 => PgParam::I32(i32::try_from(i).map_err(|_| out_of_range(field, i, ty))?),
        Type::FLOAT4 => PgParam::F32(i as f32),
        Type::FLOAT8 => PgParam::F64(i as f64),
        Type::NUMERIC => PgParam::Numeric(Decimal::from(i)),
        Type::BOOL => PgParam::Bool(i != 0),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgParam::Text(i.to_string()),
        _ => PgParam::I64(i),
    };
    Ok(param)
}

fn from_text(field: &str, s: &str, ty: &Type) -> Result<PgParam> {
    let invalid = || MigrateError::bind(field, format!("'{}' is not a valid {}", s, ty.name()));
    let t = s.trim();
    let param = match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 => {
            let i = t.parse::<i64>().map_err(|_| invalid())?;
            from_int(field, i, ty)?
        }
        Type::FLOAT4 => PgParam::F32(t.parse().map_err(|_| invalid())?),
        Type::FLOAT8 => PgParam::F64(t.parse().map_err(|_| invalid())?),
        Type::NUMERIC => PgParam::Numeric(t.parse().map_err(|_| invalid())?),
        Type::BOOL => PgParam::Bool(parse_bool_literal(t).ok_or_else(invalid)?),
        Type::UUID => PgParam::Uuid(t.parse().map_err(|_| invalid())?),
        Type::DATE => PgParam::Date(NaiveDate::parse_from_str(t, "%Y-%m-%d").map_err(|_| invalid())?),
        Type::TIME => PgParam::Time(
            NaiveTime::parse_from_str(t, "%H:%M:%S%.f").map_err(|_| invalid())?,
        ),
        Type::TIMESTAMP => PgParam::Timestamp(parse_naive_datetime(t).ok_or_else(invalid)?),
        Type::TIMESTAMPTZ => PgParam::TimestampTz(
            DateTime::parse_from_rfc3339(t)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| parse_naive_datetime(t).map(|dt| dt.and_utc()))
                .ok_or_else(invalid)?,
        ),
        Type::JSON | Type::JSONB => PgParam::Json(serde_json::from_str(s).map_err(|_| invalid())?),
        Type::BYTEA => PgParam::Bytes(s.as_bytes().to_vec()),
        _ => PgParam::Text(s.to_string()),
    };
    Ok(param)
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl ToSql for PgParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            PgParam::Null => Ok(IsNull::Yes),
            PgParam::Bool(v) => v.to_sql(ty, out),
            PgParam::I16(v) => v.to_sql(ty, out),
            PgParam::I32(v) => v.to_sql(ty, out),
            PgParam::I64(v) => v.to_sql(ty, out),
            PgParam::F32(v) => v.to_sql(ty, out),
            PgParam::F64(v) => v.to_sql(ty, out),
            PgParam::Numeric(v) => v.to_sql(ty, out),
            PgParam::Text(v) => v.to_sql(ty, out),
            PgParam::Bytes(v) => v.to_sql(ty, out),
            PgParam::Uuid(v) => v.to_sql(ty, out),
            PgParam::Date(v) => v.to_sql(ty, out),
            PgParam::Time(v) => v.to_sql(ty, out),
            PgParam::Timestamp(v) => v.to_sql(ty, out),
            PgParam::TimestampTz(v) => v.to_sql(ty, out),
            PgParam::Json(v) => v.to_sql(ty, out),
        }
    }

    // Variants are chosen per column type in `encode`; anything left over
    // (enums, domains, citext) is sent as text.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
