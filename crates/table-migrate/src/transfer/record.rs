//! Record transformer: source row + field mappings → destination record.

use crate::core::schema::FieldMapping;
use crate::core::value::{SourceRow, SqlValue};
use crate::error::{MigrateError, Result};
use crate::typemap::{BindingKind, BoundValue};

/// One destination field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetField {
    /// Destination column name.
    pub name: String,
    /// Value as read from the source, not yet coerced.
    pub value: SqlValue,
    /// How the value will be bound.
    pub kind: BindingKind,
}

/// The ordered fields of one INSERT, one per field mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetRecord {
    pub fields: Vec<TargetField>,
}

impl TargetRecord {
    /// Coerce every field to its binding kind, in order.
    ///
    /// # Errors
    ///
    /// The first `MigrateError::Bind` encountered.
    pub fn bind(&self) -> Result<Vec<BoundValue>> {
        self.fields
            .iter()
            .map(|f| f.kind.coerce(&f.name, &f.value))
            .collect()
    }
}

/// Map one source row onto the destination fields of `mappings`.
///
/// The engine selects exactly the mapped source fields, so every lookup is
/// expected to hit. A miss is reported as an error for the row rather than a
/// panic.
pub fn transform(row: &SourceRow, mappings: &[FieldMapping]) -> Result<TargetRecord> {
    let fields = mappings
        .iter()
        .map(|m| {
            let value = row.get(&m.source_field).cloned().ok_or_else(|| {
                MigrateError::bind(
                    &m.target_field,
                    format!("source row has no field '{}'", m.source_field),
                )
            })?;
            Ok(TargetField {
                name: m.target_field.clone(),
                value,
                kind: BindingKind::resolve(&m.field_type),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TargetRecord { fields })
}
