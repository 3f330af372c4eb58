//! Insert and update validation against a [`Schema`]

use crate::{ColumnSpec, RowData, Schema, TabulaResult, ValidationError, Value};

/// What to do with data keys that are not schema columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownColumnPolicy {
    /// Fail with `UnknownColumn`.
    #[default]
    Reject,
    /// Silently drop the key.
    Drop,
}

/// Validate a full row for insert, rejecting unknown columns.
pub fn validate_for_insert(schema: &Schema, data: &RowData) -> TabulaResult<RowData> {
    validate_for_insert_with(schema, data, UnknownColumnPolicy::Reject)
}

/// Validate a partial row for update, rejecting unknown columns.
pub fn validate_for_update(schema: &Schema, data: &RowData) -> TabulaResult<RowData> {
    validate_for_update_with(schema, data, UnknownColumnPolicy::Reject)
}

/// Validate and complete a row for insert.
///
/// Columns are visited in declaration order. Absent (or explicitly null)
/// columns take their default, are left to the backend when auto-incremented,
/// fail with `MissingColumn` when `not_null`, and are set to null otherwise.
/// The result holds every schema column except pending auto-increments.
pub fn validate_for_insert_with(
    schema: &Schema,
    data: &RowData,
    policy: UnknownColumnPolicy,
) -> TabulaResult<RowData> {
    check_unknown(schema, data, policy)?;

    let mut row = RowData::new();
    for column in schema.iter() {
        let spec = &column.spec;
        match data.get(&column.name).filter(|v| !v.is_null()) {
            Some(value) => {
                let value = check_value(&column.name, spec, value)?;
                row.insert(column.name.clone(), value);
            }
            None => {
                if let Some(default) = &spec.default {
                    let value = default.resolve();
                    let value = if value.is_null() {
                        if spec.not_null {
                            return Err(missing(&column.name));
                        }
                        Value::Null
                    } else {
                        check_value(&column.name, spec, &value)?
                    };
                    row.insert(column.name.clone(), value);
                } else if spec.auto_increment {
                    continue;
                } else if spec.not_null {
                    return Err(missing(&column.name));
                } else {
                    row.insert(column.name.clone(), Value::Null);
                }
            }
        }
    }
    Ok(row)
}

/// Validate the columns present in a partial row. Absence is always legal.
pub fn validate_for_update_with(
    schema: &Schema,
    data: &RowData,
    policy: UnknownColumnPolicy,
) -> TabulaResult<RowData> {
    check_unknown(schema, data, policy)?;

    let mut partial = RowData::new();
    for column in schema.iter() {
        let Some(value) = data.get(&column.name) else {
            continue;
        };
        let value = if value.is_null() {
            if column.spec.not_null {
                return Err(ValidationError::InvalidType {
                    column: column.name.clone(),
                    expected: column.spec.data_type.to_string(),
                    found: value.data_type().to_string(),
                }
                .into());
            }
            Value::Null
        } else {
            check_value(&column.name, &column.spec, value)?
        };
        partial.insert(column.name.clone(), value);
    }
    Ok(partial)
}

/// Type, option and custom checks for a single non-null value.
fn check_value(column: &str, spec: &ColumnSpec, value: &Value) -> TabulaResult<Value> {
    let coerced = spec
        .data_type
        .coerce(value)
        .ok_or_else(|| ValidationError::InvalidType {
            column: column.to_string(),
            expected: spec.data_type.to_string(),
            found: value.data_type().to_string(),
        })?;

    if let Some(options) = &spec.options {
        let rendered = coerced.to_string();
        if !options.iter().any(|o| *o == rendered) {
            return Err(ValidationError::InvalidOption {
                column: column.to_string(),
                value: rendered,
                allowed: options.clone(),
            }
            .into());
        }
    }

    if let Some(check) = &spec.check {
        check(&coerced).map_err(|reason| ValidationError::CheckFailed {
            column: column.to_string(),
            reason,
        })?;
    }

    Ok(coerced)
}

fn check_unknown(schema: &Schema, data: &RowData, policy: UnknownColumnPolicy) -> TabulaResult<()> {
    if policy == UnknownColumnPolicy::Drop {
        return Ok(());
    }
    match data.keys().find(|name| schema.get(name).is_none()) {
        Some(name) => Err(ValidationError::UnknownColumn {
            column: name.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

fn missing(column: &str) -> crate::TabulaError {
    ValidationError::MissingColumn {
        column: column.to_string(),
    }
    .into()
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
