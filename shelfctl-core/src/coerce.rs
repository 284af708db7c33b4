//! Value coercion
//!
//! Turns the positional, stringly-typed payload typed by an operator into a
//! typed `FieldMap`. Arity is checked before any parsing, and the first bad
//! column stops the run.

use chrono::NaiveDate;

use crate::error::{Result, TableError};
use crate::schema::{Column, ColumnType, EntitySchema};
use crate::value::{FieldMap, Value, DATE_FORMAT};

/// Zip raw values onto `schema.columns` in declaration order and coerce each.
///
/// # Errors
///
/// - `ArityMismatch` when the value count differs from the column count
/// - `TypeCoercion` for an unparseable integer
/// - `InvalidDateFormat` for a date that is not `YYYY-MM-DD`
pub fn coerce<S: AsRef<str>>(schema: &EntitySchema, raw: &[S]) -> Result<FieldMap> {
    if raw.len() != schema.columns.len() {
        return Err(TableError::ArityMismatch {
            table: schema.name.to_owned(),
            expected: schema.columns.len(),
            actual: raw.len(),
        });
    }

    let mut fields = FieldMap::new();
    for (column, value) in schema.columns.iter().zip(raw) {
        fields.insert(column.name, coerce_value(column, value.as_ref())?);
    }
    Ok(fields)
}

/// Coerce a single raw value for `column`
pub fn coerce_value(column: &Column, raw: &str) -> Result<Value> {
    let raw = raw.trim();

    if column.nullable && raw.is_empty() {
        return Ok(Value::Null);
    }

    match column.ty {
        ColumnType::Integer => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| TableError::TypeCoercion {
                column: column.name.to_owned(),
                expected: ColumnType::Integer,
                value: raw.to_owned(),
            }),
        ColumnType::Text => Ok(Value::Text(raw.to_owned())),
        ColumnType::Date => parse_date(raw)
            .map(Value::Date)
            .ok_or_else(|| TableError::InvalidDateFormat {
                column: column.name.to_owned(),
                value: raw.to_owned(),
            }),
    }
}

/// Coerce a record id with the primary key column's type.
///
/// An id that cannot be coerced cannot match any row, so it is reported as
/// `RecordNotFound` rather than a coercion failure.
pub fn coerce_record_id(schema: &EntitySchema, id: &str) -> Result<Value> {
    let pk = schema.primary_key_column();
    match coerce_value(pk, id) {
        Ok(value) if !value.is_null() => Ok(value),
        _ => Err(TableError::record_not_found(schema.name, id.trim())),
    }
}

/// Split a comma-separated payload into trimmed positional values
pub fn split_values(input: &str) -> Vec<String> {
    input.split(',').map(|v| v.trim().to_owned()).collect()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // chrono accepts signs and unpadded fields, so check the shape first
    if !is_iso_date_shape(raw.as_bytes()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// `DDDD-DD-DD` with ASCII digits only
fn is_iso_date_shape(bytes: &[u8]) -> bool {
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
