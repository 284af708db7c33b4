//! Typed cell values and field maps

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::schema::{ColumnType, EntitySchema};

/// Date format accepted for `date` columns and used when displaying them
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single typed cell.
///
/// Ordering compares variants first, so it is only meaningful between
/// values of the same column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Text(String),
    Date(NaiveDate),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column type this value would be stored as, if any
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Text(_) => Some(ColumnType::Text),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Null => f.write_str("NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// One stored row, cells in schema column order
pub type Row = Vec<Value>;

/// Column name to typed value for one row under mutation.
///
/// Entries keep schema declaration order so storage backends can bind them
/// positionally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMap {
    fields: Vec<(&'static str, Value)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value for the column
    pub fn insert(&mut self, column: &'static str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }

    /// Primary key value carried by this map, if present
    pub fn primary_key(&self, schema: &EntitySchema) -> Option<&Value> {
        self.get(schema.primary_key_column().name)
    }

    /// Build a full row for `schema`. Columns absent from the map are NULL.
    pub fn to_row(&self, schema: &EntitySchema) -> Row {
        schema
            .columns
            .iter()
            .map(|c| self.get(c.name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Overwrite every column present in the map on an existing row
    pub fn apply_to(&self, schema: &EntitySchema, row: &mut Row) {
        for (column, value) in self.iter() {
            if let Some(idx) = schema.column_index(column) {
                row[idx] = value.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LISTING;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn display_matches_input_format() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::from("Dune").to_string(), "Dune");
        assert_eq!(Value::Date(date("2024-01-15")).to_string(), "2024-01-15");
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn serializes_untagged() {
        let row = vec![
            Value::Integer(1),
            Value::Date(date("2024-01-15")),
            Value::from("open"),
            Value::Null,
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[1,"2024-01-15","open",null]"#);
    }

    #[test]
    fn insert_replaces_existing_field() {
        let mut fields = FieldMap::new();
        fields.insert("status", Value::from("open"));
        fields.insert("status", Value::from("closed"));

        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("status"), Some(&Value::from("closed")));
    }

    #[test]
    fn apply_overwrites_only_present_columns() {
        let mut row = vec![
            Value::Integer(5),
            Value::Date(date("2024-01-15")),
            Value::Integer(1),
            Value::from("open"),
        ];

        let mut fields = FieldMap::new();
        fields.insert("status", Value::from("closed"));
        fields.apply_to(&LISTING, &mut row);

        assert_eq!(row[0], Value::Integer(5));
        assert_eq!(row[3], Value::from("closed"));
    }

    #[test]
    fn to_row_follows_schema_order() {
        let mut fields = FieldMap::new();
        fields.insert("status", Value::from("open"));
        fields.insert("listing_id", Value::Integer(9));

        let row = fields.to_row(&LISTING);
        assert_eq!(
            row,
            vec![
                Value::Integer(9),
                Value::Null,
                Value::Null,
                Value::from("open")
            ]
        );
        assert_eq!(fields.primary_key(&LISTING), Some(&Value::Integer(9)));
    }
}
