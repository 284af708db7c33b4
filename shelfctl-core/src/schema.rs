//! Schema registry
//!
//! Static descriptors for every entity in the catalogue. Table names
//! resolve to an `EntitySchema` at runtime; the descriptors themselves are
//! plain data, built once and shared read-only for the life of the process.

use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{SchemaError, TableError};

/// Semantic column type used for coercion and storage binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Text,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

/// Reference from a local column to a column (the primary key) of another table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
}

impl ForeignKey {
    pub const fn new(
        column: &'static str,
        references_table: &'static str,
        references_column: &'static str,
    ) -> Self {
        Self {
            column,
            references_table,
            references_column,
        }
    }
}

/// Descriptor of one table.
///
/// Column order is a contract with callers: positional value lists are
/// zipped onto `columns` in declaration order. Descriptors are only built
/// inside this crate and checked by [`SchemaRegistry::new`], so every one
/// has exactly one primary key column that exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntitySchema {
    pub(crate) name: &'static str,
    pub(crate) columns: &'static [Column],
    pub(crate) primary_key: &'static [&'static str],
    pub(crate) foreign_keys: &'static [ForeignKey],
}

impl EntitySchema {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &'static [Column] {
        self.columns
    }

    pub fn foreign_keys(&self) -> &'static [ForeignKey] {
        self.foreign_keys
    }

    /// Column names in declaration order
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_owned()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column used for id-based lookups (first declared primary key column)
    pub fn primary_key_column(&self) -> &'static Column {
        let name = self.primary_key[0];
        self.column(name)
            .unwrap_or_else(|| unreachable!("registry validated primary key {name}"))
    }

    pub fn primary_key_index(&self) -> usize {
        self.column_index(self.primary_key[0])
            .unwrap_or_else(|| unreachable!("registry validated primary key"))
    }
}

// ============================================================================
// Built-in catalogue
// ============================================================================

use ColumnType::{Date, Integer, Text};

pub const USER: EntitySchema = EntitySchema {
    name: "User",
    columns: &[
        Column::required("user_id", Integer),
        Column::required("first_name", Text),
        Column::required("last_name", Text),
        Column::required("email", Text),
    ],
    primary_key: &["user_id"],
    foreign_keys: &[],
};

pub const BOOK: EntitySchema = EntitySchema {
    name: "Book",
    columns: &[
        Column::required("book_id", Integer),
        Column::required("title", Text),
        Column::required("author", Text),
        Column::required("genre", Text),
        Column::required("condition", Text),
        Column::required("user_id", Integer),
    ],
    primary_key: &["book_id"],
    foreign_keys: &[ForeignKey::new("user_id", "User", "user_id")],
};

pub const LISTING: EntitySchema = EntitySchema {
    name: "Listing",
    columns: &[
        Column::required("listing_id", Integer),
        Column::required("created_date", Date),
        Column::required("book_id", Integer),
        Column::required("status", Text),
    ],
    primary_key: &["listing_id"],
    foreign_keys: &[ForeignKey::new("book_id", "Book", "book_id")],
};

pub const REQUEST: EntitySchema = EntitySchema {
    name: "Request",
    columns: &[
        Column::required("request_id", Integer),
        Column::required("user_id", Integer),
        Column::required("listing_id", Integer),
    ],
    primary_key: &["request_id"],
    foreign_keys: &[
        ForeignKey::new("user_id", "User", "user_id"),
        ForeignKey::new("listing_id", "Listing", "listing_id"),
    ],
};

static BUILTIN: Lazy<SchemaRegistry> = Lazy::new(|| {
    SchemaRegistry::new(vec![USER, BOOK, LISTING, REQUEST])
        .unwrap_or_else(|err| panic!("built-in schema is inconsistent: {err}"))
});

// ============================================================================
// Registry
// ============================================================================

/// Immutable table-name to schema mapping
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entities: Vec<EntitySchema>,
}

impl SchemaRegistry {
    /// The catalogue registry (User, Book, Listing, Request)
    pub fn builtin() -> &'static SchemaRegistry {
        &BUILTIN
    }

    /// Build a registry, validating every descriptor.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` when names repeat, a primary key is not exactly
    /// one existing column, or a foreign key points at a missing table or
    /// column.
    pub fn new(entities: Vec<EntitySchema>) -> Result<Self, SchemaError> {
        for (i, schema) in entities.iter().enumerate() {
            if entities[..i].iter().any(|other| other.name == schema.name) {
                return Err(SchemaError::DuplicateTable(schema.name));
            }

            if schema.primary_key.len() != 1 {
                return Err(SchemaError::PrimaryKeyArity {
                    table: schema.name,
                    found: schema.primary_key.len(),
                });
            }
            for pk in schema.primary_key {
                require_column(schema, pk)?;
            }

            for fk in schema.foreign_keys {
                require_column(schema, fk.column)?;
                let target = entities
                    .iter()
                    .find(|e| e.name == fk.references_table)
                    .ok_or(SchemaError::UnknownTarget {
                        table: schema.name,
                        column: fk.column,
                        target: fk.references_table,
                    })?;
                require_column(target, fk.references_column)?;
            }
        }

        Ok(Self { entities })
    }

    /// Resolve a table name, compared exactly and case-sensitively
    pub fn resolve(&self, table: &str) -> Result<&EntitySchema, TableError> {
        self.entities
            .iter()
            .find(|e| e.name == table)
            .ok_or_else(|| TableError::unknown_table(table))
    }

    /// All schemas in registration order
    pub fn all_schemas(&self) -> &[EntitySchema] {
        &self.entities
    }

    /// Every (child schema, edge) whose foreign key targets `table`
    pub fn dependents_of<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = (&'a EntitySchema, &'static ForeignKey)> + 'a {
        self.entities.iter().flat_map(move |child| {
            child
                .foreign_keys
                .iter()
                .filter(move |fk| fk.references_table == table)
                .map(move |fk| (child, fk))
        })
    }
}

fn require_column(schema: &EntitySchema, column: &'static str) -> Result<(), SchemaError> {
    match schema.column(column) {
        Some(_) => Ok(()),
        None => Err(SchemaError::MissingColumn {
            table: schema.name,
            column,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_builtin_tables() {
        let registry = SchemaRegistry::builtin();
        let names: Vec<_> = registry.all_schemas().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["User", "Book", "Listing", "Request"]);

        let book = registry.resolve("Book").unwrap();
        assert_eq!(book.columns.len(), 6);
        assert_eq!(book.primary_key_column().name, "book_id");
        assert_eq!(book.primary_key_index(), 0);
    }

    #[test]
    fn every_builtin_table_has_a_usable_primary_key() {
        for schema in SchemaRegistry::builtin().all_schemas() {
            let pk = schema.primary_key_column();
            assert_eq!(schema.columns()[schema.primary_key_index()], *pk);
            assert_eq!(pk.ty, ColumnType::Integer, "{}", schema.name());
        }
        assert_eq!(REQUEST.foreign_keys().len(), 2);
    }

    #[test]
    fn resolve_is_exact_and_case_sensitive() {
        let registry = SchemaRegistry::builtin();
        assert!(registry.resolve("book").is_err());
        assert!(registry.resolve("Book ").is_err());
        assert!(registry.resolve("Books").is_err());

        let err = registry.resolve("Shelf").unwrap_err();
        assert!(matches!(err, TableError::UnknownTable { table } if table == "Shelf"));
    }

    #[test]
    fn dependents_invert_foreign_keys() {
        let registry = SchemaRegistry::builtin();

        let user_deps: Vec<_> = registry
            .dependents_of("User")
            .map(|(child, fk)| (child.name, fk.column))
            .collect();
        assert_eq!(user_deps, vec![("Book", "user_id"), ("Request", "user_id")]);

        let listing_deps: Vec<_> = registry
            .dependents_of("Listing")
            .map(|(child, _)| child.name)
            .collect();
        assert_eq!(listing_deps, vec!["Request"]);

        assert_eq!(registry.dependents_of("Request").count(), 0);
    }

    #[test]
    fn rejects_duplicate_tables() {
        let err = SchemaRegistry::new(vec![USER, USER]).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTable("User"));
    }

    #[test]
    fn rejects_dangling_foreign_key() {
        // Book without User in the registry
        let err = SchemaRegistry::new(vec![BOOK]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTarget { target: "User", .. }));
    }

    #[test]
    fn rejects_composite_primary_key() {
        const PAIR: EntitySchema = EntitySchema {
            name: "Pair",
            columns: &[
                Column::required("a", Integer),
                Column::required("b", Integer),
            ],
            primary_key: &["a", "b"],
            foreign_keys: &[],
        };
        let err = SchemaRegistry::new(vec![PAIR]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::PrimaryKeyArity {
                table: "Pair",
                found: 2
            }
        );
    }

    #[test]
    fn rejects_missing_primary_key_column() {
        const BROKEN: EntitySchema = EntitySchema {
            name: "Broken",
            columns: &[Column::required("a", Integer)],
            primary_key: &["id"],
            foreign_keys: &[],
        };
        let err = SchemaRegistry::new(vec![BROKEN]).unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn { column: "id", .. }));
    }
}
