//! shelfctl-core: table-agnostic CRUD over the book-swap catalogue
//!
//! Given a table name and a flat list of raw strings, the [`TableAccess`]
//! facade resolves the schema, coerces values, enforces primary-key and
//! foreign-key integrity, and applies the write inside a single storage
//! transaction.

pub mod coerce;
pub mod config;
pub mod error;
pub mod facade;
pub mod integrity;
pub mod schema;
pub mod storage;
pub mod store;
pub mod value;

pub use config::ShelfConfig;
pub use error::{ErrorKind, Result, SchemaError, TableError};
pub use facade::{TableAccess, TableData};
pub use schema::{Column, ColumnType, EntitySchema, ForeignKey, SchemaRegistry};
pub use storage::{MemoryStorage, PgStorage, Session, Storage};
pub use value::{FieldMap, Row, Value};
