//! Storage engine seam
//!
//! The relational engine is an external collaborator. The core only needs
//! transactional sessions, equality lookups by column and single-row
//! writes, so that is all these traits expose.
//!
//! # Session contract
//!
//! - `Storage::begin` opens one transaction
//! - a session is finished by exactly one `commit` or `rollback`
//! - dropping an unfinished session discards its writes

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::EntitySchema;
use crate::value::{FieldMap, Row, Value};

pub use memory::MemoryStorage;
pub use postgres::{create_pool, create_pool_with_options, PgStorage, MIGRATOR};

/// Handle to a storage engine
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Acquire a session with an open transaction
    async fn begin(&self) -> Result<Box<dyn Session>>;
}

/// One transaction against the storage engine
#[async_trait]
pub trait Session: Send {
    /// All rows of `schema`, ordered by primary key
    async fn fetch_all(&mut self, schema: &EntitySchema) -> Result<Vec<Row>>;

    /// First row whose `column` equals `value`
    async fn find_by_column(
        &mut self,
        schema: &EntitySchema,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>>;

    async fn insert(&mut self, schema: &EntitySchema, fields: &FieldMap) -> Result<()>;

    /// Overwrite the columns in `fields` on the row keyed by `id`.
    /// Returns the number of rows touched.
    async fn update(&mut self, schema: &EntitySchema, id: &Value, fields: &FieldMap)
        -> Result<u64>;

    /// Delete the row keyed by `id`. Returns the number of rows removed.
    async fn delete(&mut self, schema: &EntitySchema, id: &Value) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}
