//! Table access facade
//!
//! The single entry point used by the presentation layer. Each call takes a
//! table name plus raw strings, resolves the schema, runs coercion and
//! integrity checks, and performs the write inside one session that is
//! released before the call returns. Errors from every stage are passed
//! through unchanged; nothing is retried.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::coerce::{coerce, coerce_record_id};
use crate::error::{Result, TableError};
use crate::integrity::IntegrityChecker;
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::storage::{Session, Storage};
use crate::store::RecordStore;
use crate::value::{Row, Value};

/// Result set returned by [`TableAccess::list_table`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableData {
    /// Column names in schema order
    pub headers: Vec<String>,
    /// One entry per row, each the same length as `headers`
    pub rows: Vec<Row>,
}

#[derive(Clone)]
pub struct TableAccess {
    registry: &'static SchemaRegistry,
    store: RecordStore,
}

impl TableAccess {
    /// Facade over the built-in catalogue
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_registry(SchemaRegistry::builtin(), storage)
    }

    pub fn with_registry(registry: &'static SchemaRegistry, storage: Arc<dyn Storage>) -> Self {
        Self {
            registry,
            store: RecordStore::new(storage),
        }
    }

    pub fn registry(&self) -> &'static SchemaRegistry {
        self.registry
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Every row of `table` with headers in schema column order.
    ///
    /// # Errors
    ///
    /// `UnknownTable`, `EmptyTable`, `StorageError`
    #[instrument(skip(self))]
    pub async fn list_table(&self, table: &str) -> Result<TableData> {
        let schema = self.registry.resolve(table)?;

        let mut session = self.store.begin().await?;
        let outcome = self.store.fetch_all(session.as_mut(), schema).await;
        let rows = self.store.finish(session, "read records", outcome).await?;

        Ok(TableData {
            headers: schema.headers(),
            rows,
        })
    }

    /// Insert one row from positional raw values.
    ///
    /// # Errors
    ///
    /// `UnknownTable`, `ArityMismatch`, `TypeCoercionError`,
    /// `InvalidDateFormat`, `ForeignKeyViolation`, `DuplicateKey`,
    /// `StorageError`
    #[instrument(skip(self, values), fields(value_count = values.len()))]
    pub async fn insert_record<S: AsRef<str> + Sync>(
        &self,
        table: &str,
        values: &[S],
    ) -> Result<()> {
        let schema = self.registry.resolve(table)?;

        let mut session = self.store.begin().await?;
        let outcome = self.insert_in(session.as_mut(), schema, values).await;
        self.store.finish(session, "insert record", outcome).await
    }

    /// Overwrite the row keyed by `record_id` with positional raw values.
    ///
    /// # Errors
    ///
    /// `UnknownTable`, `RecordNotFound`, `ArityMismatch`,
    /// `TypeCoercionError`, `InvalidDateFormat`, `ForeignKeyViolation`,
    /// `DependentRecordExists` (primary key changed while referenced),
    /// `StorageError`
    #[instrument(skip(self, values), fields(value_count = values.len()))]
    pub async fn update_record<S: AsRef<str> + Sync>(
        &self,
        table: &str,
        record_id: &str,
        values: &[S],
    ) -> Result<()> {
        let schema = self.registry.resolve(table)?;

        let mut session = self.store.begin().await?;
        let outcome = self
            .update_in(session.as_mut(), schema, record_id, values)
            .await;
        self.store.finish(session, "update record", outcome).await
    }

    /// Delete the row keyed by `record_id` if nothing references it.
    ///
    /// # Errors
    ///
    /// `UnknownTable`, `RecordNotFound`, `DependentRecordExists`,
    /// `StorageError`
    #[instrument(skip(self))]
    pub async fn delete_record(&self, table: &str, record_id: &str) -> Result<()> {
        let schema = self.registry.resolve(table)?;

        let mut session = self.store.begin().await?;
        let outcome = self.delete_in(session.as_mut(), schema, record_id).await;
        self.store.finish(session, "delete record", outcome).await
    }

    fn checker(&self) -> IntegrityChecker<'static> {
        IntegrityChecker::new(self.registry)
    }

    async fn insert_in<S: AsRef<str>>(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        values: &[S],
    ) -> Result<()> {
        let fields = coerce(schema, values)?;
        debug!(table = schema.name, "values coerced");

        self.checker()
            .validate_foreign_keys(session, schema, &fields)
            .await?;
        self.store.insert(session, schema, &fields).await
    }

    async fn update_in<S: AsRef<str>>(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        record_id: &str,
        values: &[S],
    ) -> Result<()> {
        let (id, current) = self.existing_record(session, schema, record_id).await?;

        let fields = coerce(schema, values)?;
        debug!(table = schema.name, "values coerced");

        let checker = self.checker();
        checker
            .validate_foreign_keys(session, schema, &fields)
            .await?;

        // re-keying a row must not strand the rows that point at the old key
        if fields.primary_key(schema).is_some_and(|key| *key != id) {
            checker
                .validate_no_dependents(session, schema, &current)
                .await?;
        }
        self.store.update_by_id(session, schema, &id, &fields).await
    }

    async fn delete_in(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        record_id: &str,
    ) -> Result<()> {
        let (id, record) = self.existing_record(session, schema, record_id).await?;

        self.checker()
            .validate_no_dependents(session, schema, &record)
            .await?;
        self.store.delete_by_id(session, schema, &id).await
    }

    /// Coerce `record_id` and fetch the row that carries it
    async fn existing_record(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        record_id: &str,
    ) -> Result<(Value, Row)> {
        let id = coerce_record_id(schema, record_id)?;
        match self.store.find_by_id(session, schema, &id).await? {
            Some(row) => Ok((id, row)),
            None => Err(TableError::record_not_found(schema.name, record_id.trim())),
        }
    }
}
