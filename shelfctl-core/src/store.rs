//! Record store
//!
//! Row-level operations over a storage session plus the transaction
//! boundary around them. A session opened with [`RecordStore::begin`] is
//! always handed back through [`RecordStore::finish`], which commits a
//! successful outcome and rolls back anything else.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, TableError};
use crate::schema::EntitySchema;
use crate::storage::{Session, Storage};
use crate::value::{FieldMap, Row, Value};

#[derive(Clone)]
pub struct RecordStore {
    storage: Arc<dyn Storage>,
}

impl RecordStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn backend(&self) -> &'static str {
        self.storage.name()
    }

    /// Acquire a session for one operation
    pub async fn begin(&self) -> Result<Box<dyn Session>> {
        self.storage.begin().await
    }

    /// Release `session`: commit when `outcome` is `Ok`, roll back otherwise.
    ///
    /// A failed commit is rolled back and reported as a storage error for
    /// `action` (e.g. "insert record").
    pub async fn finish<T>(
        &self,
        mut session: Box<dyn Session>,
        action: &'static str,
        outcome: Result<T>,
    ) -> Result<T> {
        match outcome {
            Ok(value) => match session.commit().await {
                Ok(()) => Ok(value),
                Err(err) => {
                    warn!(action, error = %err, "commit failed, rolling back");
                    if let Err(rb) = session.rollback().await {
                        warn!(action, error = %rb, "rollback failed");
                    }
                    Err(relabel(err, action))
                }
            },
            Err(err) => {
                debug!(action, error = %err, "rolling back");
                if let Err(rb) = session.rollback().await {
                    warn!(action, error = %rb, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Row whose primary key equals `id`
    pub async fn find_by_id(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        id: &Value,
    ) -> Result<Option<Row>> {
        let pk = schema.primary_key_column();
        session.find_by_column(schema, pk.name, id).await
    }

    /// All rows of `schema`; an empty table is an error, not an empty result
    pub async fn fetch_all(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
    ) -> Result<Vec<Row>> {
        let rows = session.fetch_all(schema).await?;
        if rows.is_empty() {
            return Err(TableError::empty_table(schema.name));
        }
        debug!(table = schema.name, rows = rows.len(), "fetched table");
        Ok(rows)
    }

    /// Insert a new row, refusing a primary key that is already taken
    pub async fn insert(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        fields: &FieldMap,
    ) -> Result<()> {
        let pk = schema.primary_key_column();
        if let Some(key) = fields.primary_key(schema) {
            if self.find_by_id(session, schema, key).await?.is_some() {
                return Err(TableError::DuplicateKey {
                    table: schema.name.to_owned(),
                    column: pk.name.to_owned(),
                    value: key.to_string(),
                });
            }
        }

        session.insert(schema, fields).await?;
        info!(table = schema.name, "record inserted");
        Ok(())
    }

    /// Overwrite every column in `fields` on the row keyed by `id`
    pub async fn update_by_id(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        id: &Value,
        fields: &FieldMap,
    ) -> Result<()> {
        let touched = session.update(schema, id, fields).await?;
        if touched == 0 {
            return Err(TableError::record_not_found(schema.name, id.to_string()));
        }
        info!(table = schema.name, id = %id, "record updated");
        Ok(())
    }

    pub async fn delete_by_id(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        id: &Value,
    ) -> Result<()> {
        let removed = session.delete(schema, id).await?;
        if removed == 0 {
            return Err(TableError::record_not_found(schema.name, id.to_string()));
        }
        info!(table = schema.name, id = %id, "record deleted");
        Ok(())
    }
}

/// Attribute a storage failure to the operation whose commit failed
fn relabel(err: TableError, action: &'static str) -> TableError {
    match err {
        TableError::Storage { source, .. } => TableError::Storage { action, source },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::coerce;
    use crate::error::ErrorKind;
    use crate::schema::USER;
    use crate::storage::MemoryStorage;

    fn store() -> (MemoryStorage, RecordStore) {
        let storage = MemoryStorage::new();
        let store = RecordStore::new(Arc::new(storage.clone()));
        (storage, store)
    }

    fn ann() -> FieldMap {
        coerce(&USER, &["1", "Ann", "Lee", "a@x.com"]).unwrap()
    }

    #[tokio::test]
    async fn fetch_all_reports_empty_table() {
        let (_, store) = store();
        let mut session = store.begin().await.unwrap();
        let outcome = store.fetch_all(session.as_mut(), &USER).await;
        let err = store.finish(session, "read records", outcome).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyTable);
        assert_eq!(err.to_string(), "No entries found in 'User'.");
    }

    #[tokio::test]
    async fn insert_checks_duplicate_before_writing() {
        let (storage, store) = store();

        let mut session = store.begin().await.unwrap();
        let outcome = store.insert(session.as_mut(), &USER, &ann()).await;
        store.finish(session, "insert record", outcome).await.unwrap();

        let mut session = store.begin().await.unwrap();
        let outcome = store.insert(session.as_mut(), &USER, &ann()).await;
        let err = store.finish(session, "insert record", outcome).await.unwrap_err();

        assert!(matches!(
            err,
            TableError::DuplicateKey { ref column, ref value, .. } if column == "user_id" && value == "1"
        ));
        assert_eq!(storage.rows("User").await.len(), 1);
    }

    #[tokio::test]
    async fn failed_outcome_rolls_back_earlier_writes() {
        let (storage, store) = store();

        let mut session = store.begin().await.unwrap();
        store.insert(session.as_mut(), &USER, &ann()).await.unwrap();
        let outcome: Result<()> = Err(TableError::empty_table("User"));
        assert!(store.finish(session, "insert record", outcome).await.is_err());

        assert!(storage.rows("User").await.is_empty());
    }

    #[tokio::test]
    async fn commit_failure_is_a_storage_error_for_the_action() {
        let (storage, store) = store();
        storage.inject_commit_failure();

        let mut session = store.begin().await.unwrap();
        let outcome = store.insert(session.as_mut(), &USER, &ann()).await;
        let err = store.finish(session, "insert record", outcome).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageError);
        assert!(err.to_string().starts_with("Failed to insert record:"));
        assert!(storage.rows("User").await.is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_require_existing_row() {
        let (_, store) = store();
        let mut session = store.begin().await.unwrap();
        let missing = Value::Integer(5);

        let err = store
            .update_by_id(session.as_mut(), &USER, &missing, &ann())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecordNotFound);

        let err = store
            .delete_by_id(session.as_mut(), &USER, &missing)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No record with ID 5 found in table 'User'.");
    }
}
