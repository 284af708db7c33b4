//! In-process storage engine
//!
//! Backs tests and `shelfctl --memory`. One session runs at a time: the
//! session holds the writer lock and edits a private copy of the tables,
//! which commit publishes and rollback (or drop) discards. Readers of the
//! committed state never wait on an open session.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::{Session, Storage};
use crate::error::{Result, TableError};
use crate::schema::EntitySchema;
use crate::value::{FieldMap, Row, Value};

type Tables = BTreeMap<&'static str, Vec<Row>>;

/// Shared handle to an in-memory database
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// Held by the open session until it commits or rolls back
    writer: Arc<Mutex<()>>,
    committed: Arc<RwLock<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail, as a lost connection would
    pub fn inject_commit_failure(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Committed rows of `table` in insertion order.
    ///
    /// Writes of a session that is still open are not visible here.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.committed
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn Session>> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = self.committed.read().await.clone();
        Ok(Box::new(MemorySession {
            guard: Some(guard),
            committed: Arc::clone(&self.committed),
            fail_next_commit: Arc::clone(&self.fail_next_commit),
            working,
        }))
    }
}

struct MemorySession {
    guard: Option<OwnedMutexGuard<()>>,
    committed: Arc<RwLock<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
    working: Tables,
}

impl MemorySession {
    fn ensure_open(&self, action: &'static str) -> Result<()> {
        if self.guard.is_none() {
            return Err(TableError::storage(action, "session already finished"));
        }
        Ok(())
    }

    fn table_mut(&mut self, schema: &EntitySchema) -> &mut Vec<Row> {
        self.working.entry(schema.name).or_default()
    }
}

fn position_by(rows: &[Row], idx: usize, value: &Value) -> Option<usize> {
    rows.iter().position(|row| &row[idx] == value)
}

fn unique_violation(schema: &EntitySchema, value: &Value) -> String {
    format!(
        "duplicate key value violates unique constraint \"{}_pkey\": Key ({})=({}) already exists",
        schema.name,
        schema.primary_key_column().name,
        value
    )
}

#[async_trait]
impl Session for MemorySession {
    async fn fetch_all(&mut self, schema: &EntitySchema) -> Result<Vec<Row>> {
        self.ensure_open("read records")?;
        let pk = schema.primary_key_index();
        let mut rows = self.working.get(schema.name).cloned().unwrap_or_default();
        rows.sort_by(|a, b| a[pk].cmp(&b[pk]));
        Ok(rows)
    }

    async fn find_by_column(
        &mut self,
        schema: &EntitySchema,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>> {
        self.ensure_open("read records")?;
        let idx = schema.column_index(column).ok_or_else(|| {
            TableError::storage("read records", format!("column \"{column}\" does not exist"))
        })?;
        let found = self
            .working
            .get(schema.name)
            .and_then(|rows| position_by(rows, idx, value).map(|i| rows[i].clone()));
        Ok(found)
    }

    async fn insert(&mut self, schema: &EntitySchema, fields: &FieldMap) -> Result<()> {
        self.ensure_open("insert record")?;
        let pk = schema.primary_key_index();
        let row = fields.to_row(schema);
        let rows = self.table_mut(schema);

        if position_by(rows, pk, &row[pk]).is_some() {
            let reason = unique_violation(schema, &row[pk]);
            return Err(TableError::storage("insert record", reason));
        }
        rows.push(row);
        Ok(())
    }

    async fn update(
        &mut self,
        schema: &EntitySchema,
        id: &Value,
        fields: &FieldMap,
    ) -> Result<u64> {
        self.ensure_open("update record")?;
        let pk = schema.primary_key_index();
        let rows = self.table_mut(schema);

        let Some(target) = position_by(rows, pk, id) else {
            return Ok(0);
        };

        let mut updated = rows[target].clone();
        fields.apply_to(schema, &mut updated);

        let clash = rows
            .iter()
            .enumerate()
            .any(|(i, row)| i != target && row[pk] == updated[pk]);
        if clash {
            let reason = unique_violation(schema, &updated[pk]);
            return Err(TableError::storage("update record", reason));
        }

        rows[target] = updated;
        Ok(1)
    }

    async fn delete(&mut self, schema: &EntitySchema, id: &Value) -> Result<u64> {
        self.ensure_open("delete record")?;
        let pk = schema.primary_key_index();
        let rows = self.table_mut(schema);
        let before = rows.len();
        rows.retain(|row| &row[pk] != id);
        Ok((before - rows.len()) as u64)
    }

    async fn commit(&mut self) -> Result<()> {
        let Some(guard) = self.guard.take() else {
            return Err(TableError::storage("commit", "session already finished"));
        };

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            self.working.clear();
            return Err(TableError::storage("commit", "connection lost during commit"));
        }

        *self.committed.write().await = std::mem::take(&mut self.working);
        drop(guard);
        debug!("memory session committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        // releasing the guard without publishing discards the working copy
        self.guard.take();
        self.working.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::schema::USER;

    fn user(id: i64, first: &str) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("user_id", Value::Integer(id));
        fields.insert("first_name", Value::from(first));
        fields.insert("last_name", Value::from("Lee"));
        fields.insert("email", Value::from("a@x.com"));
        fields
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let storage = MemoryStorage::new();

        let mut session = storage.begin().await.unwrap();
        session.insert(&USER, &user(2, "Bo")).await.unwrap();
        session.insert(&USER, &user(1, "Ann")).await.unwrap();
        session.commit().await.unwrap();

        assert_eq!(storage.rows("User").await.len(), 2);

        let mut session = storage.begin().await.unwrap();
        let rows = session.fetch_all(&USER).await.unwrap();
        session.rollback().await.unwrap();
        assert_eq!(rows[0][0], Value::Integer(1));
        assert_eq!(rows[1][0], Value::Integer(2));
    }

    #[tokio::test]
    async fn rollback_and_drop_discard_writes() {
        let storage = MemoryStorage::new();

        let mut session = storage.begin().await.unwrap();
        session.insert(&USER, &user(1, "Ann")).await.unwrap();
        session.rollback().await.unwrap();
        assert!(storage.rows("User").await.is_empty());

        {
            let mut session = storage.begin().await.unwrap();
            session.insert(&USER, &user(1, "Ann")).await.unwrap();
        }
        assert!(storage.rows("User").await.is_empty());
    }

    #[tokio::test]
    async fn enforces_primary_key_uniqueness() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        session.insert(&USER, &user(1, "Ann")).await.unwrap();

        let err = session.insert(&USER, &user(1, "Bo")).await.unwrap_err();
        assert!(err.to_string().contains("User_pkey"));

        session.insert(&USER, &user(2, "Bo")).await.unwrap();
        let err = session
            .update(&USER, &Value::Integer(2), &user(1, "Bo"))
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Storage { action: "update record", .. }));
    }

    #[tokio::test]
    async fn update_and_delete_report_rows_touched() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        session.insert(&USER, &user(1, "Ann")).await.unwrap();

        let mut rename = FieldMap::new();
        rename.insert("first_name", Value::from("Anna"));
        assert_eq!(session.update(&USER, &Value::Integer(1), &rename).await.unwrap(), 1);
        assert_eq!(session.update(&USER, &Value::Integer(9), &rename).await.unwrap(), 0);

        let found = session
            .find_by_column(&USER, "first_name", &Value::from("Anna"))
            .await
            .unwrap();
        assert!(found.is_some());

        assert_eq!(session.delete(&USER, &Value::Integer(1)).await.unwrap(), 1);
        assert_eq!(session.delete(&USER, &Value::Integer(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_commit_failure_fires_once() {
        let storage = MemoryStorage::new();
        storage.inject_commit_failure();

        let mut session = storage.begin().await.unwrap();
        session.insert(&USER, &user(1, "Ann")).await.unwrap();
        assert!(session.commit().await.is_err());
        assert!(storage.rows("User").await.is_empty());

        let mut session = storage.begin().await.unwrap();
        session.insert(&USER, &user(1, "Ann")).await.unwrap();
        session.commit().await.unwrap();
        assert_eq!(storage.rows("User").await.len(), 1);
    }

    #[tokio::test]
    async fn committed_rows_readable_while_session_open() {
        let storage = MemoryStorage::new();

        let mut session = storage.begin().await.unwrap();
        session.insert(&USER, &user(1, "Ann")).await.unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(1), storage.rows("User"))
            .await
            .expect("rows() waited on the open session");
        assert!(seen.is_empty());

        session.commit().await.unwrap();
        assert_eq!(storage.rows("User").await.len(), 1);
    }

    #[tokio::test]
    async fn finished_session_refuses_work() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        session.commit().await.unwrap();

        assert!(session.fetch_all(&USER).await.is_err());
        assert!(session.commit().await.is_err());
    }
}
