//! PostgreSQL storage engine
//!
//! Uses a sqlx `PgPool`; every session is one pool transaction. Statements
//! are generated from the static schema descriptors, so identifiers never
//! come from operator input. Values are bound with the declared column type.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _, Transaction};
use tracing::debug;

use super::{Session, Storage};
use crate::error::{Result, TableError};
use crate::schema::{Column, ColumnType, EntitySchema};
use crate::value::{FieldMap, Row, Value};

/// Embedded migrations for the catalogue tables
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Default maximum connections for the pool.
/// Kept low for single-operator tooling.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Create a PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn create_pool(database_url: &str) -> std::result::Result<PgPool, sqlx::Error> {
    create_pool_with_options(database_url, DEFAULT_MAX_CONNECTIONS).await
}

/// Create a PostgreSQL connection pool with custom options.
pub async fn create_pool_with_options(
    database_url: &str,
    max_connections: u32,
) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Storage handle over a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }
}

#[async_trait]
impl Storage for PgStorage {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn Session>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TableError::storage("open session", e))?;
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }
}

struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn tx(&mut self, action: &'static str) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| TableError::storage(action, "session already finished"))
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn select_list(schema: &EntitySchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| quote(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    ty: ColumnType,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match (value, ty) {
        (Value::Integer(n), _) => query.bind(*n),
        (Value::Text(s), _) => query.bind(s.as_str()),
        (Value::Date(d), _) => query.bind(*d),
        (Value::Null, ColumnType::Integer) => query.bind(None::<i64>),
        (Value::Null, ColumnType::Text) => query.bind(None::<String>),
        (Value::Null, ColumnType::Date) => query.bind(None::<NaiveDate>),
    }
}

fn decode_cell(row: &PgRow, idx: usize, column: &Column) -> std::result::Result<Value, sqlx::Error> {
    let value = match column.ty {
        ColumnType::Integer => row.try_get::<Option<i64>, _>(idx)?.map(Value::Integer),
        ColumnType::Text => row.try_get::<Option<String>, _>(idx)?.map(Value::Text),
        ColumnType::Date => row.try_get::<Option<NaiveDate>, _>(idx)?.map(Value::Date),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn decode_row(schema: &EntitySchema, row: &PgRow) -> std::result::Result<Row, sqlx::Error> {
    schema
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| decode_cell(row, idx, column))
        .collect()
}

#[async_trait]
impl Session for PgSession {
    async fn fetch_all(&mut self, schema: &EntitySchema) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            select_list(schema),
            quote(schema.name),
            quote(schema.primary_key_column().name)
        );
        debug!(sql = %sql, "fetch_all");

        let tx = self.tx("read records")?;
        let rows = sqlx::query(&sql)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| TableError::storage("read records", e))?;

        rows.iter()
            .map(|row| decode_row(schema, row))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TableError::storage("read records", e))
    }

    async fn find_by_column(
        &mut self,
        schema: &EntitySchema,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>> {
        let col = schema.column(column).ok_or_else(|| {
            TableError::storage("read records", format!("column \"{column}\" does not exist"))
        })?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 LIMIT 1",
            select_list(schema),
            quote(schema.name),
            quote(col.name)
        );

        let tx = self.tx("read records")?;
        let row = bind_value(sqlx::query(&sql), col.ty, value)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| TableError::storage("read records", e))?;

        row.map(|r| decode_row(schema, &r))
            .transpose()
            .map_err(|e| TableError::storage("read records", e))
    }

    async fn insert(&mut self, schema: &EntitySchema, fields: &FieldMap) -> Result<()> {
        let columns: Vec<_> = fields.iter().collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(schema.name),
            columns
                .iter()
                .map(|(name, _)| quote(name))
                .collect::<Vec<_>>()
                .join(", "),
            (1..=columns.len())
                .map(|i| format!("${i}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut query = sqlx::query(&sql);
        for (name, value) in &columns {
            query = bind_value(query, column_type(schema, name)?, value);
        }

        let tx = self.tx("insert record")?;
        query
            .execute(&mut **tx)
            .await
            .map_err(|e| TableError::storage("insert record", e))?;
        Ok(())
    }

    async fn update(
        &mut self,
        schema: &EntitySchema,
        id: &Value,
        fields: &FieldMap,
    ) -> Result<u64> {
        let columns: Vec<_> = fields.iter().collect();
        let pk = schema.primary_key_column();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${}",
            quote(schema.name),
            columns
                .iter()
                .enumerate()
                .map(|(i, (name, _))| format!("{} = ${}", quote(name), i + 1))
                .collect::<Vec<_>>()
                .join(", "),
            quote(pk.name),
            columns.len() + 1
        );

        let mut query = sqlx::query(&sql);
        for (name, value) in &columns {
            query = bind_value(query, column_type(schema, name)?, value);
        }
        query = bind_value(query, pk.ty, id);

        let tx = self.tx("update record")?;
        let done = query
            .execute(&mut **tx)
            .await
            .map_err(|e| TableError::storage("update record", e))?;
        Ok(done.rows_affected())
    }

    async fn delete(&mut self, schema: &EntitySchema, id: &Value) -> Result<u64> {
        let pk = schema.primary_key_column();
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            quote(schema.name),
            quote(pk.name)
        );

        let tx = self.tx("delete record")?;
        let done = bind_value(sqlx::query(&sql), pk.ty, id)
            .execute(&mut **tx)
            .await
            .map_err(|e| TableError::storage("delete record", e))?;
        Ok(done.rows_affected())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| TableError::storage("commit", "session already finished"))?;
        tx.commit()
            .await
            .map_err(|e| TableError::storage("commit", e))
    }

    async fn rollback(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|e| TableError::storage("rollback", e)),
            None => Ok(()),
        }
    }
}

fn column_type(schema: &EntitySchema, name: &str) -> Result<ColumnType> {
    schema.column(name).map(|c| c.ty).ok_or_else(|| {
        TableError::storage(
            "write record",
            format!("column \"{name}\" does not exist on {}", schema.name),
        )
    })
}
