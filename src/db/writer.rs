use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::query::Query;
use sqlx::{Database, Encode, Type};
use tracing::{debug, info};

use super::pool::{Pool, PoolConnection};
use super::schema::{Schema, SchemaInferrer, SqlType, quote_ident};
use crate::config::MAX_BIND_PARAMS;
use crate::formats::{Batch, Value};

/// Destination for decoded batches
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Drop the table if present and create it empty with `schema`
    async fn replace(&self, table: &str, schema: &Schema) -> Result<()>;

    /// Create the table with `schema` unless it already exists
    async fn create_if_missing(&self, table: &str, schema: &Schema) -> Result<()>;

    /// Append every row of `batch` to the table, returning the rows written
    ///
    /// `schema` is the table's column layout; the batch is coerced to it.
    async fn append(&self, table: &str, schema: &Schema, batch: &Batch) -> Result<u64>;
}

/// Writes batches with multi-row INSERT statements, one transaction per batch
pub struct SqlTableWriter {
    pool: Pool,
    index_label: Option<String>,
}

impl SqlTableWriter {
    pub fn new(pool: Pool, index_label: Option<String>) -> Self {
        Self { pool, index_label }
    }

    fn create_sql(&self, table: &str, schema: &Schema, if_not_exists: bool) -> String {
        SchemaInferrer::generate_ddl(table, schema, self.index_label.as_deref(), if_not_exists)
    }

    /// Build `INSERT INTO t (cols) VALUES ($1, $2), ($3, $4), ...` for `rows` rows
    fn insert_sql(&self, table: &str, schema: &Schema, rows: usize) -> String {
        let mut columns: Vec<String> = Vec::with_capacity(schema.columns.len() + 1);
        if let Some(label) = &self.index_label {
            columns.push(quote_ident(label));
        }
        columns.extend(schema.columns.iter().map(|c| quote_ident(&c.name)));

        let num_columns = columns.len();
        let mut param_idx = 1;
        let value_groups: Vec<String> = (0..rows)
            .map(|_| {
                let placeholders: Vec<String> = (0..num_columns)
                    .map(|_| {
                        let placeholder = format!("${}", param_idx);
                        param_idx += 1;
                        placeholder
                    })
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(table),
            columns.join(", "),
            value_groups.join(", ")
        )
    }

    /// Rows per INSERT so that bind parameters stay under the statement limit
    fn rows_per_statement(&self, schema: &Schema) -> usize {
        let width = schema.columns.len() + usize::from(self.index_label.is_some());
        (MAX_BIND_PARAMS / width.max(1)).max(1)
    }
}

#[async_trait]
impl TableSink for SqlTableWriter {
    async fn replace(&self, table: &str, schema: &Schema) -> Result<()> {
        self.pool
            .execute_query(&SchemaInferrer::generate_drop(table))
            .await
            .with_context(|| format!("Failed to drop table {}", table))?;

        let ddl = self.create_sql(table, schema, false);
        debug!("{}", ddl);
        self.pool
            .execute_query(&ddl)
            .await
            .with_context(|| format!("Failed to create table {}", table))?;

        info!(table, columns = schema.columns.len(), "Replaced table");
        Ok(())
    }

    async fn create_if_missing(&self, table: &str, schema: &Schema) -> Result<()> {
        let ddl = self.create_sql(table, schema, true);
        debug!("{}", ddl);
        self.pool
            .execute_query(&ddl)
            .await
            .with_context(|| format!("Failed to create table {}", table))?;
        Ok(())
    }

    async fn append(&self, table: &str, schema: &Schema, batch: &Batch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let rows = batch.conform_to(schema)?;
        let chunk_rows = self.rows_per_statement(schema);

        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection from pool")?;

        // Branch based on connection type
        match &mut conn {
            PoolConnection::Postgres(pg_conn) => {
                let mut tx = sqlx::Connection::begin(&mut **pg_conn)
                    .await
                    .context("Failed to begin transaction")?;
                for (chunk_idx, chunk) in rows.chunks(chunk_rows).enumerate() {
                    let sql = self.insert_sql(table, schema, chunk.len());
                    let first_index = batch.offset + (chunk_idx * chunk_rows) as u64;
                    let mut query = sqlx::query(&sql);
                    for (i, row) in chunk.iter().enumerate() {
                        if self.index_label.is_some() {
                            query = query.bind(index_value(first_index + i as u64)?);
                        }
                        for (value, col) in row.iter().zip(&schema.columns) {
                            query = bind_value(query, value, col.sql_type);
                        }
                    }
                    query
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to insert rows into {}", table))?;
                }
                tx.commit().await.context("Failed to commit batch")?;
            }
            #[cfg(test)]
            PoolConnection::Sqlite(sqlite_conn) => {
                let mut tx = sqlx::Connection::begin(&mut **sqlite_conn)
                    .await
                    .context("Failed to begin transaction")?;
                for (chunk_idx, chunk) in rows.chunks(chunk_rows).enumerate() {
                    let sql =
                        convert_to_sqlite_placeholders(&self.insert_sql(table, schema, chunk.len()));
                    let first_index = batch.offset + (chunk_idx * chunk_rows) as u64;
                    let mut query = sqlx::query(&sql);
                    for (i, row) in chunk.iter().enumerate() {
                        if self.index_label.is_some() {
                            query = query.bind(index_value(first_index + i as u64)?);
                        }
                        for (value, col) in row.iter().zip(&schema.columns) {
                            query = bind_value(query, value, col.sql_type);
                        }
                    }
                    query
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to insert rows into {}", table))?;
                }
                tx.commit().await.context("Failed to commit batch")?;
            }
        }

        Ok(rows.len() as u64)
    }
}

fn index_value(ordinal: u64) -> Result<i64> {
    i64::try_from(ordinal).context("Row index exceeds BIGINT")
}

/// Bind one value with the Rust type matching its column
///
/// Nulls are bound with the column's type so the server sees a typed NULL.
fn bind_value<'q, DB>(
    query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    value: &Value,
    sql_type: SqlType,
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    Option<bool>: Encode<'q, DB> + Type<DB>,
    Option<i64>: Encode<'q, DB> + Type<DB>,
    Option<f64>: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
    Option<NaiveDate>: Encode<'q, DB> + Type<DB>,
    Option<NaiveDateTime>: Encode<'q, DB> + Type<DB>,
{
    match value {
        Value::Boolean(b) => query.bind(Some(*b)),
        Value::Int(i) => query.bind(Some(*i)),
        Value::Float(f) => query.bind(Some(*f)),
        Value::Text(s) => query.bind(Some(s.clone())),
        Value::Timestamp(ts) => query.bind(Some(*ts)),
        Value::Date(d) => query.bind(Some(*d)),
        Value::Null => match sql_type {
            SqlType::Boolean => query.bind(None::<bool>),
            SqlType::BigInt => query.bind(None::<i64>),
            SqlType::DoublePrecision => query.bind(None::<f64>),
            SqlType::Text => query.bind(None::<String>),
            SqlType::Timestamp => query.bind(None::<NaiveDateTime>),
            SqlType::Date => query.bind(None::<NaiveDate>),
        },
    }
}

/// Convert Postgres-style placeholders ($1, $2, ...) to SQLite-style (?, ?, ...)
#[cfg(test)]
fn convert_to_sqlite_placeholders(sql: &str) -> String {
    let mut result = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            // Skip the dollar sign and any following digits
            while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                chars.next();
            }
            result.push('?');
        } else {
            result.push(ch);
        }
    }

    result
}
