use async_trait::async_trait;
use duckdb::types::Value;
use duckdb::Connection;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::compare::table::{Column, ResultTable};
use crate::compare::value::CellValue;

#[derive(Debug)]
pub enum ExecError {
    /// The query exceeded its deadline and the session was interrupted.
    Timeout,
    /// The database rejected or errored on the query.
    Database(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Timeout => write!(f, "query execution timed out"),
            ExecError::Database(msg) => write!(f, "query execution error: {}", msg),
        }
    }
}

impl Error for ExecError {}

/// Executes a query against a named database and materializes the result.
/// Implementations must be safe to call concurrently; each call owns its own
/// session so that a timeout interrupt never touches a sibling task.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(
        &self,
        query: &str,
        db_name: &str,
        timeout: Duration,
    ) -> Result<ResultTable, ExecError>;
}

/// DuckDB executor over per-subject database files laid out as
/// `<data_dir>/<db>/<db>.duckdb`.
pub struct DuckDbExecutor {
    data_dir: PathBuf,
}

impl DuckDbExecutor {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn db_path(&self, db_name: &str) -> PathBuf {
        self.data_dir.join(db_name).join(format!("{}.duckdb", db_name))
    }

    /// Builds a markdown schema description of every table in the named
    /// database, for use as generator prompt context.
    pub async fn table_metadata(&self, db_name: &str) -> Result<String, ExecError> {
        let path = self.db_path(db_name);
        tokio::task::spawn_blocking(move || -> Result<String, ExecError> {
            let conn = Connection::open(&path).map_err(db_err)?;
            let mut metadata = String::from("# DATABASE SCHEMA\n\n");

            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table'")
                .map_err(db_err)?;
            let tables: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(db_err)?
                .filter_map(Result::ok)
                .collect();

            for table_name in &tables {
                metadata.push_str(&format!("## Table: {}\n\n", table_name));
                let mut col_stmt = conn
                    .prepare(&format!("PRAGMA table_info(\"{}\")", table_name))
                    .map_err(db_err)?;
                let columns: Vec<(String, String)> = col_stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                    })
                    .map_err(db_err)?
                    .filter_map(Result::ok)
                    .collect();
                for (name, data_type) in columns {
                    metadata.push_str(&format!("- {} ({})\n", name, data_type));
                }
                metadata.push('\n');
            }

            Ok(metadata)
        })
        .await
        .map_err(|e| ExecError::Database(format!("schema task failed: {}", e)))?
    }
}

#[async_trait]
impl QueryExecutor for DuckDbExecutor {
    async fn execute(
        &self,
        query: &str,
        db_name: &str,
        timeout: Duration,
    ) -> Result<ResultTable, ExecError> {
        let path = self.db_path(db_name);
        debug!("Executing against {}: {}", path.display(), query);

        let conn = Connection::open(&path).map_err(db_err)?;
        let interrupt = conn.interrupt_handle();
        let sql = query.to_string();
        let mut task = tokio::task::spawn_blocking(move || run_query(&conn, &sql));

        tokio::select! {
            result = &mut task => match result {
                Ok(table) => table,
                Err(e) => Err(ExecError::Database(format!("execution task failed: {}", e))),
            },
            _ = sleep(timeout) => {
                warn!("Query exceeded {}s deadline, interrupting session", timeout.as_secs());
                interrupt.interrupt();
                // Reap the blocking task; the interrupted query surfaces a
                // database error we replace with the timeout classification.
                let _ = task.await;
                Err(ExecError::Timeout)
            }
        }
    }
}

fn db_err(e: impl fmt::Display) -> ExecError {
    ExecError::Database(e.to_string())
}

fn run_query(conn: &Connection, sql: &str) -> Result<ResultTable, ExecError> {
    let mut stmt = conn.prepare(sql).map_err(db_err)?;
    let column_count = stmt.column_count();
    let mut names = Vec::with_capacity(column_count);
    for i in 0..column_count {
        names.push(stmt.column_name(i).map_err(db_err)?.to_string());
    }

    let mut rows = stmt.query([]).map_err(db_err)?;
    let mut values: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];
    while let Some(row) = rows.next().map_err(db_err)? {
        for (i, column) in values.iter_mut().enumerate() {
            let value: Value = row.get(i).map_err(db_err)?;
            column.push(cell_from_value(value));
        }
    }

    let columns = names
        .into_iter()
        .zip(values)
        .map(|(name, values)| Column::new(name, values))
        .collect();
    Ok(ResultTable::new(columns))
}

// Temporal values collapse to their raw backing integers; both sides of a
// comparison run on the same backend, so the units always agree.
fn cell_from_value(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Boolean(b) => CellValue::Boolean(b),
        Value::TinyInt(i) => CellValue::Integer(i as i64),
        Value::SmallInt(i) => CellValue::Integer(i as i64),
        Value::Int(i) => CellValue::Integer(i as i64),
        Value::BigInt(i) => CellValue::Integer(i),
        // The wide types saturate at the i64 range instead of wrapping, so
        // an out-of-range value never aliases an unrelated in-range one.
        Value::HugeInt(i) => CellValue::Integer(i64::try_from(i).unwrap_or_else(|_| {
            if i.is_negative() { i64::MIN } else { i64::MAX }
        })),
        Value::UTinyInt(i) => CellValue::Integer(i as i64),
        Value::USmallInt(i) => CellValue::Integer(i as i64),
        Value::UInt(i) => CellValue::Integer(i as i64),
        Value::UBigInt(i) => CellValue::Integer(i64::try_from(i).unwrap_or(i64::MAX)),
        Value::Float(f) => CellValue::Float(f as f64),
        Value::Double(f) => CellValue::Float(f),
        Value::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(CellValue::Float)
            .unwrap_or(CellValue::Null),
        Value::Timestamp(_, raw) => CellValue::Integer(raw),
        Value::Date32(d) => CellValue::Integer(d as i64),
        Value::Time64(_, raw) => CellValue::Integer(raw),
        Value::Text(s) => CellValue::Text(s),
        Value::Blob(b) => CellValue::Text(String::from_utf8_lossy(&b).into_owned()),
        other => CellValue::Text(format!("{:?}", other)),
    }
}
