use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Error, Result};
use log::{debug, warn};
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};

use super::QueryExecutor;
use super::guardrail::{normalize_sql, validate_read_only_sql};
use crate::models::{QueryResult, Row, ScalarValue};
use crate::recon::SqlDialect;

pub const DEFAULT_ROW_CAP: usize = 10_000;
pub const TRY_CAST_DOUBLE_FUNCTION: &str = "try_cast_double";

/// Local SQLite warehouse behind the query collaborator contract.
///
/// The connection sits behind a mutex, so concurrent callers take turns.
#[derive(Debug)]
pub struct SqliteExecutor {
    connection: Mutex<Connection>,
    row_cap: usize,
}

impl SqliteExecutor {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create sqlite parent directory: {}",
                    parent.display()
                )
            })?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database: {}", path.display()))?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory sqlite database")?;
        Self::from_connection(connection)
    }

    pub fn from_connection(connection: Connection) -> Result<Self> {
        register_try_cast_double(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            row_cap: DEFAULT_ROW_CAP,
        })
    }

    #[must_use]
    pub fn with_row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = row_cap.max(1);
        self
    }

    /// Runs trusted setup SQL, bypassing the read-only guardrail.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::msg("sqlite connection lock poisoned"))?;
        connection
            .execute_batch(sql)
            .context("failed to execute sqlite batch")
    }

    fn run(&self, sql: &str) -> Result<QueryResult> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::msg("sqlite connection lock poisoned"))?;
        execute_read_only_query(&connection, normalize_sql(sql), self.row_cap)
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute_query(&self, sql: &str) -> QueryResult {
        if let Err(violation) = validate_read_only_sql(sql) {
            warn!("rejected query: {violation}");
            return QueryResult::failure(violation.to_string());
        }

        match self.run(sql) {
            Ok(result) => {
                debug!(
                    "sqlite query returned {} row(s) (truncated={})",
                    result.row_count, result.truncated
                );
                result
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!("sqlite query failed: {message}");
                QueryResult::failure(message)
            }
        }
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }
}

fn register_try_cast_double(connection: &Connection) -> Result<()> {
    connection
        .create_scalar_function(
            TRY_CAST_DOUBLE_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |context| {
                let value = match context.get_raw(0) {
                    ValueRef::Integer(integer) => Some(integer as f64),
                    ValueRef::Real(real) => Some(real),
                    ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                        .ok()
                        .and_then(|text| text.trim().parse::<f64>().ok())
                        .filter(|parsed| parsed.is_finite()),
                    ValueRef::Null | ValueRef::Blob(_) => None,
                };
                Ok(value)
            },
        )
        .with_context(|| format!("failed to register sqlite function `{TRY_CAST_DOUBLE_FUNCTION}`"))
}

fn execute_read_only_query(
    connection: &Connection,
    sql: &str,
    row_cap: usize,
) -> Result<QueryResult> {
    let mut statement = connection
        .prepare(sql)
        .map_err(|error| Error::new(error).context("failed to prepare query"))?;
    let column_names = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let mut rows = statement
        .query([])
        .map_err(|error| Error::new(error).context("failed to execute query"))?;
    let mut result_rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows
        .next()
        .map_err(|error| Error::new(error).context("failed to fetch query row"))?
    {
        if result_rows.len() >= row_cap {
            truncated = true;
            break;
        }

        let mut record = Row::new();
        for (index, column_name) in column_names.iter().enumerate() {
            let value = row
                .get::<usize, SqlValue>(index)
                .map_err(|error| Error::new(error).context("failed to decode query column"))?;
            record
                .entry(column_name.clone())
                .or_insert_with(|| scalar_from_sql(value));
        }
        result_rows.push(record);
    }

    Ok(QueryResult::ok(column_names, result_rows).with_truncated(truncated))
}

fn scalar_from_sql(value: SqlValue) -> ScalarValue {
    match value {
        SqlValue::Null => ScalarValue::Null,
        SqlValue::Integer(value) => ScalarValue::integer(value),
        SqlValue::Real(value) => ScalarValue::real(value),
        SqlValue::Text(value) => ScalarValue::Text(value),
        SqlValue::Blob(value) => ScalarValue::Text(encode_blob_hex(&value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}
