use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Error, Result};
use clap::Args;
use serde_json::json;

use super::{emit, read_sql_source};
use crate::config::RuntimePaths;
use crate::executor::{QueryExecutor, validate_read_only_sql};
use crate::models::{Envelope, EnvelopeCommandFailure, QUERY_FALLBACK_ERROR};

const COMMAND: &str = "query";

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[arg(value_name = "SQL", required_unless_present = "file")]
    pub sql: Option<String>,

    #[arg(long, value_name = "PATH", conflicts_with = "sql")]
    pub file: Option<PathBuf>,
}

pub fn run(
    args: &QueryArgs,
    runtime_paths: &RuntimePaths,
    executor: &dyn QueryExecutor,
) -> Result<()> {
    let sql = read_sql_source(
        COMMAND,
        args.sql.as_deref(),
        args.file.as_deref(),
        runtime_paths,
    )?;
    emit(&execute(&sql, executor)?)
}

/// Runs one guarded read-only query and wraps the outcome in an envelope.
pub fn execute(sql: &str, executor: &dyn QueryExecutor) -> Result<Envelope> {
    if let Err(violation) = validate_read_only_sql(sql) {
        let envelope = Envelope::error(COMMAND, "sql_guardrail_violation", violation.to_string())
            .with_meta("guardrail_checked", json!(true))
            .with_error_details(json!(violation));
        return Err(Error::new(EnvelopeCommandFailure::validation(envelope)));
    }

    let started = Instant::now();
    let result = executor.execute_query(sql);
    let duration_ms = started.elapsed().as_millis() as u64;

    if !result.success {
        let envelope = Envelope::error(
            COMMAND,
            "query_execution_failed",
            result.error_message_or(QUERY_FALLBACK_ERROR),
        )
        .with_meta("guardrail_checked", json!(true))
        .with_meta("dialect", json!(executor.dialect()))
        .with_meta("duration_ms", json!(duration_ms));
        return Err(Error::new(EnvelopeCommandFailure::new(envelope)));
    }

    let data = serde_json::to_value(&result).context("failed to serialize query result")?;
    Ok(Envelope::ok(COMMAND, data)
        .with_meta("guardrail_checked", json!(true))
        .with_meta("dialect", json!(executor.dialect()))
        .with_meta("row_count", json!(result.row_count))
        .with_meta("truncated", json!(result.truncated))
        .with_meta("duration_ms", json!(duration_ms)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::execute;
    use crate::executor::SqliteExecutor;
    use crate::models::EnvelopeCommandFailure;

    fn executor() -> SqliteExecutor {
        let executor = SqliteExecutor::open_in_memory().expect("sqlite should open");
        executor
            .execute_batch(
                "CREATE TABLE clients (client_id INTEGER, revenue REAL);
                 INSERT INTO clients VALUES (1, 10.5), (2, 20.0);",
            )
            .expect("fixture should load");
        executor
    }

    #[test]
    fn successful_query_carries_rows_and_meta() {
        let envelope = execute("SELECT * FROM clients ORDER BY client_id;", &executor())
            .expect("query should succeed");

        assert!(envelope.ok);
        assert_eq!(envelope.meta.get("row_count"), Some(&json!(2)));
        assert_eq!(envelope.meta.get("dialect"), Some(&json!("sqlite")));
        let data = envelope.data.expect("data should be present");
        assert_eq!(data.pointer("/data/1/revenue"), Some(&json!(20.0)));
    }

    #[test]
    fn mutating_sql_is_rejected_before_execution() {
        let error = execute("DELETE FROM clients", &executor()).expect_err("delete must fail");
        let failure = error
            .downcast_ref::<EnvelopeCommandFailure>()
            .expect("failure should carry an envelope");

        assert!(failure.is_validation_failure());
        let envelope = failure.envelope();
        let detail = envelope.error.as_ref().expect("error should be present");
        assert_eq!(detail.code, "sql_guardrail_violation");
        assert_eq!(detail.message, "Query contains forbidden operation: DELETE");
        assert_eq!(
            detail.details.as_ref().and_then(|d| d.get("reason")),
            Some(&json!("mutating_statement"))
        );
    }

    #[test]
    fn engine_errors_are_runtime_failures() {
        let error = execute("SELECT * FROM missing_table", &executor())
            .expect_err("unknown table must fail");
        let failure = error
            .downcast_ref::<EnvelopeCommandFailure>()
            .expect("failure should carry an envelope");

        assert!(!failure.is_validation_failure());
        assert_eq!(
            failure.envelope().error.as_ref().map(|e| e.code.as_str()),
            Some("query_execution_failed")
        );
    }
}
