pub mod inspect;
pub mod query;
pub mod reports;
pub mod schema;
pub mod tie;

use std::path::Path;

use anyhow::{Context, Error, Result, bail};
use log::info;
use serde_json::json;

use crate::config::{RuntimePaths, WarehouseTarget, resolve_user_path};
use crate::executor::{HttpExecutor, QueryExecutor, SqliteExecutor};
use crate::models::{Envelope, EnvelopeCommandFailure};
use crate::recon::{ReconError, SqlDialect};

/// Opens the warehouse the runtime paths point at.
///
/// `dialect` only applies to remote warehouses.
pub fn open_executor(
    runtime_paths: &RuntimePaths,
    dialect: SqlDialect,
) -> Result<Box<dyn QueryExecutor>> {
    match &runtime_paths.warehouse {
        WarehouseTarget::Sqlite(path) => {
            info!("using sqlite warehouse {}", path.display());
            Ok(Box::new(SqliteExecutor::open(path)?))
        }
        WarehouseTarget::Remote { base_url, timeout } => {
            let executor = HttpExecutor::new(base_url, *timeout)?.with_dialect(dialect);
            info!("using remote warehouse {} ({dialect})", executor.endpoint());
            Ok(Box::new(executor))
        }
    }
}

/// Reads SQL given inline or from a file resolved against the runtime cwd.
pub fn read_sql_source(
    label: &str,
    inline: Option<&str>,
    file: Option<&Path>,
    runtime_paths: &RuntimePaths,
) -> Result<String> {
    match (inline, file) {
        (Some(sql), None) => Ok(sql.to_string()),
        (None, Some(file)) => {
            let path = resolve_user_path(file, &runtime_paths.home_dir, &runtime_paths.cwd)?;
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {label} sql file: {}", path.display()))
        }
        (Some(_), Some(_)) => bail!("{label} sql given both inline and as a file"),
        (None, None) => bail!("{label} sql is required"),
    }
}

pub fn emit(envelope: &Envelope) -> Result<()> {
    let encoded = envelope
        .encode()
        .context("failed to serialize command envelope")?;
    println!("{encoded}");
    Ok(())
}

/// Wraps a reconciliation failure in an envelope failure.
///
/// A failed tie-out query is a runtime fault; every other reconciliation
/// error is rejected input.
pub fn recon_failure(command: &str, error: &ReconError) -> Error {
    recon_failure_with_details(command, error, recon_error_details(error))
}

pub fn recon_failure_with_details(
    command: &str,
    error: &ReconError,
    details: serde_json::Value,
) -> Error {
    let envelope =
        Envelope::error(command, error.code(), error.to_string()).with_error_details(details);
    let failure = match error {
        ReconError::Execution(_) => EnvelopeCommandFailure::new(envelope),
        _ => EnvelopeCommandFailure::validation(envelope),
    };
    Error::new(failure)
}

pub fn recon_error_details(error: &ReconError) -> serde_json::Value {
    match error {
        ReconError::Inspection(failures) => json!({ "failures": failures }),
        ReconError::KeyUndetected { side } => json!({ "side": side }),
        ReconError::KeyNotFound { side, role, column }
        | ReconError::Validation { side, role, column } => {
            json!({ "side": side, "role": role, "column": column })
        }
        ReconError::Execution(_) => json!({}),
    }
}
