use std::path::PathBuf;

use anyhow::{Error, Result};
use clap::{Args, ValueEnum};
use serde_json::json;

use super::{emit, read_sql_source, recon_failure};
use crate::config::RuntimePaths;
use crate::executor::QueryExecutor;
use crate::models::{Envelope, EnvelopeCommandFailure};
use crate::recon::{ReconError, Side, column_probe_sql, infer_key, inspect_columns};

const COMMAND: &str = "inspect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SideArg {
    Mart,
    Metric,
}

impl From<SideArg> for Side {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Mart => Self::Mart,
            SideArg::Metric => Self::Metric,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    #[arg(value_name = "SQL", required_unless_present = "file")]
    pub sql: Option<String>,

    #[arg(long, value_name = "PATH", conflicts_with = "sql")]
    pub file: Option<PathBuf>,

    /// Label used in messages.
    #[arg(long, value_enum, default_value_t = SideArg::Mart)]
    pub side: SideArg,
}

pub fn run(
    args: &InspectArgs,
    runtime_paths: &RuntimePaths,
    executor: &dyn QueryExecutor,
) -> Result<()> {
    let sql = read_sql_source(
        COMMAND,
        args.sql.as_deref(),
        args.file.as_deref(),
        runtime_paths,
    )?;
    emit(&execute(&sql, args.side.into(), executor)?)
}

/// Probes the query's output columns and reports the key inference would pick.
pub fn execute(sql: &str, side: Side, executor: &dyn QueryExecutor) -> Result<Envelope> {
    let columns = inspect_columns(executor, side, sql)
        .map_err(|failure| recon_failure(COMMAND, &ReconError::Inspection(vec![failure])))?;

    let Some(inferred_key) = infer_key(&columns) else {
        let envelope = Envelope::error(
            COMMAND,
            "no_columns",
            format!("{} query returned no columns", side),
        )
        .with_error_details(json!({ "side": side }));
        return Err(Error::new(EnvelopeCommandFailure::validation(envelope)));
    };

    Ok(Envelope::ok(
        COMMAND,
        json!({
            "side": side,
            "columns": columns,
            "inferred_key": inferred_key,
        }),
    )
    .with_meta("probe_sql", json!(column_probe_sql(sql)))
    .with_meta("dialect", json!(executor.dialect())))
}
