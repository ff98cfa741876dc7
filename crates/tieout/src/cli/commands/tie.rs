use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use log::warn;
use serde_json::json;

use super::{
    emit, read_sql_source, recon_error_details, recon_failure, recon_failure_with_details,
};
use crate::config::RuntimePaths;
use crate::executor::QueryExecutor;
use crate::models::{Envelope, TieOutSummary};
use crate::recon::{AmountSelection, KeySelection, ReconciliationView};

const COMMAND: &str = "tie";

#[derive(Debug, Clone, Args)]
pub struct TieArgs {
    #[arg(long, value_name = "SQL", required_unless_present = "mart_sql_file")]
    pub mart_sql: Option<String>,

    #[arg(long, value_name = "PATH", conflicts_with = "mart_sql")]
    pub mart_sql_file: Option<PathBuf>,

    #[arg(long, value_name = "SQL", required_unless_present = "metric_sql_file")]
    pub metric_sql: Option<String>,

    #[arg(long, value_name = "PATH", conflicts_with = "metric_sql")]
    pub metric_sql_file: Option<PathBuf>,

    /// Join key of the mart query; inferred when omitted.
    #[arg(long, value_name = "COLUMN")]
    pub mart_key: Option<String>,

    /// Join key of the metric query; inferred when omitted.
    #[arg(long, value_name = "COLUMN")]
    pub metric_key: Option<String>,

    #[arg(long, value_name = "COLUMN")]
    pub mart_amount: Option<String>,

    #[arg(long, value_name = "COLUMN")]
    pub metric_amount: Option<String>,

    /// Also run the mart query on its own and include its rows.
    #[arg(long, default_value_t = false)]
    pub with_mart: bool,

    /// Print the generated reconciliation SQL without executing it.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl TieArgs {
    fn view(&self, runtime_paths: &RuntimePaths) -> Result<ReconciliationView> {
        let mart_sql = read_sql_source(
            "mart",
            self.mart_sql.as_deref(),
            self.mart_sql_file.as_deref(),
            runtime_paths,
        )?;
        let metric_sql = read_sql_source(
            "metric",
            self.metric_sql.as_deref(),
            self.metric_sql_file.as_deref(),
            runtime_paths,
        )?;

        Ok(ReconciliationView::new(mart_sql, metric_sql)
            .with_keys(KeySelection {
                mart_key: self.mart_key.clone(),
                metric_key: self.metric_key.clone(),
            })
            .with_amounts(AmountSelection {
                mart_amount: self.mart_amount.clone(),
                metric_amount: self.metric_amount.clone(),
            }))
    }
}

pub fn run(
    args: &TieArgs,
    runtime_paths: &RuntimePaths,
    executor: &dyn QueryExecutor,
) -> Result<()> {
    let mut view = args.view(runtime_paths)?;
    let envelope = if args.dry_run {
        preview(&mut view, executor)?
    } else {
        execute(&mut view, args.with_mart, executor)?
    };
    emit(&envelope)
}

pub fn preview(view: &mut ReconciliationView, executor: &dyn QueryExecutor) -> Result<Envelope> {
    let sql = view
        .preview_sql(executor)
        .map_err(|error| recon_failure(COMMAND, &error))?;

    Ok(Envelope::ok(
        COMMAND,
        json!({
            "sql": sql,
            "keys": view.keys,
            "amounts": view.amounts,
            "mart_columns": view.mart_columns(),
            "metric_columns": view.metric_columns(),
        }),
    )
    .with_meta("dry_run", json!(true))
    .with_meta("dialect", json!(executor.dialect())))
}

/// Runs the reconciliation (and optionally the mart panel query) and reports
/// rows plus a status summary.
pub fn execute(
    view: &mut ReconciliationView,
    with_mart: bool,
    executor: &dyn QueryExecutor,
) -> Result<Envelope> {
    let mart_outcome = if with_mart {
        Some(view.run_mart_query(executor).map(|_| ()))
    } else {
        None
    };

    if let Err(error) = view.run_tie_out(executor) {
        let mut details = recon_error_details(&error);
        if mart_outcome.is_some() {
            details["mart"] = mart_panel_json(view);
        }
        return Err(recon_failure_with_details(COMMAND, &error, details));
    }

    let rows = view
        .tie_rows()
        .context("reconciliation result did not have the expected shape")?;
    let summary = TieOutSummary::from_rows(&rows);
    let truncated = view.tie_result().is_some_and(|result| result.truncated);

    let mut data = json!({
        "keys": view.keys,
        "amounts": view.amounts,
        "summary": summary,
        "rows": rows,
    });

    let mut envelope_warnings = Vec::new();
    if is_blank(view.amounts.mart_amount.as_deref())
        && is_blank(view.amounts.metric_amount.as_deref())
    {
        envelope_warnings.push((
            "no_amounts",
            "no amount columns selected; only key coverage is compared".to_string(),
        ));
    }
    if truncated {
        envelope_warnings.push(("truncated", "reconciliation rows were truncated".to_string()));
    }

    if let Some(outcome) = mart_outcome {
        data["mart"] = mart_panel_json(view);
        if let Err(error) = outcome {
            warn!("mart panel query failed: {error}");
            envelope_warnings.push(("mart_query_failed", error.to_string()));
        }
    }

    let envelope = envelope_warnings.into_iter().fold(
        Envelope::ok(COMMAND, data)
            .with_meta("dialect", json!(executor.dialect()))
            .with_meta("state", json!(view.state()))
            .with_meta("row_count", json!(summary.total_rows))
            .with_meta("tied", json!(summary.is_tied()))
            .with_meta("sql", json!(view.last_sql())),
        |envelope, (code, message)| envelope.with_warning(code, message),
    );
    Ok(envelope)
}

fn mart_panel_json(view: &ReconciliationView) -> serde_json::Value {
    let panel = view.mart_panel();
    json!({
        "result": panel.result,
        "error": panel.error,
    })
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}
