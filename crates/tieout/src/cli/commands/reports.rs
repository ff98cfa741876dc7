use std::collections::BTreeMap;

use anyhow::{Context, Error, Result};
use clap::Args;
use serde_json::{Value, json};

use super::emit;
use crate::models::{Envelope, EnvelopeCommandFailure};
use crate::reports::{
    ReportCatalog, ReportCategory, builtin_catalog, reports_by_category, validate_params,
};

const COMMAND: &str = "reports";

#[derive(Debug, Clone, Args)]
pub struct ReportsArgs {
    /// Only list reports in this category (e.g. `tools`).
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<String>,

    /// Validate parameters for this report id instead of listing.
    #[arg(long, value_name = "REPORT_ID")]
    pub check: Option<String>,

    /// `name=value` parameter, repeatable. Only used with `--check`.
    #[arg(long = "param", value_name = "NAME=VALUE", requires = "check")]
    pub params: Vec<String>,
}

pub fn run(args: &ReportsArgs) -> Result<()> {
    let catalog = builtin_catalog();
    let envelope = match &args.check {
        Some(report_id) => check(&catalog, report_id, &args.params)?,
        None => list(&catalog, args.category.as_deref())?,
    };
    emit(&envelope)
}

pub fn list(catalog: &ReportCatalog, category: Option<&str>) -> Result<Envelope> {
    let category = category.map(parse_category).transpose()?;
    let grouped = reports_by_category(catalog)
        .into_iter()
        .filter(|(group, _)| category.is_none_or(|wanted| wanted == *group))
        .map(|(group, reports)| (group.as_str().to_string(), json!(reports)))
        .collect::<serde_json::Map<String, Value>>();

    let count = grouped
        .values()
        .filter_map(Value::as_array)
        .map(Vec::len)
        .sum::<usize>();
    Ok(Envelope::ok(COMMAND, Value::Object(grouped)).with_meta("report_count", json!(count)))
}

pub fn check(catalog: &ReportCatalog, report_id: &str, raw_params: &[String]) -> Result<Envelope> {
    let values = parse_params(raw_params)?;
    match validate_params(catalog, report_id, &values) {
        Ok(()) => Ok(Envelope::ok(
            COMMAND,
            json!({ "report_id": report_id, "valid": true }),
        )),
        Err(errors) => {
            let envelope = Envelope::error(COMMAND, "invalid_params", errors.to_string())
                .with_error_details(json!(errors));
            Err(Error::new(EnvelopeCommandFailure::validation(envelope)))
        }
    }
}

fn parse_params(raw_params: &[String]) -> Result<BTreeMap<String, Value>> {
    raw_params
        .iter()
        .map(|raw| {
            let (name, value) = raw
                .split_once('=')
                .with_context(|| format!("parameter must be NAME=VALUE: {raw}"))?;
            Ok((name.trim().to_string(), Value::String(value.to_string())))
        })
        .collect()
}

fn parse_category(raw: &str) -> Result<ReportCategory> {
    raw.parse::<ReportCategory>().map_err(Error::msg)
}
