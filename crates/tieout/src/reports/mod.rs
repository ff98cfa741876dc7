//! Built-in report definitions and their parameter checks.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::Date;
use time::format_description::well_known::Iso8601;
use time::macros::format_description;

pub const QUERY_ENDPOINT: &str = "/api/reports/query";
pub const SCHEMA_ENDPOINT: &str = "/api/reports/schema";
pub const MART_METRIC_RECONCILIATION: &str = "mart_metric_reconciliation";
pub const EXECUTE_QUERY: &str = "execute_query";
pub const SCHEMA_INTROSPECTION: &str = "schema_introspection";

/// Key under which report-level (not per-parameter) errors are filed.
pub const GENERAL_ERROR_KEY: &str = "_";

pub const DEFAULT_MART_SQL: &str = "SELECT * FROM information_schema.tables WHERE table_schema = 'gold_marts' ORDER BY table_name LIMIT 100";
pub const DEFAULT_METRIC_SQL: &str = "SELECT * FROM information_schema.tables WHERE table_schema = 'gold_metrics' ORDER BY table_name LIMIT 100";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    Executive,
    Revenue,
    Growth,
    Product,
    Ops,
    Engineering,
    CustomerSuccess,
    Tools,
}

impl ReportCategory {
    pub const ALL: [Self; 8] = [
        Self::Executive,
        Self::Revenue,
        Self::Growth,
        Self::Product,
        Self::Ops,
        Self::Engineering,
        Self::CustomerSuccess,
        Self::Tools,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executive => "executive",
            Self::Revenue => "revenue",
            Self::Growth => "growth",
            Self::Product => "product",
            Self::Ops => "ops",
            Self::Engineering => "engineering",
            Self::CustomerSuccess => "customer_success",
            Self::Tools => "tools",
        }
    }
}

impl Display for ReportCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| format!("unknown report category: {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Date,
    Select,
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportParameter {
    pub name: String,
    pub label: String,
    pub kind: ParameterKind,
    pub required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ParameterOption>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ReportParameter {
    fn sql(default: &str) -> Self {
        Self {
            name: "sql".to_string(),
            label: "SQL".to_string(),
            kind: ParameterKind::Text,
            required: true,
            default: Some(Value::String(default.to_string())),
            options: Vec::new(),
            placeholder: Some("Enter SQL query".to_string()),
            description: Some("Preloaded SQL can be edited before running.".to_string()),
        }
    }

    fn named_sql(name: &str, label: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            ..Self::sql(default)
        }
    }

    fn column(name: &str, label: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: ParameterKind::Text,
            required: false,
            default: None,
            options: Vec::new(),
            placeholder: Some("auto-detect".to_string()),
            description: Some(description.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: ReportCategory,
    pub endpoint: String,
    pub parameters: Vec<ReportParameter>,
}

pub type ReportCatalog = BTreeMap<String, ReportDefinition>;

/// Per-parameter validation messages, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize)]
#[error("invalid report parameters: {}", render_param_errors(.errors))]
pub struct ParamErrors {
    pub errors: BTreeMap<String, String>,
}

impl ParamErrors {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(String::as_str)
    }
}

fn render_param_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(name, message)| format!("{name}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[must_use]
pub fn builtin_catalog() -> ReportCatalog {
    let reports = [
        ReportDefinition {
            id: SCHEMA_INTROSPECTION.to_string(),
            name: "Warehouse Schema Explorer".to_string(),
            description: "View modeled warehouse columns from bronze, silver, and gold schemas."
                .to_string(),
            category: ReportCategory::Tools,
            endpoint: SCHEMA_ENDPOINT.to_string(),
            parameters: Vec::new(),
        },
        ReportDefinition {
            id: EXECUTE_QUERY.to_string(),
            name: "Custom SQL Query".to_string(),
            description: "Run ad-hoc SQL against the warehouse.".to_string(),
            category: ReportCategory::Tools,
            endpoint: QUERY_ENDPOINT.to_string(),
            parameters: vec![ReportParameter::sql(
                "SELECT * FROM gold_metrics.v_daily_kpis ORDER BY date DESC LIMIT 100",
            )],
        },
        ReportDefinition {
            id: MART_METRIC_RECONCILIATION.to_string(),
            name: "Mart vs Metric Tie-Out".to_string(),
            description: "Tie a mart query to its governed metric query on a shared key."
                .to_string(),
            category: ReportCategory::Tools,
            endpoint: QUERY_ENDPOINT.to_string(),
            parameters: vec![
                ReportParameter::named_sql("mart_sql", "Mart SQL", DEFAULT_MART_SQL),
                ReportParameter::named_sql("metric_sql", "Metric SQL", DEFAULT_METRIC_SQL),
                ReportParameter::column("mart_key", "Mart key", "Join key column in the mart query"),
                ReportParameter::column(
                    "metric_key",
                    "Metric key",
                    "Join key column in the metric query",
                ),
                ReportParameter::column(
                    "mart_amount",
                    "Mart amount",
                    "Numeric column compared against the metric amount",
                ),
                ReportParameter::column(
                    "metric_amount",
                    "Metric amount",
                    "Numeric column compared against the mart amount",
                ),
            ],
        },
    ];

    reports
        .into_iter()
        .map(|report| (report.id.clone(), report))
        .collect()
}

/// Checks supplied values against a report's parameter list.
///
/// Blank strings count as missing. Unknown report ids fail under `_`.
pub fn validate_params(
    catalog: &ReportCatalog,
    report_id: &str,
    values: &BTreeMap<String, Value>,
) -> Result<(), ParamErrors> {
    let Some(report) = catalog.get(report_id) else {
        let mut errors = BTreeMap::new();
        errors.insert(GENERAL_ERROR_KEY.to_string(), "Unknown report".to_string());
        return Err(ParamErrors { errors });
    };

    let mut errors = BTreeMap::new();
    for parameter in &report.parameters {
        let value = values.get(&parameter.name).filter(|value| !is_blank(value));
        let Some(value) = value else {
            if parameter.required {
                errors.insert(
                    parameter.name.clone(),
                    format!("{} is required", parameter.label),
                );
            }
            continue;
        };

        let problem = match parameter.kind {
            ParameterKind::Date if !is_valid_date(value) => Some("Invalid date format"),
            ParameterKind::Number if !is_valid_number(value) => Some("Must be a valid number"),
            ParameterKind::Select if !is_listed_option(parameter, value) => {
                Some("Not one of the allowed options")
            }
            _ => None,
        };
        if let Some(problem) = problem {
            errors.insert(parameter.name.clone(), problem.to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ParamErrors { errors })
    }
}

#[must_use]
pub fn reports_by_category(
    catalog: &ReportCatalog,
) -> BTreeMap<ReportCategory, Vec<&ReportDefinition>> {
    let mut grouped: BTreeMap<ReportCategory, Vec<&ReportDefinition>> = BTreeMap::new();
    for report in catalog.values() {
        grouped.entry(report.category).or_default().push(report);
    }
    grouped
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn is_valid_date(value: &Value) -> bool {
    let Value::String(text) = value else {
        return false;
    };
    let text = text.trim();
    Date::parse(text, format_description!("[year]-[month]-[day]")).is_ok()
        || time::OffsetDateTime::parse(text, &Iso8601::DEFAULT).is_ok()
}

fn is_valid_number(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(text) => text.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

fn is_listed_option(parameter: &ReportParameter, value: &Value) -> bool {
    if parameter.options.is_empty() {
        return true;
    }
    let Value::String(text) = value else {
        return false;
    };
    parameter.options.iter().any(|option| option.value == *text)
}
