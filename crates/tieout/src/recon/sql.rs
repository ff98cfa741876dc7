use super::dialect::SqlDialect;
use super::error::{ColumnRole, ReconError, Side};
use super::identifier::SafeIdentifier;
use crate::executor::normalize_sql;

/// Hard cap on reconciliation rows; not caller-configurable.
pub const TIE_OUT_ROW_LIMIT: usize = 1_000;

pub const MART_CTE: &str = "mart_query";
pub const METRIC_CTE: &str = "metric_query";
const MART_ALIAS: &str = "m";
const METRIC_ALIAS: &str = "g";

pub const TIE_OUT_COLUMNS: [&str; 7] = [
    "tie_key",
    "mart_key_value",
    "metric_key_value",
    "tie_status",
    "mart_amount",
    "metric_amount",
    "amount_delta",
];

/// Fully validated inputs of one reconciliation statement.
///
/// Column names can only be supplied as [`SafeIdentifier`]s, so nothing
/// unvalidated is ever interpolated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieOutSpec {
    pub mart_query: String,
    pub metric_query: String,
    pub mart_key: SafeIdentifier,
    pub metric_key: SafeIdentifier,
    pub mart_amount: Option<SafeIdentifier>,
    pub metric_amount: Option<SafeIdentifier>,
}

/// Raw, possibly user-typed column choices for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnChoice<'a> {
    pub mart_key: &'a str,
    pub metric_key: &'a str,
    pub mart_amount: Option<&'a str>,
    pub metric_amount: Option<&'a str>,
}

impl TieOutSpec {
    /// Checks every chosen column against its side's column set and the
    /// identifier rules.
    ///
    /// Keys are checked for presence before shape; amounts for shape before
    /// presence. Blank amount names mean "no amount".
    pub fn resolve(
        mart_query: &str,
        metric_query: &str,
        mart_columns: &[String],
        metric_columns: &[String],
        choice: ColumnChoice<'_>,
    ) -> Result<Self, ReconError> {
        require_present(Side::Mart, ColumnRole::Key, choice.mart_key, mart_columns)?;
        require_present(Side::Metric, ColumnRole::Key, choice.metric_key, metric_columns)?;
        let mart_key = require_safe(Side::Mart, ColumnRole::Key, choice.mart_key)?;
        let metric_key = require_safe(Side::Metric, ColumnRole::Key, choice.metric_key)?;

        let mart_amount = non_blank(choice.mart_amount);
        let metric_amount = non_blank(choice.metric_amount);
        let mart_amount = mart_amount
            .map(|name| require_safe(Side::Mart, ColumnRole::Amount, name))
            .transpose()?;
        let metric_amount = metric_amount
            .map(|name| require_safe(Side::Metric, ColumnRole::Amount, name))
            .transpose()?;
        if let Some(amount) = &mart_amount {
            require_present(Side::Mart, ColumnRole::Amount, amount.as_str(), mart_columns)?;
        }
        if let Some(amount) = &metric_amount {
            require_present(
                Side::Metric,
                ColumnRole::Amount,
                amount.as_str(),
                metric_columns,
            )?;
        }

        Ok(Self {
            mart_query: normalize_sql(mart_query).to_string(),
            metric_query: normalize_sql(metric_query).to_string(),
            mart_key,
            metric_key,
            mart_amount,
            metric_amount,
        })
    }
}

/// Composes both queries into one full-outer-join comparison statement.
///
/// Unmatched rows sort first, then larger absolute deltas, then `tie_key`.
#[must_use]
pub fn build_tie_out_sql(spec: &TieOutSpec, dialect: SqlDialect) -> String {
    let mart_key = spec.mart_key.qualified(MART_ALIAS);
    let metric_key = spec.metric_key.qualified(METRIC_ALIAS);
    let mart_key_text = dialect.text_cast(&mart_key);
    let metric_key_text = dialect.text_cast(&metric_key);
    let mart_amount = amount_expr(spec.mart_amount.as_ref(), MART_ALIAS, dialect);
    let metric_amount = amount_expr(spec.metric_amount.as_ref(), METRIC_ALIAS, dialect);
    let delta = format!("COALESCE({mart_amount}, 0) - COALESCE({metric_amount}, 0)");

    format!(
        "WITH {MART_CTE} AS (
{mart_query}
),
{METRIC_CTE} AS (
{metric_query}
)
SELECT
    COALESCE({mart_key_text}, {metric_key_text}) AS tie_key,
    {mart_key} AS mart_key_value,
    {metric_key} AS metric_key_value,
    CASE
        WHEN {mart_key} IS NULL THEN 'metric_only'
        WHEN {metric_key} IS NULL THEN 'mart_only'
        ELSE 'matched'
    END AS tie_status,
    {mart_amount} AS mart_amount,
    {metric_amount} AS metric_amount,
    {delta} AS amount_delta
FROM {MART_CTE} {MART_ALIAS}
FULL OUTER JOIN {METRIC_CTE} {METRIC_ALIAS}
    ON {mart_key_text} = {metric_key_text}
ORDER BY
    CASE WHEN {mart_key} IS NULL OR {metric_key} IS NULL THEN 0 ELSE 1 END,
    ABS({delta}) DESC,
    tie_key
LIMIT {TIE_OUT_ROW_LIMIT}",
        mart_query = spec.mart_query,
        metric_query = spec.metric_query,
    )
}

fn amount_expr(column: Option<&SafeIdentifier>, alias: &str, dialect: SqlDialect) -> String {
    match column {
        Some(column) => dialect.try_numeric_cast(&column.qualified(alias)),
        None => "NULL".to_string(),
    }
}

fn non_blank(name: Option<&str>) -> Option<&str> {
    name.map(str::trim).filter(|name| !name.is_empty())
}

fn require_present(
    side: Side,
    role: ColumnRole,
    column: &str,
    columns: &[String],
) -> Result<(), ReconError> {
    if columns.iter().any(|candidate| candidate == column) {
        Ok(())
    } else {
        Err(ReconError::KeyNotFound {
            side,
            role,
            column: column.to_string(),
        })
    }
}

fn require_safe(side: Side, role: ColumnRole, column: &str) -> Result<SafeIdentifier, ReconError> {
    SafeIdentifier::parse(column).ok_or_else(|| ReconError::Validation {
        side,
        role,
        column: column.to_string(),
    })
}
