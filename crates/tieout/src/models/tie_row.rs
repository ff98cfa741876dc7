use std::fmt::{Display, Formatter};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::query_result::{Row, ScalarValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TieStatus {
    Matched,
    MartOnly,
    MetricOnly,
}

impl TieStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::MartOnly => "mart_only",
            Self::MetricOnly => "metric_only",
        }
    }

    #[must_use]
    pub fn is_unmatched(self) -> bool {
        !matches!(self, Self::Matched)
    }
}

impl Display for TieStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TieStatus {
    type Err = TieRowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "matched" => Ok(Self::Matched),
            "mart_only" => Ok(Self::MartOnly),
            "metric_only" => Ok(Self::MetricOnly),
            other => Err(TieRowError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TieRowError {
    #[error("tie-out row is missing column `{0}`")]
    MissingColumn(&'static str),
    #[error("unknown tie_status `{0}`")]
    UnknownStatus(String),
    #[error("column `{column}` is not numeric: {value}")]
    NotNumeric { column: &'static str, value: String },
}

/// One decoded row of a reconciliation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TieRow {
    pub tie_key: Option<String>,
    pub mart_key_value: ScalarValue,
    pub metric_key_value: ScalarValue,
    pub tie_status: TieStatus,
    pub mart_amount: Option<f64>,
    pub metric_amount: Option<f64>,
    pub amount_delta: f64,
}

impl TieRow {
    pub fn from_row(row: &Row) -> Result<Self, TieRowError> {
        let status_cell = cell(row, "tie_status")?;
        let tie_status = match status_cell {
            ScalarValue::Text(text) => text.parse()?,
            other => return Err(TieRowError::UnknownStatus(other.to_string())),
        };

        Ok(Self {
            tie_key: cell(row, "tie_key")?.as_text().map(|text| text.into_owned()),
            mart_key_value: cell(row, "mart_key_value")?.clone(),
            metric_key_value: cell(row, "metric_key_value")?.clone(),
            tie_status,
            mart_amount: optional_number(row, "mart_amount")?,
            metric_amount: optional_number(row, "metric_amount")?,
            amount_delta: optional_number(row, "amount_delta")?.unwrap_or(0.0),
        })
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TieOutSummary {
    pub total_rows: usize,
    pub matched: usize,
    pub mart_only: usize,
    pub metric_only: usize,
    /// Matched rows whose amounts disagree.
    pub mismatched: usize,
    pub total_abs_delta: f64,
}

impl TieOutSummary {
    #[must_use]
    pub fn from_rows(rows: &[TieRow]) -> Self {
        let mut summary = Self {
            total_rows: rows.len(),
            ..Self::default()
        };
        for row in rows {
            match row.tie_status {
                TieStatus::Matched => {
                    summary.matched += 1;
                    if row.amount_delta != 0.0 {
                        summary.mismatched += 1;
                    }
                }
                TieStatus::MartOnly => summary.mart_only += 1,
                TieStatus::MetricOnly => summary.metric_only += 1,
            }
            summary.total_abs_delta += row.amount_delta.abs();
        }
        summary
    }

    #[must_use]
    pub fn is_tied(&self) -> bool {
        self.mart_only == 0 && self.metric_only == 0 && self.mismatched == 0
    }
}

fn cell<'a>(row: &'a Row, column: &'static str) -> Result<&'a ScalarValue, TieRowError> {
    row.get(column).ok_or(TieRowError::MissingColumn(column))
}

fn optional_number(row: &Row, column: &'static str) -> Result<Option<f64>, TieRowError> {
    let value = cell(row, column)?;
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_f64()
        .map(Some)
        .ok_or_else(|| TieRowError::NotNumeric {
            column,
            value: value.to_string(),
        })
}
