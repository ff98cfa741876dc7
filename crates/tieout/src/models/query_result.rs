use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

pub const INSPECTION_FALLBACK_ERROR: &str = "Failed to inspect query columns";
pub const QUERY_FALLBACK_ERROR: &str = "Failed to execute query";

/// One cell of an ad-hoc result set.
///
/// Result shapes are only known after the warehouse answers, so rows are
/// column-name maps over this variant rather than fixed records.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    #[default]
    Null,
    Number(Number),
    Text(String),
}

impl ScalarValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::Number(Number::from(value))
    }

    /// Non-finite floats have no JSON representation and collapse to `Null`.
    #[must_use]
    pub fn real(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Number(number) => number.as_f64(),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Number(number) => Some(Cow::Owned(number.to_string())),
            Self::Text(text) => Some(Cow::Borrowed(text)),
        }
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<Value> for ScalarValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::integer(i64::from(flag)),
            Value::Number(number) => Self::Number(number),
            Value::String(text) => Self::Text(text),
            nested @ (Value::Array(_) | Value::Object(_)) => Self::Text(nested.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for ScalarValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from)
    }
}

impl JsonSchema for ScalarValue {
    fn schema_name() -> Cow<'static, str> {
        "ScalarValue".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": ["null", "number", "string"]
        })
    }
}

pub type Row = BTreeMap<String, ScalarValue>;

/// Response shape of the warehouse query collaborator.
///
/// `success = false` means `error` carries the message and `columns`/`data`
/// are ignored. `columns`, when present, wins over keys of the first row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub row_count: usize,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl QueryResult {
    #[must_use]
    pub fn ok(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            success: true,
            columns: Some(columns),
            row_count: rows.len(),
            data: Some(rows),
            error: None,
            truncated: false,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            columns: None,
            data: None,
            error: Some(message.into()),
            row_count: 0,
            truncated: false,
        }
    }

    #[must_use]
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        if let Some(columns) = &self.columns {
            return columns.clone();
        }
        self.rows()
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or_default()
    }

    /// The collaborator's message verbatim, or `fallback` when it sent none.
    #[must_use]
    pub fn error_message_or(&self, fallback: &str) -> String {
        match self.error.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => fallback.to_string(),
        }
    }
}
