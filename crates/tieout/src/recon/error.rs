use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;

/// Which of the two compared queries an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Mart,
    Metric,
}

impl Side {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mart => "mart",
            Self::Metric => "metric",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Mart => "Mart",
            Self::Metric => "Metric",
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Key,
    Amount,
}

impl ColumnRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Amount => "amount",
        }
    }
}

impl Display for ColumnRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionFailure {
    pub side: Side,
    pub message: String,
}

impl Display for InspectionFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} query: {}", self.side.title(), self.message)
    }
}

/// Terminal failures of one tie-out run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconError {
    #[error("{}", render_failures(.0))]
    Inspection(Vec<InspectionFailure>),

    #[error("Could not detect {side} tie key: the {side} query returned no columns. Enter the {side} key column.")]
    KeyUndetected { side: Side },

    #[error("{} {role} \"{column}\" not found in {side} query columns.", .side.title())]
    KeyNotFound {
        side: Side,
        role: ColumnRole,
        column: String,
    },

    #[error("{} {role} \"{column}\" must be a valid SQL identifier (letters, numbers, underscore).", .side.title())]
    Validation {
        side: Side,
        role: ColumnRole,
        column: String,
    },

    #[error("{0}")]
    Execution(String),
}

impl ReconError {
    /// Stable machine-readable code for envelopes and logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Inspection(_) => "inspection_failed",
            Self::KeyUndetected { .. } => "key_undetected",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::Validation { .. } => "unsafe_identifier",
            Self::Execution(_) => "execution_failed",
        }
    }
}

fn render_failures(failures: &[InspectionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::{ColumnRole, InspectionFailure, ReconError, Side};

    #[test]
    fn messages_name_column_and_side() {
        let err = ReconError::KeyNotFound {
            side: Side::Mart,
            role: ColumnRole::Amount,
            column: "revenue_usd".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Mart amount \"revenue_usd\" not found in mart query columns."
        );
        assert_eq!(err.code(), "key_not_found");

        let err = ReconError::Validation {
            side: Side::Metric,
            role: ColumnRole::Key,
            column: "a-b".to_string(),
        };
        assert!(err.to_string().starts_with("Metric key \"a-b\" must be a valid SQL identifier"));
    }

    #[test]
    fn inspection_error_lists_every_failure() {
        let err = ReconError::Inspection(vec![
            InspectionFailure {
                side: Side::Mart,
                message: "no such table: a".to_string(),
            },
            InspectionFailure {
                side: Side::Metric,
                message: "no such table: b".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Mart query: no such table: a; Metric query: no such table: b"
        );
    }
}
