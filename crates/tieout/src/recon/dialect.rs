use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::executor::sqlite::TRY_CAST_DOUBLE_FUNCTION;

/// SQL flavour of the warehouse the generated statement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    #[default]
    DuckDb,
    Sqlite,
}

impl SqlDialect {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DuckDb => "duckdb",
            Self::Sqlite => "sqlite",
        }
    }

    #[must_use]
    pub fn text_cast(self, expr: &str) -> String {
        match self {
            Self::DuckDb => format!("CAST({expr} AS VARCHAR)"),
            Self::Sqlite => format!("CAST({expr} AS TEXT)"),
        }
    }

    /// Numeric cast that yields NULL instead of raising on bad input.
    #[must_use]
    pub fn try_numeric_cast(self, expr: &str) -> String {
        match self {
            Self::DuckDb => format!("TRY_CAST({expr} AS DOUBLE)"),
            Self::Sqlite => format!("{TRY_CAST_DOUBLE_FUNCTION}({expr})"),
        }
    }
}

impl Display for SqlDialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::SqlDialect;

    #[test]
    fn duckdb_casts() {
        assert_snapshot!(SqlDialect::DuckDb.text_cast(r#"m."id""#), @r#"CAST(m."id" AS VARCHAR)"#);
        assert_snapshot!(SqlDialect::DuckDb.try_numeric_cast(r#"g."amt""#), @r#"TRY_CAST(g."amt" AS DOUBLE)"#);
    }

    #[test]
    fn sqlite_casts() {
        assert_snapshot!(SqlDialect::Sqlite.text_cast(r#"m."id""#), @r#"CAST(m."id" AS TEXT)"#);
        assert_snapshot!(SqlDialect::Sqlite.try_numeric_cast(r#"g."amt""#), @r#"try_cast_double(g."amt")"#);
    }
}
