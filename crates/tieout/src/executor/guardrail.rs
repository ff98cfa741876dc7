use std::fmt::{Display, Formatter};

use serde::Serialize;

const MUTATING_KEYWORDS: &[&str] = &[
    "drop", "delete", "truncate", "insert", "update", "alter", "create", "grant", "revoke",
    "attach", "detach", "copy",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum GuardrailViolation {
    EmptyStatement,
    MultiStatement,
    MutatingStatement { detected_keyword: String },
    UnsupportedStatement { leading_keyword: String },
}

impl Display for GuardrailViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStatement => {
                f.write_str("SQL query is empty; provide a SELECT/CTE/EXPLAIN-SELECT statement")
            }
            Self::MultiStatement => f.write_str(
                "Multi-statement SQL is not allowed; submit exactly one read-only statement",
            ),
            Self::MutatingStatement { detected_keyword } => write!(
                f,
                "Query contains forbidden operation: {}",
                detected_keyword.to_ascii_uppercase()
            ),
            Self::UnsupportedStatement { .. } => f.write_str(
                "Only SELECT, WITH ... SELECT, and EXPLAIN ... SELECT statements are allowed",
            ),
        }
    }
}

impl std::error::Error for GuardrailViolation {}

/// Trims whitespace and any run of trailing semicolons.
#[must_use]
pub fn normalize_sql(raw_sql: &str) -> &str {
    let mut candidate = raw_sql.trim();
    while let Some(stripped) = candidate.strip_suffix(';') {
        candidate = stripped.trim_end();
    }
    candidate
}

/// Accepts exactly one read-only statement.
pub fn validate_read_only_sql(raw_sql: &str) -> Result<(), GuardrailViolation> {
    let candidate = normalize_sql(raw_sql);
    if candidate.is_empty() {
        return Err(GuardrailViolation::EmptyStatement);
    }

    let normalized = mask_quoted(candidate).to_ascii_lowercase();
    if normalized.contains(';') {
        return Err(GuardrailViolation::MultiStatement);
    }

    if let Some(keyword) = first_mutating_keyword(&normalized) {
        return Err(GuardrailViolation::MutatingStatement {
            detected_keyword: keyword,
        });
    }

    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    let allowed = collapsed.starts_with("select")
        || collapsed.starts_with("with")
        || collapsed.starts_with("explain select")
        || collapsed.starts_with("explain query plan select")
        || collapsed.starts_with('(');
    if !allowed {
        return Err(GuardrailViolation::UnsupportedStatement {
            leading_keyword: leading_keyword(&normalized),
        });
    }

    Ok(())
}

/// Blanks out string literals and quoted identifiers so only SQL syntax is
/// scanned. A doubled quote inside a literal closes and reopens it, which
/// masks the same characters.
fn mask_quoted(sql: &str) -> String {
    let mut open_quote = None;
    sql.chars()
        .map(|ch| match open_quote {
            Some(quote) => {
                if ch == quote {
                    open_quote = None;
                }
                ' '
            }
            None if ch == '\'' || ch == '"' => {
                open_quote = Some(ch);
                ' '
            }
            None => ch,
        })
        .collect()
}

fn first_mutating_keyword(normalized_sql: &str) -> Option<String> {
    tokens(normalized_sql).find_map(|token| {
        MUTATING_KEYWORDS
            .contains(&token)
            .then_some(token.to_string())
    })
}

fn leading_keyword(normalized_sql: &str) -> String {
    tokens(normalized_sql)
        .next()
        .unwrap_or("unknown")
        .to_string()
}

fn tokens(normalized_sql: &str) -> impl Iterator<Item = &str> {
    normalized_sql
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{GuardrailViolation, normalize_sql, validate_read_only_sql};

    #[test]
    fn strips_trailing_semicolons_and_whitespace() {
        assert_eq!(normalize_sql("  SELECT 1 ;; ; \n"), "SELECT 1");
        assert_eq!(normalize_sql("SELECT ';' AS s;"), "SELECT ';' AS s");
    }

    #[test]
    fn allows_select_with_and_explain_forms() {
        assert!(validate_read_only_sql("SELECT 1").is_ok());
        assert!(validate_read_only_sql("select 1 ; ").is_ok());
        assert!(validate_read_only_sql("WITH x AS (SELECT 1) SELECT * FROM x").is_ok());
        assert!(validate_read_only_sql("EXPLAIN QUERY PLAN SELECT * FROM orders").is_ok());
    }

    #[test]
    fn rejects_empty_multi_statement_and_mutating_sql() {
        assert_eq!(
            validate_read_only_sql("  ;  "),
            Err(GuardrailViolation::EmptyStatement)
        );
        assert_eq!(
            validate_read_only_sql("SELECT 1; SELECT 2"),
            Err(GuardrailViolation::MultiStatement)
        );

        let mutating =
            validate_read_only_sql("DROP TABLE orders").expect_err("DROP must be rejected");
        assert_eq!(
            mutating,
            GuardrailViolation::MutatingStatement {
                detected_keyword: "drop".to_string()
            }
        );
        assert_eq!(
            mutating.to_string(),
            "Query contains forbidden operation: DROP"
        );
    }

    #[test]
    fn allows_read_only_functions_and_identifiers_named_like_commands() {
        assert!(
            validate_read_only_sql("SELECT replace(code, '-', '') AS client_id, amt FROM mart")
                .is_ok()
        );
        assert!(validate_read_only_sql("SELECT commit, analyze, pragma FROM git_log").is_ok());
        assert!(
            validate_read_only_sql("SELECT \"drop\" AS d FROM t WHERE note = 'delete me'").is_ok()
        );
    }

    #[test]
    fn semicolons_inside_literals_are_not_statement_separators() {
        assert!(validate_read_only_sql("SELECT code FROM mart WHERE code <> 'x;y'").is_ok());
        assert!(validate_read_only_sql("SELECT 'it''s;fine' AS s;").is_ok());
        assert_eq!(
            validate_read_only_sql("SELECT 'x;y' AS s; DROP TABLE mart"),
            Err(GuardrailViolation::MultiStatement)
        );
    }

    #[test]
    fn rejects_non_select_statements() {
        let violation =
            validate_read_only_sql("VALUES (1)").expect_err("VALUES should be rejected");
        assert_eq!(
            violation,
            GuardrailViolation::UnsupportedStatement {
                leading_keyword: "values".to_string()
            }
        );
    }
}
