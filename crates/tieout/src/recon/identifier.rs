use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;

fn identifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex should compile")
    })
}

/// True for conventional unquoted SQL identifiers: a letter or underscore,
/// then letters, digits or underscores.
#[must_use]
pub fn is_safe_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

/// A column name that passed [`is_safe_identifier`].
///
/// This is the only way a column name reaches generated SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafeIdentifier(String);

impl SafeIdentifier {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        is_safe_identifier(name).then(|| Self(name.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form, immune to reserved-word collisions.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    #[must_use]
    pub fn qualified(&self, alias: &str) -> String {
        format!("{alias}.{}", self.quoted())
    }
}

impl Display for SafeIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{SafeIdentifier, is_safe_identifier};

    #[test]
    fn accepts_conventional_identifiers() {
        for name in ["organization_id", "id", "_foo", "A1", "order"] {
            assert!(is_safe_identifier(name), "{name} should be accepted");
        }
    }

    #[test]
    fn rejects_everything_else() {
        for name in [
            "123abc",
            "a-b",
            "; drop table x",
            "",
            "has space",
            "quote\"d",
            "naïve",
            "id\n",
        ] {
            assert!(!is_safe_identifier(name), "{name:?} should be rejected");
        }
    }

    #[test]
    fn safe_identifiers_render_quoted() {
        let column = SafeIdentifier::parse("select").expect("reserved words are still safe");
        assert_eq!(column.quoted(), "\"select\"");
        assert_eq!(column.qualified("m"), "m.\"select\"");
        assert!(SafeIdentifier::parse("a.b").is_none());
    }
}
