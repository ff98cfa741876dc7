pub mod guardrail;
pub mod http;
pub mod sqlite;

pub use crate::recon::SqlDialect;
pub use guardrail::{GuardrailViolation, normalize_sql, validate_read_only_sql};
pub use http::HttpExecutor;
pub use sqlite::SqliteExecutor;

use crate::models::QueryResult;

/// The warehouse query capability everything else is built on.
///
/// Implementations never fail out-of-band: transport and engine errors come
/// back as `success = false` results carrying a readable message.
pub trait QueryExecutor: Sync {
    fn execute_query(&self, sql: &str) -> QueryResult;

    /// SQL flavour the generated statements must be rendered in.
    fn dialect(&self) -> SqlDialect;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn execute_query(&self, sql: &str) -> QueryResult {
        (**self).execute_query(sql)
    }

    fn dialect(&self) -> SqlDialect {
        (**self).dialect()
    }
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    fn execute_query(&self, sql: &str) -> QueryResult {
        (**self).execute_query(sql)
    }

    fn dialect(&self) -> SqlDialect {
        (**self).dialect()
    }
}
