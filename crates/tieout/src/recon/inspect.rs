use std::thread;

use log::debug;

use super::error::{InspectionFailure, Side};
use crate::executor::{QueryExecutor, normalize_sql};
use crate::models::INSPECTION_FALLBACK_ERROR;

/// Output column names of a query, in projection order.
pub type ColumnSet = Vec<String>;

/// Wraps a query so the warehouse resolves its projection but ships at most
/// one row back.
#[must_use]
pub fn column_probe_sql(query: &str) -> String {
    format!("WITH q AS (\n{}\n) SELECT * FROM q LIMIT 1", normalize_sql(query))
}

/// Learns a query's output column names with a one-row probe.
///
/// Executes one remote query per call; nothing is cached.
pub fn inspect_columns<E>(
    executor: &E,
    side: Side,
    query: &str,
) -> Result<ColumnSet, InspectionFailure>
where
    E: QueryExecutor + ?Sized,
{
    let result = executor.execute_query(&column_probe_sql(query));
    if !result.success {
        return Err(InspectionFailure {
            side,
            message: result.error_message_or(INSPECTION_FALLBACK_ERROR),
        });
    }

    let columns = result.column_names();
    debug!("{side} query exposes {} column(s)", columns.len());
    Ok(columns)
}

/// Probes both queries at the same time and waits for both outcomes.
///
/// Neither probe's failure cuts the other short.
pub fn inspect_both<E>(
    executor: &E,
    mart_query: &str,
    metric_query: &str,
) -> (
    Result<ColumnSet, InspectionFailure>,
    Result<ColumnSet, InspectionFailure>,
)
where
    E: QueryExecutor + ?Sized,
{
    thread::scope(|scope| {
        let metric = scope.spawn(|| inspect_columns(executor, Side::Metric, metric_query));
        let mart = inspect_columns(executor, Side::Mart, mart_query);
        let metric = metric.join().unwrap_or_else(|_| {
            Err(InspectionFailure {
                side: Side::Metric,
                message: INSPECTION_FALLBACK_ERROR.to_string(),
            })
        });
        (mart, metric)
    })
}

#[cfg(test)]
mod tests {
    use super::{column_probe_sql, inspect_both, inspect_columns};
    use crate::executor::SqliteExecutor;
    use crate::recon::Side;

    fn executor() -> SqliteExecutor {
        let executor = SqliteExecutor::open_in_memory().expect("sqlite should open");
        executor
            .execute_batch("CREATE TABLE clients (client_id INTEGER, revenue REAL);")
            .expect("fixture should load");
        executor
    }

    #[test]
    fn probe_wraps_normalized_query() {
        assert_eq!(
            column_probe_sql("SELECT 1 AS a; "),
            "WITH q AS (\nSELECT 1 AS a\n) SELECT * FROM q LIMIT 1"
        );
    }

    #[test]
    fn empty_table_still_reports_projection() {
        let columns = inspect_columns(
            &executor(),
            Side::Mart,
            "SELECT client_id, revenue AS revenue_usd FROM clients;",
        )
        .expect("inspection should succeed");
        assert_eq!(columns, vec!["client_id", "revenue_usd"]);
    }

    #[test]
    fn both_failures_are_reported() {
        let executor = executor();
        let (mart, metric) =
            inspect_both(&executor, "SELECT * FROM nope_a", "SELECT * FROM nope_b");

        let mart = mart.expect_err("mart probe should fail");
        let metric = metric.expect_err("metric probe should fail");
        assert_eq!(mart.side, Side::Mart);
        assert!(mart.message.contains("nope_a"), "unexpected: {}", mart.message);
        assert_eq!(metric.side, Side::Metric);
        assert!(metric.message.contains("nope_b"), "unexpected: {}", metric.message);
    }

    #[test]
    fn one_failure_does_not_block_the_other() {
        let executor = executor();
        let (mart, metric) =
            inspect_both(&executor, "SELECT client_id FROM clients", "SELECT * FROM nope");
        assert_eq!(mart.expect("mart probe should succeed"), vec!["client_id"]);
        assert!(metric.is_err());
    }
}
