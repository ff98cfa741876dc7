pub mod envelope;
pub mod query_result;
pub mod tie_row;

pub use envelope::{
    ENVELOPE_SCHEMA_VERSION, Envelope, EnvelopeCommandFailure, EnvelopeError, EnvelopeMeta,
    EnvelopeWarning,
};
pub use query_result::{
    INSPECTION_FALLBACK_ERROR, QUERY_FALLBACK_ERROR, QueryResult, Row, ScalarValue,
};
pub use tie_row::{TieOutSummary, TieRow, TieRowError, TieStatus};

use serde_json::Value;

/// JSON Schemas for the documents this crate emits.
#[must_use]
pub fn json_schemas() -> Value {
    let tie_row = schemars::schema_for!(TieRow);
    let query_result = schemars::schema_for!(QueryResult);
    serde_json::json!({
        "tie_row": tie_row,
        "query_result": query_result,
    })
}
