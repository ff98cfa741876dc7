//! Mart vs. metric tie-out: column inspection, key inference, identifier
//! validation, SQL composition and the run orchestrator.

pub mod dialect;
pub mod error;
pub mod identifier;
pub mod inspect;
pub mod keys;
pub mod orchestrator;
pub mod sql;

pub use dialect::SqlDialect;
pub use error::{ColumnRole, InspectionFailure, ReconError, Side};
pub use identifier::{SafeIdentifier, is_safe_identifier};
pub use inspect::{ColumnSet, column_probe_sql, inspect_both, inspect_columns};
pub use keys::infer_key;
pub use orchestrator::{
    AmountSelection, KeySelection, QueryPanel, ReconciliationView, TIE_OUT_FALLBACK_ERROR,
    TieOutState,
};
pub use sql::{
    ColumnChoice, MART_CTE, METRIC_CTE, TIE_OUT_COLUMNS, TIE_OUT_ROW_LIMIT, TieOutSpec,
    build_tie_out_sql,
};
