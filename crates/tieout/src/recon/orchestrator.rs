use std::fmt::{Display, Formatter};

use log::{debug, info, warn};
use serde::Serialize;

use super::error::{ReconError, Side};
use super::inspect::{ColumnSet, inspect_both};
use super::keys::infer_key;
use super::sql::{ColumnChoice, TieOutSpec, build_tie_out_sql};
use crate::executor::{QueryExecutor, normalize_sql};
use crate::models::{QUERY_FALLBACK_ERROR, QueryResult, TieRow, TieRowError};

pub const TIE_OUT_FALLBACK_ERROR: &str = "Failed to execute tie-out query";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieOutState {
    #[default]
    Idle,
    Inspecting,
    Validating,
    Building,
    Executing,
    Succeeded,
    Failed,
}

impl TieOutState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Inspecting => "inspecting",
            Self::Validating => "validating",
            Self::Building => "building",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// A fresh run may start from anywhere; otherwise the pipeline only moves
    /// forward, and any in-flight stage may fail.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (_, Self::Inspecting) => true,
            (Self::Inspecting, Self::Validating)
            | (Self::Validating, Self::Building)
            | (Self::Building, Self::Executing)
            | (Self::Executing, Self::Succeeded) => true,
            (from, Self::Failed) => from.is_in_flight(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Inspecting | Self::Validating | Self::Building | Self::Executing
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl Display for TieOutState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join key per side. `None` (or blank) means "infer on the next run".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeySelection {
    pub mart_key: Option<String>,
    pub metric_key: Option<String>,
}

/// Amount column per side. A missing side compares as NULL, not zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AmountSelection {
    pub mart_amount: Option<String>,
    pub metric_amount: Option<String>,
}

/// Result slot of a panel that runs a single query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPanel {
    pub result: Option<QueryResult>,
    pub error: Option<String>,
}

/// State of one mart-vs-metric report view.
///
/// The mart side query and the tie-out run keep separate results and errors;
/// one failing leaves the other untouched.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationView {
    mart_sql: String,
    metric_sql: String,
    pub keys: KeySelection,
    pub amounts: AmountSelection,
    mart_columns: ColumnSet,
    metric_columns: ColumnSet,
    mart_panel: QueryPanel,
    state: TieOutState,
    transitions: Vec<TieOutState>,
    tie_result: Option<QueryResult>,
    tie_error: Option<ReconError>,
    last_sql: Option<String>,
}

impl ReconciliationView {
    #[must_use]
    pub fn new(mart_sql: impl Into<String>, metric_sql: impl Into<String>) -> Self {
        Self {
            mart_sql: mart_sql.into(),
            metric_sql: metric_sql.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeySelection) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub fn with_amounts(mut self, amounts: AmountSelection) -> Self {
        self.amounts = amounts;
        self
    }

    #[must_use]
    pub fn mart_sql(&self) -> &str {
        &self.mart_sql
    }

    #[must_use]
    pub fn metric_sql(&self) -> &str {
        &self.metric_sql
    }

    pub fn set_mart_sql(&mut self, sql: impl Into<String>) {
        self.mart_sql = sql.into();
    }

    pub fn set_metric_sql(&mut self, sql: impl Into<String>) {
        self.metric_sql = sql.into();
    }

    pub fn clear_keys(&mut self) {
        self.keys = KeySelection::default();
    }

    #[must_use]
    pub fn state(&self) -> TieOutState {
        self.state
    }

    /// States entered by the most recent tie-out run, in order.
    #[must_use]
    pub fn transitions(&self) -> &[TieOutState] {
        &self.transitions
    }

    #[must_use]
    pub fn mart_columns(&self) -> &[String] {
        &self.mart_columns
    }

    #[must_use]
    pub fn metric_columns(&self) -> &[String] {
        &self.metric_columns
    }

    #[must_use]
    pub fn mart_panel(&self) -> &QueryPanel {
        &self.mart_panel
    }

    #[must_use]
    pub fn tie_result(&self) -> Option<&QueryResult> {
        self.tie_result.as_ref()
    }

    #[must_use]
    pub fn tie_error(&self) -> Option<&ReconError> {
        self.tie_error.as_ref()
    }

    /// SQL of the last reconciliation statement that reached execution.
    #[must_use]
    pub fn last_sql(&self) -> Option<&str> {
        self.last_sql.as_deref()
    }

    pub fn tie_rows(&self) -> Result<Vec<TieRow>, TieRowError> {
        self.tie_result
            .as_ref()
            .map(|result| result.rows().iter().map(TieRow::from_row).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Runs the mart query on its own for the mart panel.
    pub fn run_mart_query<E>(&mut self, executor: &E) -> Result<&QueryResult, ReconError>
    where
        E: QueryExecutor + ?Sized,
    {
        self.mart_panel.error = None;
        let result = executor.execute_query(normalize_sql(&self.mart_sql));
        if !result.success {
            let message = result.error_message_or(QUERY_FALLBACK_ERROR);
            warn!("mart query failed: {message}");
            self.mart_panel.result = None;
            self.mart_panel.error = Some(message.clone());
            return Err(ReconError::Execution(message));
        }

        info!("mart query returned {} row(s)", result.row_count);
        Ok(self.mart_panel.result.insert(result))
    }

    /// Inspects, validates, builds and executes one reconciliation.
    ///
    /// Every failure is terminal for the run and clears the previous result.
    pub fn run_tie_out<E>(&mut self, executor: &E) -> Result<&QueryResult, ReconError>
    where
        E: QueryExecutor + ?Sized,
    {
        self.transitions.clear();
        self.tie_error = None;
        self.transition(TieOutState::Inspecting);

        match self.tie_out_pipeline(executor) {
            Ok(result) => {
                info!(
                    "tie-out returned {} row(s) (truncated={})",
                    result.row_count, result.truncated
                );
                self.transition(TieOutState::Succeeded);
                Ok(self.tie_result.insert(result))
            }
            Err(error) => {
                warn!("tie-out failed ({}): {error}", error.code());
                self.tie_result = None;
                self.tie_error = Some(error.clone());
                self.transition(TieOutState::Failed);
                Err(error)
            }
        }
    }

    /// Mart side query followed by the tie-out; both always run.
    pub fn run_all<E>(&mut self, executor: &E) -> (Result<(), ReconError>, Result<(), ReconError>)
    where
        E: QueryExecutor + ?Sized,
    {
        let mart = self.run_mart_query(executor).map(|_| ());
        let tie = self.run_tie_out(executor).map(|_| ());
        (mart, tie)
    }

    /// Inspects, validates and renders the reconciliation SQL without
    /// executing it.
    ///
    /// Refreshes the inspected columns and writes inferred keys back, as a
    /// run would. The state, tie result and last SQL are left as they were.
    pub fn preview_sql<E>(&mut self, executor: &E) -> Result<String, ReconError>
    where
        E: QueryExecutor + ?Sized,
    {
        self.inspect(executor)?;
        let spec = self.resolve_spec()?;
        Ok(build_tie_out_sql(&spec, executor.dialect()))
    }

    fn tie_out_pipeline<E>(&mut self, executor: &E) -> Result<QueryResult, ReconError>
    where
        E: QueryExecutor + ?Sized,
    {
        self.inspect(executor)?;

        self.transition(TieOutState::Validating);
        let spec = self.resolve_spec()?;

        self.transition(TieOutState::Building);
        let sql = build_tie_out_sql(&spec, executor.dialect());
        debug!("tie-out sql ({}):\n{sql}", executor.dialect());

        self.transition(TieOutState::Executing);
        let result = executor.execute_query(&sql);
        self.last_sql = Some(sql);
        if !result.success {
            return Err(ReconError::Execution(
                result.error_message_or(TIE_OUT_FALLBACK_ERROR),
            ));
        }
        Ok(result)
    }

    fn inspect<E>(&mut self, executor: &E) -> Result<(), ReconError>
    where
        E: QueryExecutor + ?Sized,
    {
        let (mart, metric) = inspect_both(executor, &self.mart_sql, &self.metric_sql);
        let (mart_columns, metric_columns) = match (mart, metric) {
            (Ok(mart), Ok(metric)) => (mart, metric),
            (mart, metric) => {
                let failures = [mart.err(), metric.err()].into_iter().flatten().collect();
                return Err(ReconError::Inspection(failures));
            }
        };
        self.mart_columns = mart_columns;
        self.metric_columns = metric_columns;
        Ok(())
    }

    /// Fills blank keys by inference, validates every chosen column and
    /// writes inferred keys back into the selection.
    fn resolve_spec(&mut self) -> Result<TieOutSpec, ReconError> {
        let mart_key_input = non_blank(self.keys.mart_key.as_deref());
        let metric_key_input = non_blank(self.keys.metric_key.as_deref());
        let mart_key = match mart_key_input {
            Some(key) => key,
            None => infer_key(&self.mart_columns)
                .ok_or(ReconError::KeyUndetected { side: Side::Mart })?,
        };
        let metric_key = match metric_key_input {
            Some(key) => key,
            None => infer_key(&self.metric_columns)
                .ok_or(ReconError::KeyUndetected { side: Side::Metric })?,
        };
        debug!("tie keys: mart={mart_key} metric={metric_key}");

        let spec = TieOutSpec::resolve(
            &self.mart_sql,
            &self.metric_sql,
            &self.mart_columns,
            &self.metric_columns,
            ColumnChoice {
                mart_key,
                metric_key,
                mart_amount: self.amounts.mart_amount.as_deref(),
                metric_amount: self.amounts.metric_amount.as_deref(),
            },
        )?;

        if mart_key_input.is_none() {
            self.keys.mart_key = Some(spec.mart_key.to_string());
        }
        if metric_key_input.is_none() {
            self.keys.metric_key = Some(spec.metric_key.to_string());
        }
        Ok(spec)
    }

    fn transition(&mut self, next: TieOutState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal tie-out transition {} -> {next}",
            self.state
        );
        debug!("tie-out state {} -> {next}", self.state);
        self.state = next;
        self.transitions.push(next);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::TieOutState;

    #[test]
    fn fresh_runs_may_start_from_any_state() {
        for state in [
            TieOutState::Idle,
            TieOutState::Validating,
            TieOutState::Succeeded,
            TieOutState::Failed,
        ] {
            assert!(state.can_transition_to(TieOutState::Inspecting));
        }
    }

    #[test]
    fn pipeline_only_moves_forward() {
        assert!(TieOutState::Inspecting.can_transition_to(TieOutState::Validating));
        assert!(TieOutState::Executing.can_transition_to(TieOutState::Succeeded));
        assert!(!TieOutState::Idle.can_transition_to(TieOutState::Executing));
        assert!(!TieOutState::Building.can_transition_to(TieOutState::Validating));
        assert!(!TieOutState::Validating.can_transition_to(TieOutState::Succeeded));
    }

    #[test]
    fn only_in_flight_states_can_fail() {
        assert!(TieOutState::Executing.can_transition_to(TieOutState::Failed));
        assert!(TieOutState::Inspecting.can_transition_to(TieOutState::Failed));
        assert!(!TieOutState::Idle.can_transition_to(TieOutState::Failed));
        assert!(!TieOutState::Succeeded.can_transition_to(TieOutState::Failed));
        assert!(TieOutState::Failed.is_terminal());
    }
}
