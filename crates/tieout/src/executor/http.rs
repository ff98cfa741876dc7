//! Remote warehouse query API client.
//!
//! Blocking reqwest client (no Tokio runtime required). Speaks the
//! `POST /api/reports/query` contract: request `{"sql": ...}`, response
//! `{success, columns, data, error, row_count}`.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::QueryExecutor;
use crate::models::{QUERY_FALLBACK_ERROR, QueryResult};
use crate::recon::SqlDialect;

pub const QUERY_ENDPOINT_PATH: &str = "/api/reports/query";

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    sql: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpExecutor {
    http: reqwest::blocking::Client,
    endpoint: String,
    dialect: SqlDialect,
}

impl HttpExecutor {
    /// `timeout` of `None` leaves timing entirely to the transport defaults.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;

        Ok(Self {
            http,
            endpoint: query_endpoint(base_url),
            dialect: SqlDialect::DuckDb,
        })
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post(&self, sql: &str) -> std::result::Result<QueryResult, String> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&QueryRequest { sql })
            .send()
            .map_err(|error| format!("Network error: {error}"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .ok()
                .and_then(|body| body.detail)
                .unwrap_or_else(|| QUERY_FALLBACK_ERROR.to_string());
            return Err(format!("HTTP {}: {detail}", status.as_u16()));
        }

        response
            .json::<QueryResult>()
            .map_err(|error| format!("Parse error: {error}"))
    }
}

impl QueryExecutor for HttpExecutor {
    fn execute_query(&self, sql: &str) -> QueryResult {
        debug!("posting query to {}", self.endpoint);
        match self.post(sql) {
            Ok(result) => result,
            Err(message) => {
                warn!("warehouse request failed: {message}");
                QueryResult::failure(message)
            }
        }
    }

    fn dialect(&self) -> SqlDialect {
        self.dialect
    }
}

fn query_endpoint(base_url: &str) -> String {
    format!("{}{QUERY_ENDPOINT_PATH}", base_url.trim().trim_end_matches('/'))
}
