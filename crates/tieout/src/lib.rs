#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod executor;
pub mod logging;
pub mod models;
pub mod recon;
pub mod reports;

pub use cli::app::{Cli, Command};
pub use executor::{QueryExecutor, SqlDialect};
pub use recon::{ReconError, ReconciliationView, TieOutState};
