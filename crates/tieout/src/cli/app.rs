use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use super::commands::{
    inspect::InspectArgs, query::QueryArgs, reports::ReportsArgs, schema::SchemaArgs,
    tie::TieArgs,
};
use crate::config::ENDPOINT_ENV_VAR;
use crate::recon::SqlDialect;

#[derive(Debug, Parser)]
#[command(name = "tieout", version, about = "Mart vs. metric tie-out for the warehouse")]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// Local SQLite warehouse file.
    #[arg(long, global = true, value_name = "PATH")]
    pub warehouse: Option<PathBuf>,

    /// Base URL of a remote query API; takes precedence over `--warehouse`.
    #[arg(long, global = true, value_name = "URL", env = ENDPOINT_ENV_VAR)]
    pub endpoint: Option<String>,

    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// SQL flavour of a remote warehouse. Local SQLite always uses `sqlite`.
    #[arg(long, global = true, value_enum, default_value_t = DialectArg::Duckdb)]
    pub dialect: DialectArg,

    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Duckdb,
    Sqlite,
}

impl From<DialectArg> for SqlDialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Duckdb => Self::DuckDb,
            DialectArg::Sqlite => Self::Sqlite,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one read-only query.
    Query(QueryArgs),
    /// List a query's output columns and the key that would be inferred.
    Inspect(InspectArgs),
    /// Reconcile a mart query against a metric query.
    Tie(TieArgs),
    /// List the report catalog.
    Reports(ReportsArgs),
    /// Print JSON Schemas of the emitted documents.
    Schema(SchemaArgs),
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::Inspect(_) => "inspect",
            Self::Tie(_) => "tie",
            Self::Reports(_) => "reports",
            Self::Schema(_) => "schema",
        }
    }
}
