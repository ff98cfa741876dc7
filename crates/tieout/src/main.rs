#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use tieout::QueryExecutor;
use tieout::cli::app::{Cli, Command, RuntimeArgs};
use tieout::cli::commands;
use tieout::config::RuntimePaths;
use tieout::logging::init_logging;
use tieout::models::EnvelopeCommandFailure;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_logging(cli.runtime.verbose);

    let command_name = cli.command.name();
    eprintln!("tieout: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            eprintln!("tieout: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("tieout: failed `{command_name}` (exit_code={exit_code})");
            match error.downcast_ref::<EnvelopeCommandFailure>() {
                Some(failure) => println!("{failure}"),
                None => eprintln!("{error:#}"),
            }
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Query(args) => {
            let (runtime_paths, executor) = open_warehouse(&cli.runtime)?;
            commands::query::run(args, &runtime_paths, executor.as_ref())
        }
        Command::Inspect(args) => {
            let (runtime_paths, executor) = open_warehouse(&cli.runtime)?;
            commands::inspect::run(args, &runtime_paths, executor.as_ref())
        }
        Command::Tie(args) => {
            let (runtime_paths, executor) = open_warehouse(&cli.runtime)?;
            commands::tie::run(args, &runtime_paths, executor.as_ref())
        }
        Command::Reports(args) => commands::reports::run(args),
        Command::Schema(args) => commands::schema::run(args),
    }
}

fn open_warehouse(args: &RuntimeArgs) -> Result<(RuntimePaths, Box<dyn QueryExecutor>)> {
    let runtime_paths = resolve_runtime_paths(args)?;
    let executor = commands::open_executor(&runtime_paths, args.dialect.into())?;
    Ok((runtime_paths, executor))
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<EnvelopeCommandFailure>() {
        Some(failure) if failure.is_validation_failure() => EXIT_VALIDATION_FAILURE,
        _ => EXIT_RUNTIME_FAILURE,
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    tieout::config::resolve_runtime_paths(
        &home_dir,
        &cwd,
        args.warehouse.as_deref(),
        args.endpoint.as_deref(),
        args.timeout_secs,
    )
}
