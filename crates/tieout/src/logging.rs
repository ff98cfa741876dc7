use std::env;
use std::sync::OnceLock;

use log::LevelFilter;

static LOGGER: OnceLock<()> = OnceLock::new();

/// Installs the `env_logger` backend once per process.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `info` and
/// everything else stays at the `env_logger` default.
pub fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("tieout", level);
        }
        let _ = builder
            .format_timestamp_millis()
            .target(env_logger::Target::Stderr)
            .try_init();
    });
}
