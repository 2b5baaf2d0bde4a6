use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PROTON_LOG";

/// Logs go to stderr so stdout stays a single JSON document.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "proton_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
