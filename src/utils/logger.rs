//! Logging setup
//!
//! Initializes the tracing subscriber for the CLI.

use tracing_subscriber::EnvFilter;

/// Initialize the logger.
///
/// `RUST_LOG` takes precedence when set; otherwise the crate logs at
/// info, or debug with `--verbose`.
pub fn init_logger(verbose: bool) {
    let default_filter = if verbose {
        "rfc2544_runner=debug"
    } else {
        "rfc2544_runner=info"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
