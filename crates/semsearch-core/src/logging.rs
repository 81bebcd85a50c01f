//! Logging initialisation.
//!
//! Library code logs through the `log` facade. Applications call
//! [`init_logging`] once at startup to route those records through a
//! `tracing-subscriber` formatter.

use tracing_subscriber::EnvFilter;

/// Initialise tracing-based logging.
///
/// Uses the `RUST_LOG` env var if set, otherwise defaults based on the
/// verbosity flags. Safe to call more than once.
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_directive(verbose, quiet))
    };

    // Ignore error if a subscriber is already set (e.g. in tests).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}
