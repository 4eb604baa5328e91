//! Logging setup for the command-line front end.
//!
//! Logs go to stderr so converted records on stdout stay machine readable.

use tracing_subscriber::EnvFilter;

/// Default filter directive for a `-v` count.
///
/// 0 is `info`, 1 is `debug`, anything higher is `trace`.
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, wins over the
/// verbosity.
///
/// Returns `false` if a subscriber was already installed, in which case
/// nothing changes.
pub fn configure_logging(verbosity: u8) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
