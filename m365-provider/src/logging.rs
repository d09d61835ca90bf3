//! Logging bootstrap.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `m365_graph=debug`.
pub const LOG_ENV: &str = "M365_LOG";

/// Installs a fmt subscriber filtered by `M365_LOG` (default `info`).
///
/// Returns false when a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
