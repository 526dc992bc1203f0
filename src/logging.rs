//! Logging configuration using tracing
//!
//! Structured logging to stderr, filtered via the RUST_LOG environment variable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Filtering defaults to "warn" so CLI output stays quiet; raise it with e.g.
/// `RUST_LOG=taskbridge=debug` to watch individual adapter calls during a run.
///
/// # Errors
/// Returns an error if a subscriber has already been installed.
pub fn init() -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .try_init()
        .map_err(|e| {
            crate::TaskBridgeError::Other(format!("Failed to initialize tracing: {}", e))
        })?;

    Ok(())
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_helper() {
        // Safe to call repeatedly
        init_test();
        init_test();
    }
}
