//! Subscriber setup for binaries and tests embedding bramble.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, or by
/// `default_filter` when the variable is unset or unparsable.
///
/// Returns `false` when a global subscriber was already installed.
///
/// ```rust
/// bramble::logging::init("bramble_oauth=debug,info");
/// tracing::info!("ready");
/// ```
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init("debug");
        assert!(!init("info"));
    }
}
