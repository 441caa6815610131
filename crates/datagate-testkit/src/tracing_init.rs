//! Test log output

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once per process
///
/// Honors `RUST_LOG`; defaults to `debug` for datagate crates.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("datagate_access=debug,datagate_effects=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
