//! Tracing setup for applications embedding the stores.

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_line_number(true)
        .with_target(false)
        .with_file(true)
        .try_init()
        .is_ok()
}

/// Like [`init`], but writes through the test harness so output is captured.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .with_line_number(true)
        .with_target(false)
        .with_file(true)
        .try_init();
}
