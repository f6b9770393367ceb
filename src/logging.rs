//! Optional `tracing` subscriber wiring for tests and embedders.
//!
//! `trackstore` itself never installs a global subscriber — libraries
//! shouldn't decide that for their caller. [`init_tracing`] is a convenience
//! helper, gated behind the `dev-logging` feature, for integration tests and
//! example binaries that want readable `RUST_LOG`-driven output without
//! reaching for `tracing-subscriber` directly.

#[cfg(feature = "dev-logging")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}
