//! Tracing setup for test runs
//!
//! Initializes a fmt subscriber once per process, honoring `RUST_LOG`.
//! Call from any test that wants engine events on failure output.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the test tracing subscriber (idempotent)
pub fn init_test_tracing() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
