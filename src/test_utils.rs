//! Test helpers: logging setup and logging assertions.
//!
//! Unit tests call [`init_test_logging`] first, then bracket their body with
//! [`test_phase!`](crate::test_phase) and [`test_complete!`](crate::test_complete)
//! so failing runs show where they stopped. Set `RUST_LOG` to change the
//! filter (default `pramsync=debug`).

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a test-writer `tracing` subscriber once per process.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pramsync=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Logs the start of a named test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::tracing_compat::info!(phase = $name, "test phase start");
    };
}

/// Logs the successful end of a named test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::tracing_compat::info!(test = $name, "test complete");
    };
}

/// Asserts a condition, logging the expected and actual values first.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $what:expr, $expected:expr, $actual:expr) => {{
        $crate::tracing_compat::debug!(
            what = $what,
            expected = ?$expected,
            actual = ?$actual,
            "assertion"
        );
        assert!(
            $cond,
            "{}: expected {:?}, got {:?}",
            $what,
            $expected,
            $actual
        );
    }};
}
