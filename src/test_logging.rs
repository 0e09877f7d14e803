//! Test logging helpers.
//!
//! Installs a `tracing-subscriber` formatter that writes through the test
//! harness capture, plus phase/section markers so interleaved test output
//! stays readable.

use std::sync::Once;

#[doc(hidden)]
pub use tracing as __tracing;

static INIT: Once = Once::new();

/// Install the test subscriber once per process.
///
/// Safe to call from every test; later calls are no-ops. If another
/// subscriber is already installed it is left in place.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Marks the start of a named test.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::test_logging::__tracing::info!(phase = %$name, "==== TEST PHASE ====");
    };
}

/// Marks a section inside a test.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        $crate::test_logging::__tracing::info!(section = %$name, "---- section ----");
    };
}

/// Marks successful completion of a named test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::test_logging::__tracing::info!(test = %$name, "==== TEST COMPLETE ====");
    };
}
