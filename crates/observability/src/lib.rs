//! Tracing and logging setup shared by tapevault binaries and tests.

/// Initialize process-wide logging from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogConfig, LogFormat, UnknownLogFormat};
