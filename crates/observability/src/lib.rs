//! Tracing and logging setup shared by the server and client binaries.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide tracing.
///
/// `RUST_LOG` takes precedence over `default_level`. Safe to call multiple
/// times; subsequent calls become no-ops.
pub fn init(default_level: &str, format: LogFormat) {
    self::tracing::init(default_level, format);
}
