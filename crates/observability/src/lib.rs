//! Process-wide tracing setup shared by every relay binary.

/// Initialize process-wide logging from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber construction (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, init_with};
