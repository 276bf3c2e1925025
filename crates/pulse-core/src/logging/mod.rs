//! Structured logging with `tracing`.
//!
//! Every crate logs through `tracing` macros with structured fields
//! (`room_id`, `sub_id`, `state`, `status`). The embedding application
//! installs a subscriber once at startup with [`init_subscriber`] or
//! [`init_json_subscriber`]; `RUST_LOG` overrides the configured level.
//!
//! [`capture_logs`] installs a thread-local capturing subscriber so tests can
//! assert that an event was logged (for example a dropped malformed frame).

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set and valid, else `level`.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install compact human-readable output on stderr.
///
/// `level` is a filter directive such as `"info"` or
/// `"pulse_realtime=debug,info"`. Only the first installed subscriber wins;
/// later calls do nothing.
pub fn init_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Install JSON-lines output on stderr, one object per event.
pub fn init_json_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .json()
        .with_current_span(false)
        .try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_subscriber("warn");
        init_subscriber("debug");
        init_json_subscriber("info");
    }
}
