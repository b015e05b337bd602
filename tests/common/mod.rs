#![allow(dead_code)]
//! Shared integration test utilities.

use carryover::{ContextKey, ContextRegistry, ContextValue, SlotAccessor};
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// A fresh registry with one slot per name.
///
/// Names should be unique per test: slots are per thread, but the test
/// harness may reuse threads.
pub fn registry_with(names: &[&str]) -> (Arc<ContextRegistry>, Vec<SlotAccessor>) {
    let registry = ContextRegistry::new();
    let slots = names.iter().map(|name| registry.register_slot(*name)).collect();
    (registry, slots)
}

/// Shorthand for a string value.
pub fn text(s: &str) -> ContextValue {
    ContextValue::new(s.to_string())
}

/// Read a slot as a string.
pub fn read(slot: &SlotAccessor) -> Option<String> {
    slot.get::<String>()
}

/// Build a key.
pub fn key(name: &str) -> ContextKey {
    ContextKey::new(name)
}
