//! PPT Invariant System: records which guard invariants were actually enforced.
//!
//! Never called from inside a measurement window: recording takes a lock and
//! may grow a set.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::{Mutex, PoisonError};

pub const COUNTER_SELFTEST: u32 = 1;
pub const WARMUP_DISCARD: u32 = 2;
pub const WINDOW_SAMPLED: u32 = 3;
pub const DELTA_CHECKED: u32 = 4;
pub const OUTCOME_DELIVERED: u32 = 5;
pub const SINGLE_RESOLUTION: u32 = 6;
pub const WORKER_CAP_HONOURED: u32 = 7;
pub const CONFIG_VALID: u32 = 8;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "ppt")]
/// Assert an invariant: logs it and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = if let Some(ctx) = context {
            format!(
                "Invariant {} ({}) failed: {} (context: {})",
                id,
                invariant_name(id),
                message,
                ctx
            )
        } else {
            format!("Invariant {} ({}) failed: {}", id, invariant_name(id), message)
        };
        tracing::error!(invariant = id, "{}", full_message);
        panic!("{}", full_message);
    }
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(id);
}

#[cfg(not(feature = "ppt"))]
/// Assert an invariant: checks condition and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant {} ({}) failed: {}", id, invariant_name(id), message);
    }
}

#[cfg(feature = "ppt")]
/// Contract test: checks that specified invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let log = INVARIANT_LOG.lock().unwrap_or_else(PoisonError::into_inner);
    let missing: Vec<u32> = required_invariants
        .iter()
        .copied()
        .filter(|inv| !log.contains(inv))
        .collect();
    drop(log);
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "ppt"))]
/// Contract test: no-op when PPT feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

/// Human-readable invariant name (diagnostics only).
pub const fn invariant_name(id: u32) -> &'static str {
    match id {
        COUNTER_SELFTEST => "COUNTER_SELFTEST",
        WARMUP_DISCARD => "WARMUP_DISCARD",
        WINDOW_SAMPLED => "WINDOW_SAMPLED",
        DELTA_CHECKED => "DELTA_CHECKED",
        OUTCOME_DELIVERED => "OUTCOME_DELIVERED",
        SINGLE_RESOLUTION => "SINGLE_RESOLUTION",
        WORKER_CAP_HONOURED => "WORKER_CAP_HONOURED",
        CONFIG_VALID => "CONFIG_VALID",
        _ => "UNKNOWN",
    }
}
