//! Contract tests: every protocol step must actually have been enforced.

use allocguard::invariant_ppt::{
    contract_test, CONFIG_VALID, COUNTER_SELFTEST, DELTA_CHECKED, OUTCOME_DELIVERED,
    SINGLE_RESOLUTION, WARMUP_DISCARD, WINDOW_SAMPLED, WORKER_CAP_HONOURED,
};
use allocguard::{run_guarded, run_guarded_async, AllocGuard, CountingAllocator, GuardConfig};

#[global_allocator]
static A: CountingAllocator = CountingAllocator;

#[test]
fn contract_blocking_protocol() {
    assert_eq!(run_guarded(|| 3u8), Ok(3));
    contract_test(
        "blocking protocol",
        &[
            CONFIG_VALID,
            COUNTER_SELFTEST,
            WARMUP_DISCARD,
            WINDOW_SAMPLED,
            DELTA_CHECKED,
            OUTCOME_DELIVERED,
        ],
    );
}

#[test]
fn contract_deferred_single_resolution() {
    assert_eq!(run_guarded_async(|| 4u8).wait(), Ok(4));
    contract_test("deferred protocol", &[SINGLE_RESOLUTION, OUTCOME_DELIVERED]);
}

#[test]
fn contract_deferred_recorded_before_waiter_wakes() {
    // The waiter checks the log the moment it wakes, with no grace period.
    for _ in 0..32 {
        assert_eq!(run_guarded_async(|| 9u8).wait(), Ok(9));
        contract_test(
            "deferred invariants visible on wake",
            &[SINGLE_RESOLUTION, OUTCOME_DELIVERED, DELTA_CHECKED],
        );
    }
}

#[test]
fn contract_worker_cap() {
    let guard = AllocGuard::new(GuardConfig::new().with_max_workers(1)).unwrap();
    assert_eq!(guard.run(|| 5u8), Ok(5));
    contract_test("worker cap", &[WORKER_CAP_HONOURED]);
}
