use allocguard::completion::completion;
use allocguard::{
    run_guarded_async, run_guarded_async1, run_guarded_async2, AllocGuard, CountingAllocator,
    GuardConfig, GuardError,
};
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[global_allocator]
static A: CountingAllocator = CountingAllocator;

const PATIENCE: Duration = Duration::from_secs(10);

#[test]
fn one_argument_resolves_to_42() {
    let fut = run_guarded_async1(|x: i64| x + 1, 41);
    assert_eq!(pollster::block_on(fut), Ok(42));
}

#[test]
fn zero_argument_supplier_resolves() {
    let fut = run_guarded_async(|| black_box(6u32) * 7);
    assert_eq!(fut.wait(), Ok(42));
}

#[test]
fn two_arguments_resolve_in_order() {
    let mut fut = run_guarded_async2(|a: u32, b: u32| a * 10 + b, 4, 2);
    assert_eq!(fut.wait_timeout(PATIENCE), Some(Ok(42)));
}

#[test]
fn allocation_rejects_the_future() {
    let mut fut = run_guarded_async(|| black_box(vec![0u64; 3]));
    match fut.wait_timeout(PATIENCE) {
        Some(Err(GuardError::AllocationDetected { bytes, .. })) => assert!(bytes >= 24),
        other => panic!("expected allocation failure, got {other:?}"),
    }
}

#[test]
fn panic_rejects_the_future() {
    let fut = run_guarded_async(|| -> u8 { panic!("deferred boom") });
    assert_eq!(
        fut.wait(),
        Err(GuardError::WorkerPanicked {
            message: "deferred boom".into()
        })
    );
}

#[test]
fn returns_before_the_worker_finishes() {
    let release = Arc::new(AtomicBool::new(false));
    let gate = Arc::clone(&release);
    let mut fut = run_guarded_async(move || {
        while !gate.load(Ordering::Acquire) {
            std::hint::spin_loop();
        }
        7u8
    });
    assert_eq!(fut.wait_timeout(Duration::from_millis(20)), None);
    release.store(true, Ordering::Release);
    assert_eq!(fut.wait_timeout(PATIENCE), Some(Ok(7)));
}

#[test]
fn resolution_is_single_assignment() {
    let (resolver, fut) = completion::<u32>();
    assert!(resolver.try_resolve(Ok(42)));
    assert!(!resolver.try_resolve(Ok(0)));
    assert!(!resolver.try_resolve(Err(GuardError::Abandoned)));
    assert_eq!(pollster::block_on(fut), Ok(42));
}

#[test]
fn many_deferred_runs_are_independent() {
    let futs: Vec<_> = (0..16u32)
        .map(|i| run_guarded_async1(move |x: u32| x * x, i))
        .collect();
    for (i, fut) in futs.into_iter().enumerate() {
        let i = i as u32;
        assert_eq!(fut.wait(), Ok(i * i));
    }
}

#[test]
fn custom_guard_deferred() {
    let guard = AllocGuard::new(GuardConfig::new().with_warmup_reads(4)).unwrap();
    let fut = guard.run_async2(|a: u16, b: u16| a + b, 40, 2);
    assert_eq!(pollster::block_on(fut), Ok(42));
}
