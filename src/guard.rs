//! Allocation-guarded invoker.
//!
//! Every run spawns one fresh worker thread, which:
//! 1. discards `warmup_reads` counter samples,
//! 2. samples the counter,
//! 3. calls the callable,
//! 4. samples again,
//! 5. fails with [`GuardError::AllocationDetected`] if any bytes were allocated,
//! 6. hands the outcome back and exits.
//!
//! Blocking runs join the worker and return its `Result`. Deferred runs return
//! a [`Guarded`] future that only the worker resolves. The 1- and 2-argument
//! forms bind their arguments into a closure and share the 0-argument path.

use crate::completion::{completion, Guarded, Outcome};
use crate::config::GuardConfig;
use crate::counter;
use crate::error::GuardError;
use crate::invariant_ppt::{
    assert_invariant, CONFIG_VALID, COUNTER_SELFTEST, DELTA_CHECKED, OUTCOME_DELIVERED,
    SINGLE_RESOLUTION, WARMUP_DISCARD, WINDOW_SAMPLED, WORKER_CAP_HONOURED,
};
use crate::permits::{Permit, WorkerPermits};
use crate::window;
use lazy_static::lazy_static;
use std::sync::Arc;
use std::thread;

/// Runs callables on isolated worker threads and rejects any that allocate.
#[derive(Debug)]
pub struct AllocGuard {
    config: GuardConfig,
    permits: Option<WorkerPermits>,
}

impl AllocGuard {
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: GuardConfig) -> Self {
        assert_invariant(CONFIG_VALID, config.validate().is_ok(), "guard config validated", None);
        let permits = config.max_workers.map(WorkerPermits::new);
        Self { config, permits }
    }

    /// Blocking run of a 0-argument callable.
    ///
    /// The callable may borrow from the caller: the worker is joined before
    /// this returns.
    pub fn run<T, F>(&self, f: F) -> Result<T, GuardError>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.preflight()?;
        let warmup_reads = self.config.warmup_reads;
        let permits = self.permits.as_ref();
        let outcome = thread::scope(|scope| -> Outcome<T> {
            let handle = self
                .builder()
                .spawn_scoped(scope, move || {
                    let permit = acquire(permits);
                    let outcome = execute(warmup_reads, f);
                    drop(permit);
                    outcome
                })
                .map_err(|e| GuardError::SpawnFailed {
                    message: e.to_string(),
                })?;
            handle
                .join()
                .unwrap_or_else(|payload| Err(GuardError::from_panic(payload)))
        });
        assert_invariant(OUTCOME_DELIVERED, true, "blocking outcome joined", None);
        outcome
    }

    /// Blocking run of a 1-argument callable.
    pub fn run1<A, T, F>(&self, f: F, a: A) -> Result<T, GuardError>
    where
        F: FnOnce(A) -> T + Send,
        A: Send,
        T: Send,
    {
        self.run(move || f(a))
    }

    /// Blocking run of a 2-argument callable.
    pub fn run2<A, B, T, F>(&self, f: F, a: A, b: B) -> Result<T, GuardError>
    where
        F: FnOnce(A, B) -> T + Send,
        A: Send,
        B: Send,
        T: Send,
    {
        self.run(move || f(a, b))
    }

    /// Deferred run of a 0-argument callable.
    ///
    /// Returns immediately, even when the worker cap is saturated: the worker
    /// waits for its permit, not the caller. Setup failures resolve the future
    /// before this returns.
    pub fn run_async<T, F>(&self, f: F) -> Guarded<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (resolver, guarded) = completion();
        if let Err(e) = self.preflight() {
            resolver.try_resolve(Err(e));
            return guarded;
        }
        let warmup_reads = self.config.warmup_reads;
        let permits = self.permits.clone();
        let resolver = Arc::new(resolver);
        let worker_resolver = Arc::clone(&resolver);
        let spawned = self.builder().spawn(move || {
            let permit = acquire(permits.as_ref());
            let outcome = execute(warmup_reads, f);
            drop(permit);
            // Recorded before resolving: a waiter may inspect the log as soon as it wakes.
            assert_invariant(
                SINGLE_RESOLUTION,
                !worker_resolver.is_resolved(),
                "worker resolves its future once",
                None,
            );
            assert_invariant(OUTCOME_DELIVERED, true, "deferred outcome resolved", None);
            worker_resolver.try_resolve(outcome);
        });
        if let Err(e) = spawned {
            resolver.try_resolve(Err(GuardError::SpawnFailed {
                message: e.to_string(),
            }));
        }
        guarded
    }

    /// Deferred run of a 1-argument callable.
    pub fn run_async1<A, T, F>(&self, f: F, a: A) -> Guarded<T>
    where
        F: FnOnce(A) -> T + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
    {
        self.run_async(move || f(a))
    }

    /// Deferred run of a 2-argument callable.
    pub fn run_async2<A, B, T, F>(&self, f: F, a: A, b: B) -> Guarded<T>
    where
        F: FnOnce(A, B) -> T + Send + 'static,
        A: Send + 'static,
        B: Send + 'static,
        T: Send + 'static,
    {
        self.run_async(move || f(a, b))
    }

    /// Blocking run that panics on the caller's thread if `f` fails.
    #[track_caller]
    pub fn assert_no_alloc<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        match self.run(f) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }

    fn preflight(&self) -> Result<(), GuardError> {
        if !self.config.verify_counter {
            return Ok(());
        }
        if !counter::is_live() {
            return Err(GuardError::CounterUnavailable);
        }
        assert_invariant(COUNTER_SELFTEST, true, "allocation counter is live", None);
        Ok(())
    }

    fn builder(&self) -> thread::Builder {
        let builder = thread::Builder::new().name(self.config.thread_name.clone());
        match self.config.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }
}

impl Default for AllocGuard {
    fn default() -> Self {
        Self::from_valid(GuardConfig::new())
    }
}

/// Block the worker until it holds a permit. Runs before the window opens.
fn acquire(permits: Option<&WorkerPermits>) -> Option<Permit> {
    let permits = permits?;
    let permit = permits.acquire();
    assert_invariant(
        WORKER_CAP_HONOURED,
        permits.available() < permits.capacity(),
        "worker holds a permit",
        None,
    );
    Some(permit)
}

/// Worker-side protocol. Everything outside `window::measure_unwind` runs
/// after the end sample.
fn execute<T>(warmup_reads: u32, f: impl FnOnce() -> T) -> Outcome<T> {
    let (value, window) = window::measure_unwind(warmup_reads, f);
    if warmup_reads > 0 {
        assert_invariant(WARMUP_DISCARD, true, "warmup sample discarded", None);
    }
    assert_invariant(
        WINDOW_SAMPLED,
        window.end.bytes >= window.start.bytes,
        "allocation counter is monotonic",
        None,
    );
    let delta = window.delta();
    let outcome = match value {
        Err(payload) => Err(GuardError::from_panic(payload)),
        Ok(_) if window.allocated() => Err(GuardError::AllocationDetected {
            bytes: delta.bytes,
            allocations: delta.allocations,
        }),
        Ok(value) => Ok(value),
    };
    assert_invariant(DELTA_CHECKED, true, "window delta checked", None);
    match &outcome {
        Ok(_) => tracing::debug!("guarded run allocation-free"),
        Err(GuardError::AllocationDetected { bytes, allocations }) => {
            tracing::warn!(bytes, allocations, "allocation detected in guarded run")
        }
        Err(e) => tracing::warn!(error = %e, "guarded run failed"),
    }
    outcome
}

lazy_static! {
    static ref DEFAULT_GUARD: AllocGuard = {
        let config = GuardConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring ALLOCGUARD_* environment, using defaults");
            GuardConfig::new()
        });
        AllocGuard::from_valid(config)
    };
}

/// Process-wide guard configured from `ALLOCGUARD_*` environment variables.
pub fn global() -> &'static AllocGuard {
    &DEFAULT_GUARD
}

/// Blocking run of `f` on the global guard.
pub fn run_guarded<T, F>(f: F) -> Result<T, GuardError>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    global().run(f)
}

pub fn run_guarded1<A, T, F>(f: F, a: A) -> Result<T, GuardError>
where
    F: FnOnce(A) -> T + Send,
    A: Send,
    T: Send,
{
    global().run1(f, a)
}

pub fn run_guarded2<A, B, T, F>(f: F, a: A, b: B) -> Result<T, GuardError>
where
    F: FnOnce(A, B) -> T + Send,
    A: Send,
    B: Send,
    T: Send,
{
    global().run2(f, a, b)
}

/// Deferred run of `f` on the global guard.
pub fn run_guarded_async<T, F>(f: F) -> Guarded<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    global().run_async(f)
}

pub fn run_guarded_async1<A, T, F>(f: F, a: A) -> Guarded<T>
where
    F: FnOnce(A) -> T + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    global().run_async1(f, a)
}

pub fn run_guarded_async2<A, B, T, F>(f: F, a: A, b: B) -> Guarded<T>
where
    F: FnOnce(A, B) -> T + Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
    T: Send + 'static,
{
    global().run_async2(f, a, b)
}

/// Panic unless `f` runs allocation-free on the global guard.
#[track_caller]
pub fn assert_no_alloc<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    global().assert_no_alloc(f)
}
