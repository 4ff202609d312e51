//! Errors reported by a guarded run.

use thiserror::Error;

/// Why a guarded run did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// The callable touched the heap inside the measurement window.
    #[error("allocation detected: {bytes} bytes in {allocations} allocation(s)")]
    AllocationDetected { bytes: u64, allocations: u64 },
    /// The counting allocator is not installed, so nothing can be measured.
    #[error("allocation counter unavailable: install allocguard::CountingAllocator as #[global_allocator]")]
    CounterUnavailable,
    /// The callable panicked on the worker thread.
    #[error("guarded callable panicked: {message}")]
    WorkerPanicked { message: String },
    /// The OS refused to start a worker thread.
    #[error("failed to spawn guard worker: {message}")]
    SpawnFailed { message: String },
    /// The worker went away without delivering an outcome.
    #[error("guard worker exited without resolving its result")]
    Abandoned,
    #[error("invalid guard config: {reason}")]
    InvalidConfig { reason: String },
}

impl GuardError {
    pub fn is_allocation(&self) -> bool {
        matches!(self, GuardError::AllocationDetected { .. })
    }

    /// Build `WorkerPanicked` from a `catch_unwind`/`join` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        GuardError::WorkerPanicked { message }
    }
}
