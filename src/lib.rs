//! Zero-allocation assertion harness.
//!
//! Runs a callable on a fresh worker thread, samples that thread's
//! allocation counter before and after the call, and fails the run if any
//! bytes were allocated in between.
//!
//! The test binary must install the counting allocator:
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: allocguard::CountingAllocator = allocguard::CountingAllocator;
//!
//! #[test]
//! fn hot_path_is_allocation_free() {
//!     assert_eq!(allocguard::run_guarded(|| 1 + 1), Ok(2));
//! }
//! ```

pub mod completion;
pub mod config;
pub mod counter;
pub mod error;
pub mod guard;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod permits;
pub mod window;

pub use completion::Guarded;
pub use config::GuardConfig;
pub use counter::CountingAllocator;
pub use error::GuardError;
pub use guard::{
    assert_no_alloc, run_guarded, run_guarded1, run_guarded2, run_guarded_async,
    run_guarded_async1, run_guarded_async2, AllocGuard,
};

#[cfg(test)]
#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;
