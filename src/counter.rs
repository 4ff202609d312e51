//! Per-thread allocation counters and the counting global allocator.
//!
//! The counters only move when [`CountingAllocator`] is installed as the
//! binary's `#[global_allocator]`:
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: allocguard::CountingAllocator = allocguard::CountingAllocator;
//! ```
//!
//! Both counters are `const`-initialized thread locals, so reading or bumping
//! them never allocates and never registers a destructor. That matters twice:
//! the allocator itself touches them, and the measurement window samples them.

use lazy_static::lazy_static;
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

thread_local! {
    static ALLOCATED_BYTES: Cell<u64> = const { Cell::new(0) };
    static ALLOCATION_COUNT: Cell<u64> = const { Cell::new(0) };
}

/// Pass-through allocator over [`System`] that feeds the thread-local counters.
///
/// `realloc` is charged its new size. `dealloc` is free: the counters are
/// cumulative and never go down.
pub struct CountingAllocator;

#[inline]
fn record(size: usize) {
    // try_with: the allocator can run during TLS teardown.
    let _ = ALLOCATED_BYTES.try_with(|c| c.set(c.get().saturating_add(size as u64)));
    let _ = ALLOCATION_COUNT.try_with(|c| c.set(c.get().saturating_add(1)));
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        record(layout.size());
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        record(layout.size());
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        record(new_size);
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

/// Snapshot of the current thread's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    /// Cumulative bytes requested from the allocator.
    pub bytes: u64,
    /// Cumulative allocation events (alloc, alloc_zeroed, realloc).
    pub allocations: u64,
}

impl Sample {
    /// Growth from `earlier` to `self`.
    pub fn since(&self, earlier: Sample) -> Sample {
        Sample {
            bytes: self.bytes.saturating_sub(earlier.bytes),
            allocations: self.allocations.saturating_sub(earlier.allocations),
        }
    }

    /// True when nothing was allocated.
    pub fn is_zero(&self) -> bool {
        self.bytes == 0 && self.allocations == 0
    }
}

/// Bytes allocated on the current thread since it started.
#[inline]
pub fn allocated_bytes() -> u64 {
    ALLOCATED_BYTES.try_with(Cell::get).unwrap_or(0)
}

/// Allocation events on the current thread since it started.
#[inline]
pub fn allocation_count() -> u64 {
    ALLOCATION_COUNT.try_with(Cell::get).unwrap_or(0)
}

/// Read both counters.
#[inline]
pub fn sample() -> Sample {
    Sample {
        bytes: allocated_bytes(),
        allocations: allocation_count(),
    }
}

lazy_static! {
    static ref COUNTER_LIVE: bool = self_test();
}

/// Whether the counting allocator is installed in this binary.
///
/// Evaluated once per process by allocating a box on a fresh thread and
/// checking that thread's counter moved.
pub fn is_live() -> bool {
    *COUNTER_LIVE
}

fn self_test() -> bool {
    let probe = std::thread::Builder::new()
        .name("allocguard-probe".into())
        .spawn(|| {
            let before = allocated_bytes();
            let boxed = std::hint::black_box(Box::new(0u64));
            drop(boxed);
            allocated_bytes() > before
        });
    let live = match probe {
        Ok(handle) => handle.join().unwrap_or(false),
        Err(_) => false,
    };
    if live {
        tracing::debug!("allocation counter self-test passed");
    } else {
        tracing::warn!("allocation counter is not live; install CountingAllocator as #[global_allocator]");
    }
    live
}
