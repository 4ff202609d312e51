//! Measurement window: the only code that runs between the two samples.
//!
//! Nothing in this module may allocate, lock, or log.

use crate::counter::{self, Sample};
use std::panic::{self, AssertUnwindSafe};

/// Start and end samples taken around one call, on one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Sample,
    pub end: Sample,
}

impl Window {
    /// What the call allocated.
    pub fn delta(&self) -> Sample {
        self.end.since(self.start)
    }

    /// True if any bytes were allocated inside the window.
    pub fn allocated(&self) -> bool {
        self.delta().bytes > 0
    }
}

/// Discard `reads` samples. The first read on a thread may pay one-time setup.
#[inline]
pub fn warm_up(reads: u32) {
    for _ in 0..reads {
        std::hint::black_box(counter::sample());
    }
}

/// Run `f` on the current thread between two counter samples.
pub fn measure<T>(warmup_reads: u32, f: impl FnOnce() -> T) -> (T, Window) {
    warm_up(warmup_reads);
    let start = counter::sample();
    let value = f();
    let end = counter::sample();
    (value, Window { start, end })
}

/// Like [`measure`], but a panic in `f` is caught and returned.
///
/// The end sample is taken after unwinding, so a panicking call always shows
/// the panic machinery's own allocations in its window.
pub fn measure_unwind<T>(
    warmup_reads: u32,
    f: impl FnOnce() -> T,
) -> (std::thread::Result<T>, Window) {
    warm_up(warmup_reads);
    let start = counter::sample();
    let value = panic::catch_unwind(AssertUnwindSafe(f));
    let end = counter::sample();
    (value, Window { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hint::black_box;

    #[test]
    fn arithmetic_is_clean() {
        let (v, w) = measure(1, || black_box(1) + black_box(1));
        assert_eq!(v, 2);
        assert!(!w.allocated());
        assert!(w.delta().is_zero());
    }

    #[test]
    fn vec_is_caught() {
        let (v, w) = measure(1, || black_box(vec![0u8; 3]));
        assert_eq!(v.len(), 3);
        assert!(w.allocated());
        assert!(w.delta().bytes >= 3);
    }

    #[test]
    fn freeing_outside_memory_is_clean() {
        let outside: Vec<u32> = black_box(vec![7; 32]);
        let (_, w) = measure(1, move || drop(outside));
        assert!(!w.allocated());
    }

    #[test]
    fn zero_warmup_reads_still_measures() {
        let (_, w) = measure(0, || black_box(Box::new(5u32)));
        assert!(w.allocated());
    }

    #[test]
    fn panic_is_returned() {
        let (r, _w) = measure_unwind(1, || -> u32 { panic!("boom") });
        assert!(r.is_err());
    }
}
