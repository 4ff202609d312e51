//! Worker cap: a bounded channel pre-filled with one token per allowed worker.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::num::NonZeroUsize;

/// Shared budget of live guard workers.
#[derive(Clone, Debug)]
pub struct WorkerPermits {
    give: Sender<()>,
    take: Receiver<()>,
    capacity: usize,
}

impl WorkerPermits {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        let (give, take) = bounded(capacity);
        for _ in 0..capacity {
            // Cannot fail: the channel has room for every token and we hold the receiver.
            let _ = give.try_send(());
        }
        Self {
            give,
            take,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.take.len()
    }

    /// Block until a permit is free.
    pub fn acquire(&self) -> Permit {
        // Both ends live in `self`, so recv cannot see a disconnect.
        let _ = self.take.recv();
        Permit {
            give: self.give.clone(),
        }
    }
}

/// One held worker slot; returned on drop.
#[derive(Debug)]
pub struct Permit {
    give: Sender<()>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let _ = self.give.try_send(());
    }
}
