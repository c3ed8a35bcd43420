//! Sharded `i64` accumulator.
//!
//! Each thread is pinned to one cache-padded cell, so concurrent writers
//! rarely touch the same cache line. Reads sum every cell: a read racing
//! with writers may miss in-flight adds, but once writers quiesce the sum is
//! exact.

use std::cell::Cell;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::OnceLock;

use crossbeam_utils::CachePadded;

const MAX_CELLS: usize = 64;
const MIN_CELLS: usize = 4;

static NEXT_THREAD_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_SLOT: Cell<usize> = Cell::new(NEXT_THREAD_SLOT.fetch_add(1, Ordering::Relaxed));
}

/// Index of the calling thread, stable for the thread's lifetime.
pub(crate) fn thread_slot() -> usize {
    THREAD_SLOT.with(Cell::get)
}

fn cell_count() -> usize {
    static CELLS: OnceLock<usize> = OnceLock::new();
    *CELLS.get_or_init(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(MIN_CELLS)
            .next_power_of_two()
            .clamp(MIN_CELLS, MAX_CELLS)
    })
}

pub struct StripedLongAdder {
    cells: Box<[CachePadded<AtomicI64>]>,
}

impl StripedLongAdder {
    pub fn new() -> Self {
        let cells = (0..cell_count())
            .map(|_| CachePadded::new(AtomicI64::new(0)))
            .collect();
        Self { cells }
    }

    #[inline]
    fn cell(&self) -> &AtomicI64 {
        // cell count is a power of two
        &self.cells[thread_slot() & (self.cells.len() - 1)]
    }

    #[inline]
    pub fn add(&self, delta: i64) {
        self.cell().fetch_add(delta, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment(&self) {
        self.add(1);
    }

    #[inline]
    pub fn decrement(&self) {
        self.add(-1);
    }

    pub fn value(&self) -> i64 {
        self.cells
            .iter()
            .fold(0i64, |sum, c| sum.wrapping_add(c.load(Ordering::Relaxed)))
    }

    /// Returns the current sum and zeroes every cell. Adds racing with this
    /// call land either in the returned sum or in the next one, never both.
    pub fn get_and_reset(&self) -> i64 {
        self.cells
            .iter()
            .fold(0i64, |sum, c| sum.wrapping_add(c.swap(0, Ordering::Relaxed)))
    }

    pub fn reset(&self) {
        for c in self.cells.iter() {
            c.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for StripedLongAdder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StripedLongAdder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedLongAdder")
            .field("value", &self.value())
            .finish()
    }
}
