use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::uniform_snapshot::UniformSnapshot;
use super::{Reservoir, Sample, Snapshot, DEFAULT_RESERVOIR_SIZE};

/// Ring buffer of the most recent `k` values.
pub struct SlidingWindowReservoir {
    count: AtomicU64,
    slots: Box<[Mutex<Option<Sample>>]>,
}

impl SlidingWindowReservoir {
    pub fn new(size: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            slots: (0..size.max(1)).map(|_| Mutex::new(None)).collect(),
        }
    }

    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }
}

impl Default for SlidingWindowReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVOIR_SIZE)
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn size(&self) -> usize {
        self.count.load(Ordering::Acquire).min(self.capacity()) as usize
    }

    fn update(&self, value: i64, tag: Option<&str>) {
        let n = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        let index = ((n - 1) % self.capacity()) as usize;
        *self.slots[index].lock() = Some(Sample::new(value, tag));
    }

    fn snapshot(&self, reset: bool) -> Box<dyn Snapshot> {
        if !reset {
            let count = self.count.load(Ordering::Acquire);
            let size = count.min(self.capacity()) as usize;
            // A slot can still be empty when its writer has bumped the count
            // but not stored yet.
            let samples: Vec<Sample> = self.slots[..size]
                .iter()
                .filter_map(|slot| slot.lock().clone())
                .collect();
            return Box::new(UniformSnapshot::from_samples(count, samples));
        }

        // Every update counted before the swap belongs to this snapshot and
        // every later one to the next.
        let count = self.count.swap(0, Ordering::AcqRel);
        let size = count.min(self.capacity()) as usize;
        let samples: Vec<Sample> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let sample = slot.lock().take();
                sample.filter(|_| index < size)
            })
            .collect();
        Box::new(UniformSnapshot::from_samples(count, samples))
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Release);
        for slot in self.slots.iter() {
            *slot.lock() = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_store_small_sample() {
        let reservoir = SlidingWindowReservoir::new(3);
        reservoir.update(1, None);
        reservoir.update(2, None);
        assert_eq!(reservoir.snapshot(false).values(), vec![1, 2]);
    }

    #[test]
    fn only_stores_last_values() {
        let reservoir = SlidingWindowReservoir::new(3);
        for v in 1..=5 {
            reservoir.update(v, None);
        }
        assert_eq!(reservoir.size(), 3);
        assert_eq!(reservoir.snapshot(false).values(), vec![3, 4, 5]);
    }

    #[test]
    fn records_user_value() {
        let reservoir = SlidingWindowReservoir::new(3);
        reservoir.update(2, Some("B"));
        reservoir.update(1, Some("A"));
        let snapshot = reservoir.snapshot(false);
        assert_eq!(snapshot.min_user_value(), Some("A"));
        assert_eq!(snapshot.max_user_value(), Some("B"));
    }

    #[test]
    fn reset_clears_window() {
        let reservoir = SlidingWindowReservoir::new(3);
        for v in 1..=5 {
            reservoir.update(v, None);
        }
        let snapshot = reservoir.snapshot(true);
        assert_eq!(snapshot.count(), 5);
        assert_eq!(reservoir.size(), 0);
        reservoir.update(9, None);
        assert_eq!(reservoir.snapshot(false).values(), vec![9]);
    }
}
