use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::uniform_snapshot::UniformSnapshot;
use super::{Reservoir, Sample, Snapshot, DEFAULT_RESERVOIR_SIZE};

/// Classic reservoir sampling (Vitter's algorithm R): every value seen so far
/// has the same `k / n` chance of being in the sample.
pub struct UniformReservoir {
    count: AtomicU64,
    slots: Box<[Mutex<Option<Sample>>]>,
    rng: Mutex<StdRng>,
}

impl UniformReservoir {
    pub fn new(size: usize) -> Self {
        Self::with_rng(size, StdRng::from_entropy())
    }

    /// Reservoir whose replacement decisions come from `rng`, so runs are
    /// reproducible.
    pub fn with_rng(size: usize, rng: StdRng) -> Self {
        Self {
            count: AtomicU64::new(0),
            slots: (0..size.max(1)).map(|_| Mutex::new(None)).collect(),
            rng: Mutex::new(rng),
        }
    }

    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }
}

impl Default for UniformReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVOIR_SIZE)
    }
}

impl Reservoir for UniformReservoir {
    fn size(&self) -> usize {
        self.count.load(Ordering::Acquire).min(self.capacity()) as usize
    }

    fn update(&self, value: i64, tag: Option<&str>) {
        let n = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        let index = if n <= self.capacity() {
            n - 1
        } else {
            let r = self.rng.lock().gen_range(0..n);
            if r >= self.capacity() {
                return;
            }
            r
        };
        *self.slots[index as usize].lock() = Some(Sample::new(value, tag));
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
    use std::collections::HashSet;

    #[test]
    fn holds_exactly_k_after_more_than_k_inserts() {
        let reservoir = UniformReservoir::with_rng(100, StdRng::seed_from_u64(7));
        for i in 0..1000 {
            reservoir.update(i, None);
        }
        assert_eq!(reservoir.size(), 100);
        let snapshot = reservoir.snapshot(false);
        assert_eq!(snapshot.size(), 100);
        assert_eq!(snapshot.count(), 1000);
        assert!(snapshot.values().iter().all(|v| (0..1000).contains(v)));
    }

    #[test]
    fn under_capacity_keeps_every_value() {
        let reservoir = UniformReservoir::new(100);
        for i in 0..10 {
            reservoir.update(i, None);
        }
        assert_eq!(reservoir.size(), 10);
        let values: HashSet<i64> = reservoir.snapshot(false).values().into_iter().collect();
        assert_eq!(values, (0..10).collect::<HashSet<_>>());
    }

    #[test]
    fn snapshot_with_reset_empties_reservoir() {
        let reservoir = UniformReservoir::new(10);
        reservoir.update(1, None);
        reservoir.update(2, None);
        let snapshot = reservoir.snapshot(true);
        assert_eq!(snapshot.count(), 2);
        assert_eq!(snapshot.size(), 2);
        assert_eq!(reservoir.size(), 0);
        assert_eq!(reservoir.snapshot(false).size(), 0);
    }

    #[test]
    fn records_user_value() {
        let reservoir = UniformReservoir::new(10);
        reservoir.update(2, Some("B"));
        reservoir.update(1, Some("A"));
        let snapshot = reservoir.snapshot(false);
        assert_eq!(snapshot.min_user_value(), Some("A"));
        assert_eq!(snapshot.max_user_value(), Some("B"));
    }

    #[test]
    fn sampling_is_roughly_uniform() {
        // 10 slots over 0..100: each decile should show up about once.
        let mut hits = [0u32; 10];
        for seed in 0..200 {
            let reservoir = UniformReservoir::with_rng(10, StdRng::seed_from_u64(seed));
            for i in 0..100 {
                reservoir.update(i, None);
            }
            for v in reservoir.snapshot(false).values() {
                hits[(v / 10) as usize] += 1;
            }
        }
        // 2000 picks, 200 expected per decile
        assert!(hits.iter().all(|&h| (120..=280).contains(&h)), "{hits:?}");
    }
}
