// The per-node neighbor cache: a bounded, ordered, duplicate-free list of
// entries with uniform sampling over its slots.

use rand::seq::index;
use rand::Rng;

use crate::gs_interface::PeerId;

/// One cache slot: a neighbor reference plus disclosure bookkeeping.
///
/// `sent_to` records the peer this entry was most recently handed to during
/// an outgoing exchange. Identity is the neighbor alone; two entries wrapping
/// the same neighbor are the same entry no matter what was disclosed where.
#[derive(Clone, Copy, Debug)]
pub struct Entry {
    neighbor: PeerId,
    sent_to: Option<PeerId>,
}

impl Entry {
    pub fn new(neighbor: PeerId) -> Self {
        Self {
            neighbor,
            sent_to: None,
        }
    }

    pub fn neighbor(&self) -> PeerId {
        self.neighbor
    }

    pub fn sent_to(&self) -> Option<PeerId> {
        self.sent_to
    }

    pub fn mark_sent_to(&mut self, peer: PeerId) {
        self.sent_to = Some(peer);
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.neighbor == other.neighbor
    }
}

impl Eq for Entry {}

impl std::hash::Hash for Entry {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.neighbor.hash(state);
    }
}

/// Bounded neighbor cache. Capacity is fixed at construction; no neighbor
/// ever appears twice. All mutation is silent-on-conflict: a full cache or a
/// duplicate neighbor makes `add` a no-op rather than an error.
#[derive(Debug)]
pub struct Cache {
    entries: Vec<Entry>,
    size: usize,
}

impl Cache {
    pub fn new(size: usize) -> Self {
        Self {
            entries: Vec::with_capacity(size),
            size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.size
    }

    pub fn capacity(&self) -> usize {
        self.size
    }

    pub fn contains(&self, neighbor: &PeerId) -> bool {
        self.entries.iter().any(|e| e.neighbor == *neighbor)
    }

    pub fn position(&self, neighbor: &PeerId) -> Option<usize> {
        self.entries.iter().position(|e| e.neighbor == *neighbor)
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn neighbor_at(&self, index: usize) -> Option<PeerId> {
        self.entries.get(index).map(|e| e.neighbor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Append an entry. Returns false (and changes nothing) if the cache is
    /// full or the neighbor is already present.
    pub fn add(&mut self, entry: Entry) -> bool {
        if self.is_full() || self.contains(&entry.neighbor) {
            return false;
        }

        self.entries.push(entry);
        true
    }

    /// Remove the entry for `neighbor`, closing the gap. Returns whether an
    /// entry was removed.
    pub fn remove(&mut self, neighbor: &PeerId) -> bool {
        match self.position(neighbor) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Overwrite the slot at `index`. The caller is responsible for only
    /// replacing with a neighbor not already cached elsewhere.
    pub fn replace(&mut self, index: usize, entry: Entry) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = entry;
        }
    }

    pub fn mark_sent_to(&mut self, index: usize, to: PeerId) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.mark_sent_to(to);
        }
    }

    /// Slots whose entry was last disclosed to `peer`, in cache order. These
    /// are the positions a merge may reclaim when the cache is full.
    pub fn reclaimable_slots(&self, peer: &PeerId) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.sent_to == Some(*peer))
            .map(|(i, _)| i)
            .collect()
    }

    /// Pick one slot uniformly at random.
    pub fn random_index<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }

        Some(rng.gen_range(0..self.entries.len()))
    }

    /// Draw up to `n` distinct slots uniformly without replacement,
    /// optionally leaving one slot out of the candidate pool. Fewer than `n`
    /// candidates means all of them are returned.
    pub fn sample_indices<R: Rng>(
        &self,
        n: usize,
        exclude: Option<usize>,
        rng: &mut R,
    ) -> Vec<usize> {
        let pool = match exclude {
            Some(_) => self.entries.len().saturating_sub(1),
            None => self.entries.len(),
        };
        let amount = n.min(pool);
        if amount == 0 {
            return Vec::new();
        }

        let mut picked = index::sample(rng, pool, amount).into_vec();
        if let Some(skip) = exclude {
            // the pool left a hole at `skip`; shift the tail back over it
            for slot in picked.iter_mut() {
                if *slot >= skip {
                    *slot += 1;
                }
            }
        }

        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_entry_identity_ignores_sent_to() {
        let mut a = Entry::new(7);
        let b = Entry::new(7);
        let c = Entry::new(8);

        a.mark_sent_to(99);

        // disclosure bookkeeping is invisible to identity
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_add_rejects_duplicates_and_overflow() {
        let mut cache = Cache::new(2);

        assert!(cache.add(Entry::new(1)));
        assert!(cache.add(Entry::new(2)));

        // duplicate neighbor, even with different bookkeeping
        let mut dup = Entry::new(1);
        dup.mark_sent_to(42);
        assert!(!cache.add(dup));

        // full
        assert!(!cache.add(Entry::new(3)));

        assert_eq!(cache.len(), 2);
        assert!(cache.is_full());
        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(!cache.contains(&3));
    }

    #[test]
    fn test_remove_preserves_order_of_rest() {
        let mut cache = Cache::new(4);
        for n in [10, 20, 30, 40] {
            cache.add(Entry::new(n));
        }

        assert!(cache.remove(&20));
        assert!(!cache.remove(&20));

        let left: Vec<PeerId> = cache.iter().map(|e| e.neighbor()).collect();
        assert_eq!(left, vec![10, 30, 40]);
        assert!(!cache.is_full());
    }

    #[test]
    fn test_replace_overwrites_single_slot() {
        let mut cache = Cache::new(3);
        for n in [1, 2, 3] {
            cache.add(Entry::new(n));
        }

        cache.replace(1, Entry::new(9));

        let all: Vec<PeerId> = cache.iter().map(|e| e.neighbor()).collect();
        assert_eq!(all, vec![1, 9, 3]);
    }

    #[test]
    fn test_reclaimable_slots_in_cache_order() {
        let mut cache = Cache::new(4);
        for n in [1, 2, 3, 4] {
            cache.add(Entry::new(n));
        }

        cache.mark_sent_to(3, 77);
        cache.mark_sent_to(0, 77);
        cache.mark_sent_to(2, 88); // different peer, not reclaimable for 77

        assert_eq!(cache.reclaimable_slots(&77), vec![0, 3]);
        assert_eq!(cache.reclaimable_slots(&88), vec![2]);
        assert!(cache.reclaimable_slots(&99).is_empty());
    }

    #[test]
    fn test_sample_indices_distinct_and_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut cache = Cache::new(10);
        for n in 0..10u64 {
            cache.add(Entry::new(n));
        }

        for _ in 0..100 {
            let picked = cache.sample_indices(4, None, &mut rng);
            assert_eq!(picked.len(), 4);

            let mut sorted = picked.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 4, "indices must be distinct");
            assert!(picked.iter().all(|&i| i < 10));
        }

        // asking for more than available returns everything
        let all = cache.sample_indices(50, None, &mut rng);
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_sample_indices_respects_exclusion() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cache = Cache::new(5);
        for n in 0..5u64 {
            cache.add(Entry::new(n));
        }

        for excluded in 0..5 {
            for _ in 0..50 {
                let picked = cache.sample_indices(4, Some(excluded), &mut rng);
                assert_eq!(picked.len(), 4);
                assert!(!picked.contains(&excluded));
                assert!(picked.iter().all(|&i| i < 5));
            }
        }
    }

    #[test]
    fn test_sampling_covers_all_slots() {
        // with a seeded rng every slot should show up over many single draws
        let mut rng = StdRng::seed_from_u64(1);
        let mut cache = Cache::new(5);
        for n in 0..5u64 {
            cache.add(Entry::new(n));
        }

        let mut seen = [false; 5];
        for _ in 0..200 {
            if let Some(i) = cache.random_index(&mut rng) {
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s), "uniform draw never hit some slot");
    }

    #[test]
    fn test_empty_cache_sampling() {
        let mut rng = StdRng::seed_from_u64(3);
        let cache = Cache::new(4);

        assert!(cache.random_index(&mut rng).is_none());
        assert!(cache.sample_indices(3, None, &mut rng).is_empty());
    }
}
