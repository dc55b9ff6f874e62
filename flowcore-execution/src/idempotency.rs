use crate::order::ClientOrderId;
use indexmap::IndexSet;

/// Bounded LRU of recently submitted `client_order_id`s (§4.3 "Idempotency
/// Tracker", §8 P5).
///
/// Backed by an `IndexSet` rather than an external LRU crate: this
/// workspace's own collections are hand-rolled compositions of
/// `indexmap`/`fnv` maps, not third-party cache crates, so this follows
/// the same idiom — insertion order doubles as recency order, and eviction
/// is a pop from the front.
#[derive(Debug)]
pub struct IdempotencyTracker {
    seen: IndexSet<ClientOrderId>,
    capacity: usize,
}

impl IdempotencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self { seen: IndexSet::with_capacity(capacity), capacity }
    }

    /// `true` if `id` has already been observed. Does not record it — call
    /// [`IdempotencyTracker::record`] once the caller decides to submit.
    pub fn is_duplicate(&self, id: &ClientOrderId) -> bool {
        self.seen.contains(id)
    }

    /// Record `id` as submitted, evicting the oldest entry if at capacity.
    pub fn record(&mut self, id: ClientOrderId) {
        if self.seen.contains(&id) {
            return;
        }
        if self.seen.len() >= self.capacity {
            self.seen.shift_remove_index(0);
        }
        self.seen.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol_str::SmolStr;

    fn id(s: &str) -> ClientOrderId {
        ClientOrderId(SmolStr::new(s))
    }

    #[test]
    fn detects_duplicate_client_order_id() {
        let mut tracker = IdempotencyTracker::new(4);
        tracker.record(id("a"));
        assert!(tracker.is_duplicate(&id("a")));
        assert!(!tracker.is_duplicate(&id("b")));
    }

    #[test]
    fn evicts_oldest_once_capacity_is_reached() {
        let mut tracker = IdempotencyTracker::new(2);
        tracker.record(id("a"));
        tracker.record(id("b"));
        tracker.record(id("c"));
        assert!(!tracker.is_duplicate(&id("a")), "oldest entry should have been evicted");
        assert!(tracker.is_duplicate(&id("b")));
        assert!(tracker.is_duplicate(&id("c")));
    }
}
