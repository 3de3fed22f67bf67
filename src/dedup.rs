use std::collections::{HashSet, VecDeque};

use crate::types::EventIdentity;

/// Bounded set of event identities already processed, making re-delivery
/// idempotent.
///
/// Eviction drops the oldest half in one pass instead of clearing
/// everything, so there is no dedup blind window right after eviction.
pub struct DedupIndex {
    cap: usize,
    order: VecDeque<EventIdentity>,
    seen: HashSet<EventIdentity>,
}

impl DedupIndex {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            order: VecDeque::with_capacity(cap),
            seen: HashSet::with_capacity(cap),
        }
    }

    pub fn seen(&self, identity: &EventIdentity) -> bool {
        self.seen.contains(identity)
    }

    pub fn mark_seen(&mut self, identity: EventIdentity) {
        if self.seen.insert(identity.clone()) {
            self.order.push_back(identity);
        }

        if self.order.len() > self.cap {
            let drop_count = self.order.len() / 2;
            tracing::debug!(drop_count, cap = self.cap, "evicting oldest dedup entries");
            for _ in 0..drop_count {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, StreamEvent};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn identity(seq: usize) -> EventIdentity {
        EventIdentity::of(&StreamEvent {
            category: "trade".to_string(),
            account_id: AccountId::from("ACC1"),
            payload: json!({ "seq": seq }),
            received_at: Utc.timestamp_millis_opt(seq as i64).unwrap(),
        })
    }

    #[test]
    fn mark_then_seen() {
        let mut index = DedupIndex::new(8);
        let id = identity(1);
        assert!(!index.seen(&id));
        index.mark_seen(id.clone());
        assert!(index.seen(&id));
    }

    #[test]
    fn re_marking_does_not_grow() {
        let mut index = DedupIndex::new(8);
        let id = identity(1);
        index.mark_seen(id.clone());
        index.mark_seen(id.clone());
        index.mark_seen(id);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn never_exceeds_cap() {
        let mut index = DedupIndex::new(500);
        for seq in 0..10_000 {
            index.mark_seen(identity(seq));
        }
        assert!(index.len() <= 500);
    }

    #[test]
    fn eviction_drops_oldest_half_and_keeps_recent() {
        let mut index = DedupIndex::new(100);
        for seq in 0..101 {
            index.mark_seen(identity(seq));
        }
        // One past the cap: the oldest half is gone, the newest survive.
        assert!(index.len() <= 100);
        assert!(!index.seen(&identity(0)));
        assert!(index.seen(&identity(100)));
        assert!(index.seen(&identity(99)));
    }

    #[test]
    fn clear_resets_everything() {
        let mut index = DedupIndex::new(8);
        index.mark_seen(identity(1));
        index.clear();
        assert!(index.is_empty());
        assert!(!index.seen(&identity(1)));
    }
}
