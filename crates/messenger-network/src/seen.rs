//! Bounded cache of already-processed message ids.

use std::collections::{HashSet, VecDeque};

/// Least-recently-seen cache suppressing duplicate application effects.
///
/// Size never exceeds `capacity`; inserting into a full cache evicts exactly
/// one entry, the one seen longest ago. Re-seeing an id refreshes its
/// recency.
#[derive(Debug)]
pub struct SeenMessageCache {
    capacity: usize,
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenMessageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ids: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Record `id` as seen. Returns `true` if it was not in the cache,
    /// i.e. the caller should process the message.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            // Duplicate sighting: refresh recency.
            if let Some(pos) = self.order.iter().position(|known| known == id) {
                let refreshed = self.order.remove(pos);
                if let Some(refreshed) = refreshed {
                    self.order.push_back(refreshed);
                }
            }
            return false;
        }

        if self.ids.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }

        self.ids.insert(id.to_owned());
        self.order.push_back(id.to_owned());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
