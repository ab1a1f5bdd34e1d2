use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Per-key trailing-edge debouncer driven by explicit timestamps.
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    delay: Duration,
    deadlines: BTreeMap<K, Instant>,
}

impl<K: Ord + Copy> Debouncer<K> {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadlines: BTreeMap::new(),
        }
    }

    /// (Re)start the key's timer; a newer call replaces the pending deadline.
    pub fn schedule(&mut self, key: K, now: Instant) {
        self.deadlines.insert(key, now + self.delay);
    }

    pub fn cancel(&mut self, key: K) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    /// Remove and return every key whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| *key)
            .collect();
        for key in &due {
            self.deadlines.remove(key);
        }
        due
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
