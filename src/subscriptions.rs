//! Active-subscription cache used for auto-resubscription.
//!
//! The cache remembers which topic filters the caller subscribed to, with
//! their options, so they can be re-issued after a reconnect. It is unique
//! by topic filter, mutated only through the facade's subscribe/unsubscribe
//! entry points (and their queued replays), and deliberately survives
//! disconnects — only an explicit unsubscribe removes an entry.
//!
//! The drain engine never works on the cache directly; it takes an ordered
//! `snapshot()` at the moment draining begins and consumes that copy
//! destructively, leaving the live cache untouched.

use std::collections::VecDeque;

use crate::transport::SubscribeOptions;

/// One remembered subscription: a topic filter and the options it was
/// subscribed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEntry {
    pub topic: String,
    pub options: SubscribeOptions,
}

/// Mapping from topic filter to subscription options, unique by filter,
/// preserving first-subscription order for deterministic replay.
#[derive(Debug, Default)]
pub struct SubscriptionCache {
    entries: Vec<SubscriptionEntry>,
}

impl SubscriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers a subscription. A later subscribe to an already-cached
    /// filter is a no-op: the source of these calls is idempotent, so
    /// first-write-wins keeps exactly one entry per filter.
    pub fn upsert(&mut self, topic: &str, options: SubscribeOptions) {
        if self.entries.iter().any(|entry| entry.topic == topic) {
            return;
        }
        self.entries.push(SubscriptionEntry {
            topic: topic.to_string(),
            options,
        });
    }

    /// Forgets a subscription. Removing an unknown filter is a no-op.
    pub fn remove(&mut self, topic: &str) {
        self.entries.retain(|entry| entry.topic != topic);
    }

    /// Returns an ordered copy for draining. Does not mutate the cache; the
    /// drain engine consumes the copy one entry per tick.
    pub fn snapshot(&self) -> VecDeque<SubscriptionEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of cached filters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the given filter is cached.
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.iter().any(|entry| entry.topic == topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_is_unique_per_topic() {
        let mut cache = SubscriptionCache::new();
        cache.upsert("sensor/temp", SubscribeOptions::default());
        cache.upsert("sensor/temp", SubscribeOptions::default());
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("sensor/temp"));
    }

    #[test]
    fn test_upsert_keeps_first_options() {
        let mut cache = SubscriptionCache::new();
        let first = SubscribeOptions {
            qos: rumqttc::QoS::AtLeastOnce,
        };
        cache.upsert("a", first);
        cache.upsert("a", SubscribeOptions::default());
        assert_eq!(cache.snapshot()[0].options, first);
    }

    #[test]
    fn test_remove_deletes_matching_entry_only() {
        let mut cache = SubscriptionCache::new();
        cache.upsert("a", SubscribeOptions::default());
        cache.upsert("b", SubscribeOptions::default());
        cache.remove("a");
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        // Removing again is harmless.
        cache.remove("a");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_snapshot_is_ordered_and_does_not_mutate() {
        let mut cache = SubscriptionCache::new();
        cache.upsert("first", SubscribeOptions::default());
        cache.upsert("second", SubscribeOptions::default());

        let mut snap = cache.snapshot();
        assert_eq!(snap.pop_front().unwrap().topic, "first");
        assert_eq!(snap.pop_front().unwrap().topic, "second");
        assert!(snap.is_empty());

        // Consuming the snapshot leaves the live cache untouched.
        assert_eq!(cache.len(), 2);
    }
}
