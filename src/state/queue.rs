//! Bucketed FIFO wait queues.
//!
//! Plain data, no interior locking: the matchmaker's mutex owns this
//! structure and every mutation happens inside its critical section.

use std::collections::{BTreeMap, VecDeque};

use crate::state::{Bucket, UserId};

/// The set of wait queues, one per bucket.
#[derive(Debug, Default)]
pub struct QueueSet {
    buckets: BTreeMap<Bucket, VecDeque<UserId>>,
}

impl QueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bucket a user is currently waiting in, if any.
    pub fn position(&self, id: &str) -> Option<Bucket> {
        self.buckets
            .iter()
            .find(|(_, queue)| queue.iter().any(|entry| entry == id))
            .map(|(bucket, _)| *bucket)
    }

    /// Append a user to a bucket's tail.
    ///
    /// Idempotent: returns false without mutating if the user is already
    /// waiting in any bucket.
    pub fn enqueue(&mut self, id: &str, bucket: Bucket) -> bool {
        if self.position(id).is_some() {
            return false;
        }
        self.buckets
            .entry(bucket)
            .or_default()
            .push_back(id.to_string());
        true
    }

    /// Remove a user from whichever bucket holds them.
    pub fn remove(&mut self, id: &str) -> bool {
        for queue in self.buckets.values_mut() {
            if let Some(index) = queue.iter().position(|entry| entry == id) {
                queue.remove(index);
                return true;
            }
        }
        false
    }

    /// Pop the head of a bucket, skipping the requester's own id.
    ///
    /// Entries equal to `exclude` are left in place; the first other
    /// entry is removed and returned.
    pub fn pop_compatible(&mut self, bucket: Bucket, exclude: &str) -> Option<UserId> {
        let queue = self.buckets.get_mut(&bucket)?;
        let index = queue.iter().position(|entry| entry != exclude)?;
        queue.remove(index)
    }

    /// Total number of waiting users across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export queue contents keyed by the bucket's snapshot key.
    pub fn export(&self) -> BTreeMap<String, Vec<UserId>> {
        self.buckets
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(bucket, queue)| {
                (
                    bucket.as_str().to_string(),
                    queue.iter().cloned().collect(),
                )
            })
            .collect()
    }

    /// Restore queues from a snapshot, preserving order. Unknown bucket
    /// keys and duplicate ids are dropped.
    pub fn restore(snapshot: BTreeMap<String, Vec<UserId>>) -> Self {
        let mut queues = Self::new();
        for (key, ids) in snapshot {
            let Some(bucket) = Bucket::parse(&key) else {
                continue;
            };
            for id in ids {
                queues.enqueue(&id, bucket);
            }
        }
        queues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Gender;

    const MALE: Bucket = Bucket::Gender(Gender::Male);
    const FEMALE: Bucket = Bucket::Gender(Gender::Female);

    #[test]
    fn enqueue_twice_leaves_user_queued_once() {
        let mut queues = QueueSet::new();
        assert!(queues.enqueue("a", MALE));
        assert!(!queues.enqueue("a", MALE));
        assert!(!queues.enqueue("a", FEMALE));
        assert_eq!(queues.len(), 1);
    }

    #[test]
    fn pop_is_fifo() {
        let mut queues = QueueSet::new();
        queues.enqueue("a", MALE);
        queues.enqueue("b", MALE);
        queues.enqueue("c", MALE);

        assert_eq!(queues.pop_compatible(MALE, "seeker").as_deref(), Some("a"));
        assert_eq!(queues.pop_compatible(MALE, "seeker").as_deref(), Some("b"));
        assert_eq!(queues.pop_compatible(MALE, "seeker").as_deref(), Some("c"));
        assert_eq!(queues.pop_compatible(MALE, "seeker"), None);
    }

    #[test]
    fn pop_skips_self_without_disturbing_order() {
        let mut queues = QueueSet::new();
        queues.enqueue("me", Bucket::Pool);
        queues.enqueue("other", Bucket::Pool);

        assert_eq!(
            queues.pop_compatible(Bucket::Pool, "me").as_deref(),
            Some("other")
        );
        // "me" must still be waiting at the head.
        assert_eq!(queues.position("me"), Some(Bucket::Pool));
    }

    #[test]
    fn remove_reports_whether_user_was_queued() {
        let mut queues = QueueSet::new();
        queues.enqueue("a", FEMALE);
        assert!(queues.remove("a"));
        assert!(!queues.remove("a"));
        assert!(queues.is_empty());
    }

    #[test]
    fn export_restore_preserves_order() {
        let mut queues = QueueSet::new();
        queues.enqueue("a", MALE);
        queues.enqueue("b", MALE);
        queues.enqueue("c", FEMALE);

        let mut restored = QueueSet::restore(queues.export());
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.pop_compatible(MALE, "x").as_deref(), Some("a"));
        assert_eq!(restored.pop_compatible(MALE, "x").as_deref(), Some("b"));
    }
}
