//! Write coalescing for collection flushes.
//!
//! Tracks per-collection dirty state as a small state machine: Idle (clean),
//! Pending (dirty, debounce deadline armed), Flushing (a save task is in
//! flight, tagged with the write epoch it captured). All transitions take an
//! explicit `now` so the logic is testable without timers.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::store::Collection;

#[derive(Debug, Default)]
struct CollectionState {
    dirty: bool,
    /// Bumped on every write; a flush completion carrying an older epoch
    /// means the collection was written during the flight.
    epoch: u64,
    /// Epoch captured by the in-flight save task, if any.
    flushing: Option<u64>,
    deadline: Option<Instant>,
}

/// Per-collection debounce and in-flight bookkeeping.
#[derive(Debug)]
pub struct FlushTracker {
    debounce: Duration,
    states: HashMap<Collection, CollectionState>,
}

impl FlushTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            states: HashMap::new(),
        }
    }

    /// Record a write: mark dirty, bump the epoch, re-arm the deadline.
    pub fn note_write(&mut self, collection: Collection, now: Instant) {
        let state = self.states.entry(collection).or_default();
        state.dirty = true;
        state.epoch += 1;
        state.deadline = Some(now + self.debounce);
    }

    /// The earliest pending deadline, ignoring collections already in flight.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.states
            .values()
            .filter(|s| s.dirty && s.flushing.is_none())
            .filter_map(|s| s.deadline)
            .min()
    }

    /// Take the collections whose deadline has passed, marking them in
    /// flight. Returns each with the epoch its save task captures.
    pub fn take_due(&mut self, now: Instant) -> Vec<(Collection, u64)> {
        self.take_matching(|state| state.deadline.is_some_and(|d| d <= now))
    }

    /// Take every dirty collection regardless of deadline (forced flush).
    pub fn take_forced(&mut self) -> Vec<(Collection, u64)> {
        self.take_matching(|_| true)
    }

    fn take_matching(&mut self, pred: impl Fn(&CollectionState) -> bool) -> Vec<(Collection, u64)> {
        let mut due = Vec::new();
        for (collection, state) in self.states.iter_mut() {
            if state.dirty && state.flushing.is_none() && pred(state) {
                state.flushing = Some(state.epoch);
                state.deadline = None;
                due.push((*collection, state.epoch));
            }
        }
        due
    }

    /// Record a flush completion. A stale epoch (written during the flight)
    /// or a failure leaves the collection dirty; failures re-arm the
    /// deadline so the next cycle retries.
    pub fn complete(&mut self, collection: Collection, epoch: u64, ok: bool, now: Instant) {
        let state = self.states.entry(collection).or_default();
        state.flushing = None;
        if ok && state.epoch == epoch {
            state.dirty = false;
            state.deadline = None;
        } else if state.dirty && state.deadline.is_none() {
            state.deadline = Some(now + self.debounce);
        }
    }

    pub fn is_dirty(&self, collection: Collection) -> bool {
        self.states.get(&collection).is_some_and(|s| s.dirty)
    }

    /// Dirty collections with no flight in progress. Used for the shutdown
    /// flush after in-flight tasks have drained.
    pub fn dirty_collections(&self) -> Vec<Collection> {
        self.states
            .iter()
            .filter(|(_, s)| s.dirty && s.flushing.is_none())
            .map(|(c, _)| *c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> FlushTracker {
        FlushTracker::new(Duration::from_millis(100))
    }

    #[test]
    fn test_write_arms_deadline() {
        let mut t = tracker();
        let now = Instant::now();

        assert!(t.next_deadline().is_none());
        t.note_write(Collection::Staff, now);
        assert_eq!(t.next_deadline(), Some(now + Duration::from_millis(100)));
        assert!(t.is_dirty(Collection::Staff));
    }

    #[test]
    fn test_further_writes_rearm_deadline() {
        let mut t = tracker();
        let now = Instant::now();

        t.note_write(Collection::Staff, now);
        t.note_write(Collection::Staff, now + Duration::from_millis(60));
        assert_eq!(t.next_deadline(), Some(now + Duration::from_millis(160)));
    }

    #[test]
    fn test_take_due_respects_deadline() {
        let mut t = tracker();
        let now = Instant::now();

        t.note_write(Collection::Staff, now);
        assert!(t.take_due(now + Duration::from_millis(50)).is_empty());

        let due = t.take_due(now + Duration::from_millis(100));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, Collection::Staff);

        // In flight: no further deadline, no double take
        assert!(t.next_deadline().is_none());
        assert!(t.take_due(now + Duration::from_millis(500)).is_empty());
    }

    #[test]
    fn test_successful_completion_cleans() {
        let mut t = tracker();
        let now = Instant::now();

        t.note_write(Collection::Themes, now);
        let due = t.take_due(now + Duration::from_millis(100));
        let (collection, epoch) = due[0];

        t.complete(collection, epoch, true, now + Duration::from_millis(120));
        assert!(!t.is_dirty(Collection::Themes));
        assert!(t.next_deadline().is_none());
    }

    #[test]
    fn test_stale_epoch_completion_keeps_dirty() {
        let mut t = tracker();
        let now = Instant::now();

        t.note_write(Collection::Staff, now);
        let due = t.take_due(now + Duration::from_millis(100));
        let (collection, epoch) = due[0];

        // Written again while the save task is in flight
        t.note_write(Collection::Staff, now + Duration::from_millis(110));

        t.complete(collection, epoch, true, now + Duration::from_millis(120));
        assert!(t.is_dirty(Collection::Staff));
        // The in-flight write already re-armed the deadline
        assert_eq!(t.next_deadline(), Some(now + Duration::from_millis(210)));
    }

    #[test]
    fn test_failed_flush_rearms_retry() {
        let mut t = tracker();
        let now = Instant::now();

        t.note_write(Collection::Evaluations, now);
        let due = t.take_due(now + Duration::from_millis(100));
        let (collection, epoch) = due[0];

        t.complete(collection, epoch, false, now + Duration::from_millis(120));
        assert!(t.is_dirty(Collection::Evaluations));
        assert_eq!(t.next_deadline(), Some(now + Duration::from_millis(220)));
    }

    #[test]
    fn test_forced_takes_all_dirty() {
        let mut t = tracker();
        let now = Instant::now();

        t.note_write(Collection::Staff, now);
        t.note_write(Collection::Evaluations, now);

        // Staff goes in flight via the debounce path
        let due = t.take_due(now + Duration::from_millis(100));
        assert_eq!(due.len(), 2);

        t.note_write(Collection::Themes, now + Duration::from_millis(101));

        // Forced path picks up themes immediately, skips the two in flight
        let forced = t.take_forced();
        assert_eq!(forced.len(), 1);
        assert_eq!(forced[0].0, Collection::Themes);
    }

    #[test]
    fn test_dirty_collections_after_drain() {
        let mut t = tracker();
        let now = Instant::now();

        t.note_write(Collection::Users, now);
        let due = t.take_due(now + Duration::from_millis(100));
        t.complete(due[0].0, due[0].1, false, now + Duration::from_millis(110));

        assert_eq!(t.dirty_collections(), vec![Collection::Users]);
    }
}
