use std::collections::BTreeMap;
use std::time::Instant;

/// Cancellable one-shot tasks keyed by `K`, at most one pending per key.
///
/// Nothing here reads the clock: callers pass `now` in, which keeps debounce
/// behaviour testable without sleeping.
#[derive(Debug, Clone)]
pub struct Debouncer<K: Ord + Clone> {
    pending: BTreeMap<K, (Instant, u64)>,
    seq: u64,
}

impl<K: Ord + Clone> Default for Debouncer<K> {
    fn default() -> Self {
        Self { pending: BTreeMap::new(), seq: 0 }
    }
}

impl<K: Ord + Clone> Debouncer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` for `deadline`, replacing any task already pending for it.
    pub fn schedule(&mut self, key: K, deadline: Instant) {
        self.seq += 1;
        self.pending.insert(key, (deadline, self.seq));
    }

    /// Returns true if a task was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.pending.get(key).map(|(d, _)| *d)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(d, _)| *d).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every task due at `now`, earliest deadline first
    /// (ties keep scheduling order).
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(Instant, u64, K)> = self
            .pending
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(k, (deadline, seq))| (*deadline, *seq, k.clone()))
            .collect();
        due.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        for (_, _, k) in &due {
            self.pending.remove(k);
        }
        due.into_iter().map(|(_, _, k)| k).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn rescheduling_replaces_the_pending_task() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.schedule("a", t0 + ms(100));
        d.schedule("a", t0 + ms(150));
        assert_eq!(d.len(), 1);
        assert!(d.take_due(t0 + ms(120)).is_empty());
        assert_eq!(d.take_due(t0 + ms(150)), vec!["a"]);
        assert!(d.is_empty());
    }

    #[test]
    fn due_tasks_come_out_in_deadline_order() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.schedule("late", t0 + ms(30));
        d.schedule("early", t0 + ms(10));
        d.schedule("tie", t0 + ms(30));
        d.schedule("future", t0 + ms(500));
        assert_eq!(d.next_deadline(), Some(t0 + ms(10)));
        assert_eq!(d.take_due(t0 + ms(40)), vec!["early", "late", "tie"]);
        assert!(d.is_pending(&"future"));
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.schedule("a", t0);
        assert!(d.cancel(&"a"));
        assert!(!d.cancel(&"a"));
        assert!(d.take_due(t0 + ms(1)).is_empty());
        assert_eq!(d.next_deadline(), None);
    }
}
