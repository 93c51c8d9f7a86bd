// liveness.rs
use embassy_time::{Duration, Instant};

/// Last-seen store for up to `N` sources, indexed by source address.
///
/// Entries are only written on a successful receipt and never removed;
/// staleness is decided on read by comparing the age against a window.
pub struct LivenessTracker<const N: usize> {
    last_seen: [Option<Instant>; N],
}

impl<const N: usize> LivenessTracker<N> {
    pub const fn new() -> Self {
        Self { last_seen: [None; N] }
    }

    /// Records a receipt from `source`. Out-of-range sources are ignored.
    pub fn record_seen(&mut self, source: usize, now: Instant) {
        if let Some(slot) = self.last_seen.get_mut(source) {
            *slot = Some(now);
        }
    }

    pub fn last_seen(&self, source: usize) -> Option<Instant> {
        self.last_seen.get(source).copied().flatten()
    }

    /// Time since the last receipt, `None` if never seen.
    /// A receipt stamped after `now` counts as age zero.
    pub fn age(&self, source: usize, now: Instant) -> Option<Duration> {
        self.last_seen(source)
            .map(|seen| now.checked_duration_since(seen).unwrap_or(Duration::from_ticks(0)))
    }

    /// True when `source` was seen less than `window` ago. Unseen sources are never fresh.
    pub fn is_fresh(&self, source: usize, now: Instant, window: Duration) -> bool {
        match self.age(source, now) {
            Some(age) => age < window,
            None => false,
        }
    }

    /// True when every listed source is fresh.
    pub fn all_fresh(&self, sources: impl IntoIterator<Item = usize>, now: Instant, window: Duration) -> bool {
        sources.into_iter().all(|source| self.is_fresh(source, now, window))
    }
}

impl<const N: usize> Default for LivenessTracker<N> {
    fn default() -> Self {
        Self::new()
    }
}
