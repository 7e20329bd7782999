use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Time-ordered samples with lazy expiry.
///
/// A sample stamped `t` is inside the window at `now` iff
/// `now - t < span`. Samples must be pushed in non-decreasing time order.
#[derive(Debug, Clone)]
pub(crate) struct SlidingWindow<T> {
    span: Duration,
    samples: VecDeque<(Instant, T)>,
}

impl<T> SlidingWindow<T> {
    pub(crate) fn new(span: Duration) -> Self {
        Self {
            span,
            samples: VecDeque::new(),
        }
    }

    pub(crate) fn span(&self) -> Duration {
        self.span
    }

    pub(crate) fn push(&mut self, at: Instant, sample: T) {
        self.samples.push_back((at, sample));
        self.prune(at);
    }

    pub(crate) fn prune(&mut self, now: Instant) {
        while let Some((at, _)) = self.samples.front() {
            if self.contains(*at, now) {
                break;
            }
            self.samples.pop_front();
        }
    }

    /// Samples still inside the window at `now`, without mutating.
    pub(crate) fn live(&self, now: Instant) -> impl Iterator<Item = &T> {
        let first_live = self
            .samples
            .partition_point(|(at, _)| !self.contains(*at, now));
        self.samples.range(first_live..).map(|(_, sample)| sample)
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }

    fn contains(&self, at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(at) < self.span
    }
}
