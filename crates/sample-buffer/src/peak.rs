//! Sliding-window maximum tracker

use std::collections::VecDeque;

/// Monotonic deque: front always holds the window maximum.
///
/// Entries are keyed by the sample sequence number so eviction can drop
/// everything older than the oldest sample still in the ring.
#[derive(Debug, Clone, Default)]
pub(crate) struct PeakTracker {
    entries: VecDeque<(u64, f32)>,
}

impl PeakTracker {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Record the value of sample `seq`
    pub(crate) fn push(&mut self, seq: u64, value: f32) {
        while let Some(&(_, back)) = self.entries.back() {
            if back <= value {
                self.entries.pop_back();
            } else {
                break;
            }
        }
        self.entries.push_back((seq, value));
    }

    /// Forget samples with a sequence number below `oldest_seq`
    pub(crate) fn evict_before(&mut self, oldest_seq: u64) {
        while let Some(&(seq, _)) = self.entries.front() {
            if seq < oldest_seq {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub(crate) fn max(&self) -> f32 {
        self.entries.front().map(|&(_, v)| v).unwrap_or(0.0)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_follows_window() {
        let mut peak = PeakTracker::with_capacity(4);
        peak.push(0, 1.0);
        peak.push(1, 5.0);
        peak.push(2, 2.0);
        assert_eq!(peak.max(), 5.0);

        peak.evict_before(2);
        assert_eq!(peak.max(), 2.0);
    }

    #[test]
    fn test_empty_is_zero() {
        let peak = PeakTracker::default();
        assert_eq!(peak.max(), 0.0);
    }
}
