//! Companion configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Samples captured before the trigger
    pub pre_window_samples: usize,
    /// Samples captured after the trigger
    pub post_window_samples: usize,
    /// Recent samples kept for pre windows (at least `pre_window_samples`)
    pub history_capacity: usize,
    /// Bounded update channel size
    pub update_capacity: usize,
    /// Same-kind triggers closer than this share one window (ms)
    pub window_dedupe_ms: u32,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            pre_window_samples: 50,
            post_window_samples: 50,
            history_capacity: 100,
            update_capacity: 256,
            window_dedupe_ms: 500,
        }
    }
}
