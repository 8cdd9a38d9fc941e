use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window request counter keyed by name. Keys without a limit
/// always admit.
pub struct RateLimiter {
    limits: HashMap<String, (usize, Duration)>,
    usage: HashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            limits: HashMap::new(),
            usage: HashMap::new(),
        }
    }

    pub fn set_limit(&mut self, key: impl Into<String>, max_calls: usize, window: Duration) {
        self.limits.insert(key.into(), (max_calls, window));
    }

    pub fn clear_limit(&mut self, key: &str) {
        self.limits.remove(key);
        self.usage.remove(key);
    }

    pub fn admit(&mut self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// Check and record in one step, as of `now`.
    pub fn admit_at(&mut self, key: &str, now: Instant) -> bool {
        let Some((max_calls, window)) = self.limits.get(key) else {
            return true;
        };

        let usage = self.usage.entry(key.to_string()).or_default();
        usage.retain(|&time| now.saturating_duration_since(time) < *window);

        if usage.len() >= *max_calls {
            debug!(key, used = usage.len(), max_calls, "rate window full");
            return false;
        }

        usage.push(now);
        true
    }

    /// Requests recorded inside the window as of `now`.
    pub fn in_window(&self, key: &str, now: Instant) -> usize {
        let window = self
            .limits
            .get(key)
            .map(|(_, window)| *window)
            .unwrap_or(DEFAULT_WINDOW);
        self.usage
            .get(key)
            .map(|times| {
                times
                    .iter()
                    .filter(|&&time| now.saturating_duration_since(time) < window)
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
