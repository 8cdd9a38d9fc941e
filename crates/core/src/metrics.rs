use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Rough token estimate used for savings accounting: four characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

/// Session usage counters. Shared by the front-end and the agent loop.
#[derive(Default)]
pub struct UsageStats {
    requests: AtomicU64,
    cached_hits: AtomicU64,
    tokens_saved: AtomicU64,
    model_calls: AtomicU64,
    provider_switches: AtomicU64,
    tool_calls: AtomicU64,
    tool_failures: AtomicU64,
    blocked_requests: AtomicU64,
}

impl UsageStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// A request answered from the cache; the response size counts as saved tokens.
    pub fn record_cache_hit(&self, response: &str) {
        self.cached_hits.fetch_add(1, Ordering::Relaxed);
        self.tokens_saved
            .fetch_add(estimate_tokens(response), Ordering::Relaxed);
    }

    pub fn record_compression(&self, original: &str, compressed: &str) {
        let saved = estimate_tokens(original).saturating_sub(estimate_tokens(compressed));
        self.tokens_saved.fetch_add(saved, Ordering::Relaxed);
    }

    pub fn inc_model_calls(&self) {
        self.model_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_provider_switches(&self) {
        self.provider_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self, success: bool) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.tool_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_blocked_requests(&self) {
        self.blocked_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cached_hits: self.cached_hits.load(Ordering::Relaxed),
            tokens_saved: self.tokens_saved.load(Ordering::Relaxed),
            model_calls: self.model_calls.load(Ordering::Relaxed),
            provider_switches: self.provider_switches.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            blocked_requests: self.blocked_requests.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub cached_hits: u64,
    pub tokens_saved: u64,
    pub model_calls: u64,
    pub provider_switches: u64,
    pub tool_calls: u64,
    pub tool_failures: u64,
    pub blocked_requests: u64,
}

impl UsageSnapshot {
    /// Percentage of requests answered from the cache.
    pub fn cache_hit_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.cached_hits as f64 / self.requests as f64 * 100.0
    }

    pub fn tool_success_rate(&self) -> f64 {
        if self.tool_calls == 0 {
            return 1.0;
        }
        1.0 - (self.tool_failures as f64 / self.tool_calls as f64)
    }

    pub fn summary(&self) -> String {
        format!(
            "💰 COST OPTIMIZATION SUMMARY\n\
             Total Requests: {}\n\
             Cached Responses: {} ({:.1}%)\n\
             Tokens Saved: ~{}\n\
             API Calls Saved: {}\n\
             Model Calls: {}\n\
             Provider Switches: {}\n\
             Tool Calls: {} ({} failed)",
            self.requests,
            self.cached_hits,
            self.cache_hit_rate(),
            self.tokens_saved,
            self.cached_hits,
            self.model_calls,
            self.provider_switches,
            self.tool_calls,
            self.tool_failures,
        )
    }
}
