use crate::classifier::TaskClassifier;
use deskpilot_policy::RateLimiter;
use deskpilot_providers::{LoadError, LoadedModel, ModelLoader, ProviderId, Tier};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Provider that is always loaded when every candidate is gone.
pub const LOCAL_FALLBACK: ProviderId = ProviderId::Ollama;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitcherState {
    Uninitialized,
    Active(ProviderId),
    /// Every candidate failed; the local fallback is serving.
    Exhausted,
}

impl SwitcherState {
    pub fn active_provider(&self) -> Option<ProviderId> {
        match self {
            SwitcherState::Uninitialized => None,
            SwitcherState::Active(provider) => Some(*provider),
            SwitcherState::Exhausted => Some(LOCAL_FALLBACK),
        }
    }
}

/// Status changes worth showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchEvent {
    RateLimited(ProviderId),
    Failed { provider: ProviderId, reason: String },
    Loaded { provider: ProviderId, model: String, tier: Tier },
    LocalFallback { model: String },
}

impl fmt::Display for SwitchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchEvent::RateLimited(provider) => {
                write!(f, "⏳ {provider} rate limited, trying next provider")
            }
            SwitchEvent::Failed { provider, reason } => {
                write!(f, "⚠️ {provider} unavailable: {reason}")
            }
            SwitchEvent::Loaded { provider, model, tier } => {
                write!(f, "✅ Using {provider} ({model}, {tier} tier)")
            }
            SwitchEvent::LocalFallback { model } => {
                write!(f, "🏠 All cloud providers unavailable, falling back to local {model}")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("{0} is rate limited right now")]
    RateLimited(ProviderId),
    #[error("{0} already failed and was retried once this session")]
    RetryExhausted(ProviderId),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Owns the live model handle and decides which provider serves the session.
pub struct ModelSwitcher<L: ModelLoader> {
    loader: L,
    classifier: TaskClassifier,
    limiter: RateLimiter,
    fallback_order: Vec<ProviderId>,
    failed: HashSet<ProviderId>,
    explicit_retried: HashSet<ProviderId>,
    current: Option<LoadedModel>,
    state: SwitcherState,
    events: Vec<SwitchEvent>,
}

impl<L: ModelLoader> ModelSwitcher<L> {
    pub fn new(
        loader: L,
        classifier: TaskClassifier,
        fallback_order: Vec<ProviderId>,
        window: Duration,
    ) -> Self {
        let mut limiter = RateLimiter::new();
        for provider in ProviderId::ALL {
            if let Some(max_calls) = loader.rate_limit(provider) {
                limiter.set_limit(provider.as_str(), max_calls, window);
            }
        }

        let mut order = Vec::with_capacity(fallback_order.len());
        for provider in fallback_order {
            if !order.contains(&provider) {
                order.push(provider);
            }
        }

        Self {
            loader,
            classifier,
            limiter,
            fallback_order: order,
            failed: HashSet::new(),
            explicit_retried: HashSet::new(),
            current: None,
            state: SwitcherState::Uninitialized,
            events: Vec::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn state(&self) -> SwitcherState {
        self.state
    }

    pub fn current(&self) -> Option<&LoadedModel> {
        self.current.as_ref()
    }

    pub fn failed(&self) -> &HashSet<ProviderId> {
        &self.failed
    }

    pub fn fallback_order(&self) -> &[ProviderId] {
        &self.fallback_order
    }

    /// Status events since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<SwitchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Load a model for `query`, walking the fallback order. Always leaves a
    /// usable handle.
    pub async fn acquire(&mut self, query: &str) -> &LoadedModel {
        let tier = self.classifier.classify(query);
        let candidates = self.fallback_order.clone();
        self.walk(&candidates, tier).await
    }

    /// The current model, acquiring one for `query` if nothing is loaded.
    pub async fn ensure_loaded(&mut self, query: &str) -> &LoadedModel {
        match self.current.take() {
            Some(model) => &*self.current.insert(model),
            None => self.acquire(query).await,
        }
    }

    /// Record one request against the current provider's rate window.
    /// Returns false when the window is full.
    pub fn admit_current(&mut self) -> bool {
        match self.current.as_ref().map(|model| model.provider) {
            Some(provider) => self.limiter.admit(provider.as_str()),
            None => true,
        }
    }

    /// Explicit user request to move to `provider`. A provider in the failed
    /// set may be retried this way once per session.
    pub async fn switch_to(&mut self, provider: ProviderId) -> Result<&LoadedModel, SwitchError> {
        if self.failed.contains(&provider) && !self.explicit_retried.insert(provider) {
            return Err(SwitchError::RetryExhausted(provider));
        }

        let tier = self.current_tier();
        if !self.limiter.admit(provider.as_str()) {
            warn!(provider = %provider, "explicit switch denied by rate window");
            self.events.push(SwitchEvent::RateLimited(provider));
            return Err(SwitchError::RateLimited(provider));
        }

        match self.loader.load(provider, tier).await {
            Ok(model) => {
                self.failed.remove(&provider);
                Ok(self.install(model, SwitcherState::Active(provider)))
            }
            Err(e) => {
                self.mark_failed(provider, e.to_string());
                if self.current.is_none() {
                    let candidates = self.fallback_order.clone();
                    self.walk(&candidates, tier).await;
                }
                Err(SwitchError::Load(e))
            }
        }
    }

    /// Give up on the current provider after `reason` and move to the next one
    /// in the fallback order. Never returns to a failed provider.
    pub async fn switch(&mut self, reason: &str) -> &LoadedModel {
        let tier = self.current_tier();
        let failing = self.current.as_ref().map(|model| model.provider);

        let start = match failing {
            Some(provider) => {
                self.mark_failed(provider, reason.to_string());
                self.fallback_order
                    .iter()
                    .position(|p| *p == provider)
                    .map(|i| i + 1)
                    .unwrap_or(0)
            }
            None => 0,
        };

        let len = self.fallback_order.len();
        let candidates: Vec<ProviderId> = (0..len)
            .map(|offset| self.fallback_order[(start + offset) % len])
            .collect();
        self.walk(&candidates, tier).await
    }

    fn current_tier(&self) -> Tier {
        self.current
            .as_ref()
            .map(|model| model.tier)
            .unwrap_or_else(|| self.classifier.default_tier())
    }

    fn mark_failed(&mut self, provider: ProviderId, reason: String) {
        warn!(provider = %provider, reason = %reason, "provider marked failed for this session");
        self.failed.insert(provider);
        self.events.push(SwitchEvent::Failed { provider, reason });
    }

    async fn walk(&mut self, candidates: &[ProviderId], tier: Tier) -> &LoadedModel {
        for &provider in candidates {
            if self.failed.contains(&provider) {
                continue;
            }
            if !self.limiter.admit(provider.as_str()) {
                warn!(provider = %provider, "rate window full, skipping provider");
                self.events.push(SwitchEvent::RateLimited(provider));
                continue;
            }

            match self.loader.load(provider, tier).await {
                Ok(model) => return self.install(model, SwitcherState::Active(provider)),
                Err(e) => self.mark_failed(provider, e.to_string()),
            }
        }

        let model = self.loader.load_unprobed(LOCAL_FALLBACK, tier);
        warn!(model = %model.model, "no provider available, using local fallback");
        self.events.push(SwitchEvent::LocalFallback {
            model: model.model.clone(),
        });
        self.install(model, SwitcherState::Exhausted)
    }

    fn install(&mut self, model: LoadedModel, state: SwitcherState) -> &LoadedModel {
        info!(provider = %model.provider, model = %model.model, tier = %model.tier, "model active");
        if matches!(state, SwitcherState::Active(_)) {
            self.events.push(SwitchEvent::Loaded {
                provider: model.provider,
                model: model.model.clone(),
                tier: model.tier,
            });
        }
        self.state = state;
        // Dropping the previous handle here keeps a single live connection.
        self.current.insert(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deskpilot_providers::{GenerateResponse, LLMProvider, Message, ProviderError};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct NullProvider(ProviderId);

    #[async_trait]
    impl LLMProvider for NullProvider {
        async fn generate(
            &self,
            _messages: &[Message],
            _tools: Option<&[Value]>,
        ) -> Result<GenerateResponse, ProviderError> {
            Ok(GenerateResponse {
                content: Some("ok".to_string()),
                tool_calls: Vec::new(),
                finish_reason: "stop".to_string(),
            })
        }

        fn name(&self) -> &str {
            self.0.as_str()
        }

        fn model(&self) -> &str {
            "null"
        }
    }

    /// Loader whose per-provider outcomes are scripted. Providers without a
    /// script load successfully.
    #[derive(Clone, Default)]
    struct ScriptedLoader {
        failures: Arc<Mutex<HashMap<ProviderId, bool>>>,
        limits: HashMap<ProviderId, usize>,
        loads: Arc<AtomicUsize>,
        unprobed: Arc<AtomicUsize>,
    }

    impl ScriptedLoader {
        fn failing(self, provider: ProviderId) -> Self {
            self.failures.lock().unwrap().insert(provider, true);
            self
        }

        fn recover(&self, provider: ProviderId) {
            self.failures.lock().unwrap().remove(&provider);
        }

        fn limited(mut self, provider: ProviderId, max: usize) -> Self {
            self.limits.insert(provider, max);
            self
        }

        fn model(provider: ProviderId, tier: Tier) -> LoadedModel {
            LoadedModel {
                provider,
                model: format!("{provider}-{tier}"),
                tier,
                handle: Box::new(NullProvider(provider)),
            }
        }
    }

    #[async_trait]
    impl ModelLoader for ScriptedLoader {
        async fn load(&self, provider: ProviderId, tier: Tier) -> Result<LoadedModel, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.failures.lock().unwrap().contains_key(&provider) {
                return Err(LoadError::Unavailable {
                    provider,
                    reason: "probe failed".to_string(),
                });
            }
            Ok(Self::model(provider, tier))
        }

        fn load_unprobed(&self, provider: ProviderId, tier: Tier) -> LoadedModel {
            self.unprobed.fetch_add(1, Ordering::SeqCst);
            Self::model(provider, tier)
        }

        fn rate_limit(&self, provider: ProviderId) -> Option<usize> {
            self.limits.get(&provider).copied()
        }
    }

    fn switcher(loader: ScriptedLoader) -> ModelSwitcher<ScriptedLoader> {
        ModelSwitcher::new(
            loader,
            TaskClassifier::default(),
            ProviderId::ALL.to_vec(),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_acquire_first_candidate() {
        let mut switcher = switcher(ScriptedLoader::default());
        assert_eq!(switcher.state(), SwitcherState::Uninitialized);

        let model = switcher.acquire("list files in Downloads").await;
        assert_eq!(model.provider, ProviderId::Groq);
        assert_eq!(model.tier, Tier::Small);
        assert_eq!(switcher.state(), SwitcherState::Active(ProviderId::Groq));
        assert!(matches!(
            switcher.drain_events().as_slice(),
            [SwitchEvent::Loaded { provider: ProviderId::Groq, .. }]
        ));
        assert!(switcher.drain_events().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_candidate_is_skipped_not_failed() {
        let loader = ScriptedLoader::default().limited(ProviderId::Groq, 0);
        let mut switcher = switcher(loader);

        let model = switcher.acquire("open firefox").await;
        assert_eq!(model.provider, ProviderId::Gemini);
        assert!(switcher.failed().is_empty());
        assert_eq!(
            switcher.drain_events()[0],
            SwitchEvent::RateLimited(ProviderId::Groq)
        );
    }

    #[tokio::test]
    async fn test_all_failed_falls_back_to_local() {
        let loader = ScriptedLoader::default()
            .failing(ProviderId::Groq)
            .failing(ProviderId::Gemini)
            .failing(ProviderId::Ollama);
        let unprobed = loader.unprobed.clone();
        let mut switcher = switcher(loader);

        let model = switcher.acquire("debug the crash").await;
        assert_eq!(model.provider, ProviderId::Ollama);
        assert_eq!(model.tier, Tier::Large);
        assert_eq!(switcher.state(), SwitcherState::Exhausted);
        assert_eq!(switcher.state().active_provider(), Some(ProviderId::Ollama));
        assert_eq!(unprobed.load(Ordering::SeqCst), 1);
        assert_eq!(switcher.failed().len(), 3);
    }

    #[tokio::test]
    async fn test_switch_moves_forward_and_never_revisits() {
        let loader = ScriptedLoader::default();
        let loads = loader.loads.clone();
        let mut switcher = switcher(loader);

        switcher.acquire("open firefox").await;
        let next = switcher.switch("429 from groq").await;
        assert_eq!(next.provider, ProviderId::Gemini);

        let next = switcher.switch("quota exceeded").await;
        assert_eq!(next.provider, ProviderId::Ollama);
        assert_eq!(switcher.state(), SwitcherState::Active(ProviderId::Ollama));

        // Wraps around but groq and gemini are failed: local fallback, no reloads.
        let before = loads.load(Ordering::SeqCst);
        let next = switcher.switch("local broke too").await;
        assert_eq!(next.provider, ProviderId::Ollama);
        assert_eq!(switcher.state(), SwitcherState::Exhausted);
        assert_eq!(loads.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_switch_wraps_to_earlier_provider() {
        let mut switcher = switcher(ScriptedLoader::default());
        switcher.switch_to(ProviderId::Gemini).await.unwrap();
        switcher.switch_to(ProviderId::Ollama).await.unwrap();

        let next = switcher.switch("local model crashed").await;
        assert_eq!(next.provider, ProviderId::Groq);
    }

    #[tokio::test]
    async fn test_switch_keeps_tier() {
        let mut switcher = switcher(ScriptedLoader::default());
        switcher.acquire("explain why this failed").await;
        let next = switcher.switch("rate limit").await;
        assert_eq!(next.tier, Tier::Large);
    }

    #[tokio::test]
    async fn test_explicit_switch_bypasses_failed_once() {
        let loader = ScriptedLoader::default().failing(ProviderId::Groq);
        let handle = loader.clone();
        let mut switcher = switcher(loader);

        switcher.acquire("open firefox").await;
        assert!(switcher.failed().contains(&ProviderId::Groq));
        assert_eq!(switcher.current().unwrap().provider, ProviderId::Gemini);

        // Still broken: the attempt is spent, gemini stays current.
        let err = switcher.switch_to(ProviderId::Groq).await.unwrap_err();
        assert!(matches!(err, SwitchError::Load(_)));
        assert_eq!(switcher.current().unwrap().provider, ProviderId::Gemini);

        handle.recover(ProviderId::Groq);
        let err = switcher.switch_to(ProviderId::Groq).await.unwrap_err();
        assert!(matches!(err, SwitchError::RetryExhausted(ProviderId::Groq)));
    }

    #[tokio::test]
    async fn test_explicit_switch_success_clears_failure() {
        let loader = ScriptedLoader::default().failing(ProviderId::Groq);
        let handle = loader.clone();
        let mut switcher = switcher(loader);

        switcher.acquire("open firefox").await;
        handle.recover(ProviderId::Groq);

        let model = switcher.switch_to(ProviderId::Groq).await.unwrap();
        assert_eq!(model.provider, ProviderId::Groq);
        assert!(!switcher.failed().contains(&ProviderId::Groq));
        assert_eq!(switcher.state(), SwitcherState::Active(ProviderId::Groq));
    }

    #[tokio::test]
    async fn test_failed_explicit_switch_without_current_acquires() {
        let loader = ScriptedLoader::default().failing(ProviderId::Gemini);
        let mut switcher = switcher(loader);

        let err = switcher.switch_to(ProviderId::Gemini).await.unwrap_err();
        assert!(matches!(err, SwitchError::Load(_)));
        assert_eq!(switcher.current().unwrap().provider, ProviderId::Groq);
    }

    #[tokio::test]
    async fn test_admit_current_respects_window() {
        let loader = ScriptedLoader::default().limited(ProviderId::Groq, 2);
        let mut switcher = switcher(loader);

        // The acquire itself uses one slot.
        switcher.acquire("open firefox").await;
        assert!(switcher.admit_current());
        assert!(!switcher.admit_current());
    }

    #[tokio::test]
    async fn test_ensure_loaded_reuses_current() {
        let loader = ScriptedLoader::default();
        let loads = loader.loads.clone();
        let mut switcher = switcher(loader);

        switcher.ensure_loaded("list files").await;
        switcher.ensure_loaded("debug everything").await;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(switcher.current().unwrap().tier, Tier::Small);
    }

    #[test]
    fn test_duplicate_order_entries_collapse() {
        let switcher = ModelSwitcher::new(
            ScriptedLoader::default(),
            TaskClassifier::default(),
            vec![ProviderId::Gemini, ProviderId::Gemini, ProviderId::Groq],
            Duration::from_secs(60),
        );
        assert_eq!(switcher.fallback_order(), &[ProviderId::Gemini, ProviderId::Groq]);
    }
}
