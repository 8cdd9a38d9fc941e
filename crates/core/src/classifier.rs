use deskpilot_providers::tiers::{COMPLEX_KEYWORDS, MULTISTEP_KEYWORDS, SIMPLE_KEYWORDS};
use deskpilot_providers::Tier;

const SHORT_QUERY_WORDS: usize = 10;

/// Picks a model tier from the wording of a request.
///
/// Checks run in a fixed order: short simple queries first, then complex
/// keywords, then multi-step keywords, then the default. A short status
/// question that happens to mention "error" still lands on the small tier.
#[derive(Debug, Clone, Copy)]
pub struct TaskClassifier {
    default_tier: Tier,
    smart_selection: bool,
}

impl TaskClassifier {
    pub fn new(default_tier: Tier, smart_selection: bool) -> Self {
        Self {
            default_tier,
            smart_selection,
        }
    }

    pub fn default_tier(&self) -> Tier {
        self.default_tier
    }

    pub fn classify(&self, query: &str) -> Tier {
        if !self.smart_selection {
            return self.default_tier;
        }

        let lowered = query.to_lowercase();
        let mentions = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));

        if mentions(SIMPLE_KEYWORDS) && query.split_whitespace().count() < SHORT_QUERY_WORDS {
            Tier::Small
        } else if mentions(COMPLEX_KEYWORDS) {
            Tier::Large
        } else if mentions(MULTISTEP_KEYWORDS) {
            Tier::Medium
        } else {
            self.default_tier
        }
    }
}

impl Default for TaskClassifier {
    fn default() -> Self {
        Self::new(Tier::Medium, true)
    }
}
