//! Question classification.
//!
//! Classification is a best-effort hint for plan selection: every input maps
//! to exactly one [`Category`], and anything inconclusive (empty input, no
//! rule match, an unparseable or failed LLM call) becomes
//! [`Category::Unknown`].

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use graphqna_shared::{Category, Result};

/// Labels checked, in order, when reading a free-form LLM reply.
const REPLY_LABEL_ORDER: [Category; 4] = [
    Category::Factual,
    Category::Procedural,
    Category::Entity,
    Category::Relationship,
];

static RELATIONSHIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(relationships?|related to|relate to|connected to|connection between|between \w+(?: \w+)? and|which roles?|who can|who is responsible|depends? on|dependenc(?:y|ies))\b",
    )
    .expect("relationship regex is valid")
});
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(what (?:types|kinds|features|entities|fields)|which (?:features|types|kinds|entities)|list|attributes?|properties of|\w+ (?:are|is) available)\b",
    )
    .expect("entity regex is valid")
});
static PROCEDURAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(^how (?:do|to|can|should|would)\b|\bhow (?:do|can|should) (?:i|we|you)\b|\bsteps? (?:to|for)\b|\bwhat are the steps\b|\bwalk me through\b|\b(?:configure|set up|install)\b)",
    )
    .expect("procedural regex is valid")
});
static FACTUAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(what (?:is|are|was|does)|who (?:is|was)|when|where|why|define|explain|describe)\b")
        .expect("factual regex is valid")
});

// ---------------------------------------------------------------------------
// External classification capability
// ---------------------------------------------------------------------------

/// An external text classifier, typically backed by a language model.
///
/// Returns a free-form label; the classifier maps it onto a [`Category`].
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Classify the question text into a category label.
    async fn classify_text(&self, text: &str) -> Result<String>;

    /// Human-readable name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// QueryClassifier
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Strategy {
    Keywords,
    Llm {
        capability: Arc<dyn TextClassifier>,
        timeout: Duration,
    },
    Off,
}

/// Assigns each question to exactly one [`Category`].
#[derive(Clone)]
pub struct QueryClassifier {
    strategy: Strategy,
}

impl QueryClassifier {
    /// Deterministic keyword rules.
    pub fn keywords() -> Self {
        Self {
            strategy: Strategy::Keywords,
        }
    }

    /// Delegate to an external classifier, bounded by `timeout`.
    pub fn llm(capability: Arc<dyn TextClassifier>, timeout: Duration) -> Self {
        Self {
            strategy: Strategy::Llm {
                capability,
                timeout,
            },
        }
    }

    /// Classification disabled: every question is `Unknown`.
    pub fn disabled() -> Self {
        Self {
            strategy: Strategy::Off,
        }
    }

    /// Short description of the active strategy.
    pub fn describe(&self) -> String {
        match &self.strategy {
            Strategy::Keywords => "keywords".into(),
            Strategy::Llm { capability, .. } => format!("llm ({})", capability.name()),
            Strategy::Off => "off".into(),
        }
    }

    /// Classify a question. Never fails.
    pub async fn classify(&self, text: &str) -> Category {
        if text.trim().is_empty() {
            return Category::Unknown;
        }

        match &self.strategy {
            Strategy::Keywords => keyword_category(text),
            Strategy::Off => Category::Unknown,
            Strategy::Llm {
                capability,
                timeout,
            } => match tokio::time::timeout(*timeout, capability.classify_text(text)).await {
                Ok(Ok(reply)) => {
                    let category = category_from_reply(&reply);
                    debug!(classifier = capability.name(), %reply, %category, "llm classification");
                    category
                }
                Ok(Err(e)) => {
                    warn!(classifier = capability.name(), error = %e, "classification failed, using unknown");
                    Category::Unknown
                }
                Err(_) => {
                    warn!(
                        classifier = capability.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "classification timed out, using unknown"
                    );
                    Category::Unknown
                }
            },
        }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::keywords()
    }
}

impl std::fmt::Debug for QueryClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClassifier")
            .field("strategy", &self.describe())
            .finish()
    }
}

/// Keyword rules. Relationship wins over entity, entity over procedural,
/// procedural over factual.
pub fn keyword_category(text: &str) -> Category {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return Category::Unknown;
    }

    if RELATIONSHIP_RE.is_match(&normalized) {
        Category::Relationship
    } else if ENTITY_RE.is_match(&normalized) {
        Category::Entity
    } else if PROCEDURAL_RE.is_match(&normalized) {
        Category::Procedural
    } else if FACTUAL_RE.is_match(&normalized) {
        Category::Factual
    } else {
        Category::Unknown
    }
}

/// Map a free-form reply onto a category: an exact label first, then the
/// first known label mentioned anywhere in the reply.
pub fn category_from_reply(reply: &str) -> Category {
    if let Some(category) = Category::from_label(reply) {
        return category;
    }
    let reply = reply.to_lowercase();
    REPLY_LABEL_ORDER
        .into_iter()
        .find(|category| reply.contains(category.as_str()))
        .unwrap_or(Category::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubClassifier;

    #[test]
    fn keyword_rules() {
        assert_eq!(keyword_category("What is Hero?"), Category::Factual);
        assert_eq!(keyword_category("Explain deal scoring"), Category::Factual);
        assert_eq!(keyword_category("How do I create a report?"), Category::Procedural);
        assert_eq!(
            keyword_category("What are the steps to configure SSO?"),
            Category::Procedural
        );
        assert_eq!(keyword_category("What features are available?"), Category::Entity);
        assert_eq!(keyword_category("List all activity types"), Category::Entity);
        assert_eq!(
            keyword_category("Which roles can perform a handoff?"),
            Category::Relationship
        );
        assert_eq!(
            keyword_category("What is the relationship between deals and accounts?"),
            Category::Relationship
        );
    }

    #[test]
    fn inconclusive_is_unknown() {
        assert_eq!(keyword_category(""), Category::Unknown);
        assert_eq!(keyword_category("   "), Category::Unknown);
        assert_eq!(keyword_category("hello there"), Category::Unknown);
    }

    #[test]
    fn reply_parsing() {
        assert_eq!(category_from_reply("Entity"), Category::Entity);
        assert_eq!(category_from_reply("  relationship\n"), Category::Relationship);
        assert_eq!(
            category_from_reply("Classification: procedural."),
            Category::Procedural
        );
        assert_eq!(category_from_reply("unknown"), Category::Unknown);
        assert_eq!(category_from_reply("I cannot tell"), Category::Unknown);
    }

    #[tokio::test]
    async fn llm_label_is_used() {
        let classifier = QueryClassifier::llm(
            Arc::new(StubClassifier::label("relationship")),
            Duration::from_secs(1),
        );
        assert_eq!(
            classifier.classify("Who approves a discount?").await,
            Category::Relationship
        );
    }

    #[tokio::test]
    async fn llm_failure_is_unknown() {
        let classifier = QueryClassifier::llm(
            Arc::new(StubClassifier::failing("rate limited")),
            Duration::from_secs(1),
        );
        assert_eq!(classifier.classify("What is Hero?").await, Category::Unknown);
    }

    #[tokio::test]
    async fn llm_timeout_is_unknown() {
        let classifier = QueryClassifier::llm(
            Arc::new(StubClassifier::slow("entity", Duration::from_secs(5))),
            Duration::from_millis(20),
        );
        assert_eq!(classifier.classify("List features").await, Category::Unknown);
    }

    #[tokio::test]
    async fn empty_question_skips_llm() {
        let stub = Arc::new(StubClassifier::label("entity"));
        let classifier = QueryClassifier::llm(stub.clone(), Duration::from_secs(1));
        assert_eq!(classifier.classify("  ").await, Category::Unknown);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn disabled_is_always_unknown() {
        let classifier = QueryClassifier::disabled();
        assert_eq!(classifier.classify("What is Hero?").await, Category::Unknown);
        assert_eq!(classifier.describe(), "off");
    }
}
