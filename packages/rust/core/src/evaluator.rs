//! Generic-answer evaluator.
//!
//! A cheap structural gate applied after every attempt. It does no semantic
//! judgment: an answer is rejected when retrieval failed, when it is blank,
//! when it matches one of the configured refusal matchers, or when it is not
//! backed by enough supporting context. The first rule that fires wins.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;

use graphqna_shared::{
    ContextItem, GraphQnaError, MethodId, PatternKind, PatternSpec, RejectReason, Result,
};

/// One "this answer is a refusal" test.
///
/// Phrase matchers are stored lowercased and trimmed and compare against the
/// lowercased, trimmed answer.
#[derive(Clone)]
pub enum GenericMatcher {
    Contains(String),
    Prefix(String),
    Exact(String),
    Pattern(Regex),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl GenericMatcher {
    pub fn contains(phrase: &str) -> Self {
        Self::Contains(normalize(phrase))
    }

    pub fn prefix(phrase: &str) -> Self {
        Self::Prefix(normalize(phrase))
    }

    pub fn exact(phrase: &str) -> Self {
        Self::Exact(normalize(phrase))
    }

    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Compile a configured pattern. Invalid regexes are configuration errors.
    pub fn from_spec(spec: &PatternSpec) -> Result<Self> {
        if spec.pattern.trim().is_empty() {
            return Err(GraphQnaError::config("generic pattern must not be empty"));
        }
        Ok(match spec.kind {
            PatternKind::Contains => Self::contains(&spec.pattern),
            PatternKind::Prefix => Self::prefix(&spec.pattern),
            PatternKind::Exact => Self::exact(&spec.pattern),
            PatternKind::Regex => Self::Pattern(Regex::new(&spec.pattern).map_err(|e| {
                GraphQnaError::config(format!("invalid generic pattern '{}': {e}", spec.pattern))
            })?),
        })
    }

    pub fn matches(&self, answer: &str) -> bool {
        match self {
            Self::Contains(phrase) => normalize(answer).contains(phrase.as_str()),
            Self::Prefix(phrase) => normalize(answer).starts_with(phrase.as_str()),
            Self::Exact(phrase) => normalize(answer) == *phrase,
            Self::Pattern(re) => re.is_match(answer.trim()),
            Self::Predicate(f) => f(answer),
        }
    }
}

impl std::fmt::Debug for GenericMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contains(p) => f.debug_tuple("Contains").field(p).finish(),
            Self::Prefix(p) => f.debug_tuple("Prefix").field(p).finish(),
            Self::Exact(p) => f.debug_tuple("Exact").field(p).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Outcome of evaluating one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub acceptable: bool,
    pub reason: Option<RejectReason>,
}

impl Verdict {
    pub fn accept() -> Self {
        Self {
            acceptable: true,
            reason: None,
        }
    }

    pub fn reject(reason: RejectReason) -> Self {
        Self {
            acceptable: false,
            reason: Some(reason),
        }
    }
}

/// Decides whether an attempt's answer is good enough to stop the fallback chain.
#[derive(Debug, Clone)]
pub struct AnswerEvaluator {
    matchers: Vec<GenericMatcher>,
    min_context_items: usize,
    ungrounded: HashSet<MethodId>,
}

impl AnswerEvaluator {
    pub fn new(matchers: Vec<GenericMatcher>) -> Self {
        Self {
            matchers,
            min_context_items: 1,
            ungrounded: HashSet::new(),
        }
    }

    /// Number of substantive context items a grounded method must return.
    /// Zero disables the grounding rule entirely.
    pub fn with_min_context_items(mut self, min: usize) -> Self {
        self.min_context_items = min;
        self
    }

    /// Methods that answer without retrieved context (pure generation).
    pub fn with_ungrounded(mut self, methods: impl IntoIterator<Item = MethodId>) -> Self {
        self.ungrounded.extend(methods);
        self
    }

    pub fn matchers(&self) -> &[GenericMatcher] {
        &self.matchers
    }

    /// Evaluate an attempt. `answer` is `None` when retrieval failed upstream.
    pub fn evaluate(
        &self,
        answer: Option<&str>,
        context: &[ContextItem],
        method: MethodId,
    ) -> Verdict {
        let Some(answer) = answer else {
            return Verdict::reject(RejectReason::RetrievalFailed);
        };
        if answer.trim().is_empty() {
            return Verdict::reject(RejectReason::EmptyAnswer);
        }
        if self.matchers.iter().any(|m| m.matches(answer)) {
            return Verdict::reject(RejectReason::GenericAnswer);
        }
        if !self.ungrounded.contains(&method) {
            let substantive = context.iter().filter(|c| c.is_substantive()).count();
            if substantive < self.min_context_items {
                return Verdict::reject(RejectReason::NoSupportingContext);
            }
        }
        Verdict::accept()
    }
}

impl Default for AnswerEvaluator {
    /// The built-in refusal phrasings, one substantive context item required.
    fn default() -> Self {
        let matchers = graphqna_shared::EvaluatorConfig::default()
            .generic_patterns
            .iter()
            .filter_map(|spec| GenericMatcher::from_spec(spec).ok())
            .collect();
        Self::new(matchers)
    }
}
