//! Core domain types for GraphQnA question answering.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GraphQnaError, Result};

/// Disclaimer prepended to degraded answers by [`OrchestrationResult::presentable`].
pub const DEGRADED_DISCLAIMER: &str = "I'm not entirely sure about this, but here's what I found:";

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one orchestration run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a new time-sortable request identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MethodId
// ---------------------------------------------------------------------------

/// Identity of one retrieval strategy. Used as the registry key and in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodId {
    /// Vector similarity search over document chunks.
    Vector,
    /// Vector search expanded with graph traversal around the hits.
    #[serde(alias = "graphrag")]
    GraphEnhanced,
    /// Direct query generation against the knowledge graph.
    #[serde(alias = "kg")]
    KnowledgeGraph,
    /// Query generation guided by the discovered graph schema.
    #[serde(rename = "schema_guided_kg", alias = "enhanced_kg")]
    SchemaGuidedKnowledgeGraph,
}

impl MethodId {
    /// Every method, in declaration order.
    pub const ALL: [MethodId; 4] = [
        Self::Vector,
        Self::GraphEnhanced,
        Self::KnowledgeGraph,
        Self::SchemaGuidedKnowledgeGraph,
    ];

    /// Canonical snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::GraphEnhanced => "graph_enhanced",
            Self::KnowledgeGraph => "knowledge_graph",
            Self::SchemaGuidedKnowledgeGraph => "schema_guided_kg",
        }
    }

    /// Dense index for table-based lookups.
    pub fn index(&self) -> usize {
        match self {
            Self::Vector => 0,
            Self::GraphEnhanced => 1,
            Self::KnowledgeGraph => 2,
            Self::SchemaGuidedKnowledgeGraph => 3,
        }
    }
}

impl std::fmt::Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MethodId {
    type Err = GraphQnaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "graph_enhanced" | "graphrag" => Ok(Self::GraphEnhanced),
            "knowledge_graph" | "kg" => Ok(Self::KnowledgeGraph),
            "schema_guided_kg" | "enhanced_kg" => Ok(Self::SchemaGuidedKnowledgeGraph),
            _ => Err(GraphQnaError::config(format!(
                "unknown retrieval method '{s}': expected one of vector, graph_enhanced, \
                 knowledge_graph, schema_guided_kg"
            ))),
        }
    }
}

/// Parse a caller-supplied method override.
///
/// `hybrid` and `auto` mean "no override". Anything that is not a known
/// method is a configuration error.
pub fn parse_method_override(raw: &str) -> Result<Option<MethodId>> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "hybrid" | "auto" => Ok(None),
        _ => raw.parse().map(Some),
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Semantic category of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Factual,
    Procedural,
    Entity,
    Relationship,
    Unknown,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 5] = [
        Self::Factual,
        Self::Procedural,
        Self::Entity,
        Self::Relationship,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Procedural => "procedural",
            Self::Entity => "entity",
            Self::Relationship => "relationship",
            Self::Unknown => "unknown",
        }
    }

    /// Exact (case-insensitive) label lookup.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RetrievalPlan
// ---------------------------------------------------------------------------

/// Ordered, non-empty, duplicate-free sequence of methods to attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RetrievalPlan(Vec<MethodId>);

impl RetrievalPlan {
    /// Build a plan, rejecting empty or repeating sequences.
    pub fn new(methods: Vec<MethodId>) -> Result<Self> {
        if methods.is_empty() {
            return Err(GraphQnaError::config("retrieval plan must contain at least one method"));
        }
        let mut seen = HashSet::new();
        for method in &methods {
            if !seen.insert(*method) {
                return Err(GraphQnaError::config(format!(
                    "retrieval plan lists '{method}' more than once"
                )));
            }
        }
        Ok(Self(methods))
    }

    /// A single-method plan with no fallback.
    pub fn single(method: MethodId) -> Self {
        Self(vec![method])
    }

    pub fn methods(&self) -> &[MethodId] {
        &self.0
    }

    pub fn primary(&self) -> MethodId {
        self.0[0]
    }

    pub fn fallbacks(&self) -> &[MethodId] {
        &self.0[1..]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a constructed plan.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, method: MethodId) -> bool {
        self.0.contains(&method)
    }
}

impl std::fmt::Display for RetrievalPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.0.iter().map(MethodId::as_str).collect();
        f.write_str(&names.join(" → "))
    }
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// Caller-supplied per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Number of results the engines should retrieve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Whether the caller wants context items rendered.
    #[serde(default)]
    pub include_context: bool,
}

/// One incoming question. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Raw question text.
    pub text: String,
    /// Explicit method override, as supplied (validated by the orchestrator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_override: Option<String>,
    #[serde(default)]
    pub options: QueryOptions,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            method_override: None,
            options: QueryOptions::default(),
        }
    }

    pub fn with_override(mut self, method: impl Into<String>) -> Self {
        self.method_override = Some(method.into());
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.options.top_k = Some(top_k);
        self
    }
}

// ---------------------------------------------------------------------------
// Context items
// ---------------------------------------------------------------------------

/// Where a context item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    /// A source passage (document chunk).
    #[default]
    Passage,
    /// A row returned by a graph query.
    GraphRow,
}

/// One piece of supporting context returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    #[serde(default)]
    pub kind: ContextKind,
    /// Passage text or rendered graph row.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Document or query the item was drawn from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ContextItem {
    pub fn passage(content: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::Passage,
            content: content.into(),
            score: None,
            source: None,
        }
    }

    pub fn graph_row(content: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::GraphRow,
            content: content.into(),
            score: None,
            source: None,
        }
    }

    /// Whether the item carries any content at all. Graph rows whose values
    /// are all empty render to blank content and do not count.
    pub fn is_substantive(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Attempts and results
// ---------------------------------------------------------------------------

/// Why an attempt was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    RetrievalFailed,
    Timeout,
    EmptyAnswer,
    GenericAnswer,
    NoSupportingContext,
    Cancelled,
}

impl RejectReason {
    /// Stable reason code used in traces.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetrievalFailed => "retrieval_failed",
            Self::Timeout => "timeout",
            Self::EmptyAnswer => "empty_answer",
            Self::GenericAnswer => "generic_answer",
            Self::NoSupportingContext => "no_supporting_context",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log of one retrieval attempt and its verdict. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub method: MethodId,
    /// Raw answer text; `None` when retrieval failed upstream.
    pub answer: Option<String>,
    #[serde(default)]
    pub context: Vec<ContextItem>,
    pub acceptable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Upstream diagnostic for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub elapsed_ms: u64,
}

/// Terminal state of an orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// An attempt passed the evaluator.
    Accepted,
    /// Every planned method was rejected; the last answer is returned best-effort.
    Exhausted,
    /// The caller aborted the run.
    Cancelled,
}

/// Terminal output of one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub request_id: RequestId,
    pub question: String,
    /// `None` when an explicit override bypassed classification.
    pub category: Option<Category>,
    pub plan: Vec<MethodId>,
    /// Final answer text (empty when cancelled, or when the last attempt had none).
    pub answer: String,
    /// Method that produced an accepted answer; `None` otherwise.
    pub selected_method: Option<MethodId>,
    /// Every attempt, in the order tried.
    pub attempts: Vec<AttemptRecord>,
    /// Set when no attempt was acceptable and the answer is best-effort.
    pub degraded: bool,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl OrchestrationResult {
    pub fn is_cancelled(&self) -> bool {
        self.outcome == Outcome::Cancelled
    }

    /// The answer as a chat front end would show it: degraded answers get a
    /// disclaimer, cancelled runs have nothing to show.
    pub fn presentable(&self) -> Option<String> {
        match self.outcome {
            Outcome::Accepted => Some(self.answer.clone()),
            Outcome::Exhausted if !self.answer.trim().is_empty() => {
                Some(format!("{DEGRADED_DISCLAIMER}\n\n{}", self.answer))
            }
            Outcome::Exhausted | Outcome::Cancelled => None,
        }
    }
}
