//! Method capability registry.
//!
//! One adapter per [`MethodId`], each wrapping an external retrieval engine
//! behind the same "answer this question" contract. The method set is closed,
//! so the registry is a fixed table indexed by method rather than an open
//! list. It is built once at startup and only read afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use graphqna_shared::{ContextItem, MethodId, QueryOptions, Question, Result};

// ---------------------------------------------------------------------------
// Engine contract
// ---------------------------------------------------------------------------

/// An answer plus the context it was grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineAnswer {
    pub answer: String,
    pub context: Vec<ContextItem>,
}

/// An external retrieval engine (vector search, graph traversal, query generation).
#[async_trait]
pub trait RetrievalEngine: Send + Sync {
    /// Answer `question`, returning the answer text and its supporting context.
    async fn search(&self, question: &str, options: &QueryOptions) -> Result<EngineAnswer>;

    /// Human-readable engine name for tracing.
    fn name(&self) -> &str;
}

/// Normalized per-attempt failure. Whatever went wrong upstream is reduced to
/// a diagnostic string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalFailure {
    pub reason: String,
}

impl std::fmt::Display for RetrievalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "retrieval failed: {}", self.reason)
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Binds an engine to the method it implements.
#[derive(Clone)]
pub struct MethodAdapter {
    method: MethodId,
    engine: Arc<dyn RetrievalEngine>,
}

impl MethodAdapter {
    pub fn new(method: MethodId, engine: Arc<dyn RetrievalEngine>) -> Self {
        Self { method, engine }
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Run the engine, folding every error into a [`RetrievalFailure`].
    pub async fn invoke(
        &self,
        question: &Question,
    ) -> std::result::Result<EngineAnswer, RetrievalFailure> {
        debug!(method = %self.method, engine = self.engine.name(), "invoking engine");
        self.engine
            .search(&question.text, &question.options)
            .await
            .map_err(|e| RetrievalFailure {
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Debug for MethodAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodAdapter")
            .field("method", &self.method)
            .field("engine", &self.engine.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Adapter table keyed by [`MethodId`].
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    adapters: [Option<MethodAdapter>; 4],
}

impl MethodRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the engine for `method`.
    pub fn with(mut self, method: MethodId, engine: Arc<dyn RetrievalEngine>) -> Self {
        self.adapters[method.index()] = Some(MethodAdapter::new(method, engine));
        self
    }

    pub fn get(&self, method: MethodId) -> Option<&MethodAdapter> {
        self.adapters[method.index()].as_ref()
    }

    pub fn contains(&self, method: MethodId) -> bool {
        self.get(method).is_some()
    }

    /// Registered methods, in [`MethodId::ALL`] order.
    pub fn methods(&self) -> Vec<MethodId> {
        MethodId::ALL
            .into_iter()
            .filter(|m| self.contains(*m))
            .collect()
    }

    /// Invoke the adapter for `method`.
    pub async fn invoke(
        &self,
        method: MethodId,
        question: &Question,
    ) -> std::result::Result<EngineAnswer, RetrievalFailure> {
        match self.get(method) {
            Some(adapter) => adapter.invoke(question).await,
            None => Err(RetrievalFailure {
                reason: format!("no engine registered for '{method}'"),
            }),
        }
    }
}
