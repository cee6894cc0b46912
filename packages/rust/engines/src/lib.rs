//! Network collaborators for the orchestrator.
//!
//! The core crate only knows the [`RetrievalEngine`](graphqna_core::RetrievalEngine)
//! and [`TextClassifier`](graphqna_core::TextClassifier) contracts. This crate
//! provides the HTTP-backed implementations and wires them up from
//! `graphqna.toml`.

mod http;
mod llm;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use graphqna_core::{MethodRegistry, Orchestrator, OrchestratorConfig, QueryClassifier};
use graphqna_shared::{AppConfig, ClassifierMode, GraphQnaError, MethodId, Result, validate_api_key};

pub use http::HttpRetrievalEngine;
pub use llm::LlmClassifier;

/// Default HTTP timeout in seconds when an engine sets none.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User-Agent string for outgoing requests.
const USER_AGENT: &str = concat!("GraphQnA/", env!("CARGO_PKG_VERSION"));

/// Register an HTTP engine for every enabled method listed under `[engines]`.
///
/// Engines for disabled methods are skipped. Two entries naming the same
/// method (e.g. `kg` and `knowledge_graph`) are a configuration error.
pub fn build_registry(config: &AppConfig) -> Result<MethodRegistry> {
    let enabled = config
        .orchestrator
        .enabled_methods
        .iter()
        .map(|name| name.parse())
        .collect::<Result<Vec<MethodId>>>()?;

    let mut registry = MethodRegistry::new();
    for (name, endpoint) in &config.engines {
        let method: MethodId = name.parse()?;
        if registry.contains(method) {
            return Err(GraphQnaError::config(format!(
                "engine for '{method}' is configured more than once"
            )));
        }
        if !enabled.contains(&method) {
            debug!(%method, "skipping engine for disabled method");
            continue;
        }
        let engine = HttpRetrievalEngine::new(method, endpoint)?;
        debug!(%method, url = %engine.search_url(), "registered engine");
        registry = registry.with(method, Arc::new(engine));
    }
    Ok(registry)
}

/// Classifier for the configured `[classifier]` mode.
///
/// LLM mode without an API key degrades to keyword rules with a warning.
pub fn build_classifier(config: &AppConfig) -> Result<QueryClassifier> {
    let timeout = Duration::from_millis(config.classifier.timeout_ms);
    match config.classifier.mode {
        ClassifierMode::Keywords => Ok(QueryClassifier::keywords()),
        ClassifierMode::Off => Ok(QueryClassifier::disabled()),
        ClassifierMode::Llm => match validate_api_key(config) {
            Ok(api_key) => {
                let llm =
                    LlmClassifier::new(&config.llm, api_key, &config.defaults.domain_name, timeout)?;
                Ok(QueryClassifier::llm(Arc::new(llm), timeout))
            }
            Err(e) => {
                warn!(error = %e, "falling back to keyword classification");
                Ok(QueryClassifier::keywords())
            }
        },
    }
}

/// Validate `config` and build a ready-to-use orchestrator.
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    let orchestrator_config = OrchestratorConfig::try_from(config)?;
    Orchestrator::new(
        orchestrator_config,
        build_registry(config)?,
        build_classifier(config)?,
    )
}
