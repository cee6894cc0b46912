//! Validated, immutable orchestrator configuration.
//!
//! Built once from the raw [`AppConfig`] TOML schema; every name is parsed and
//! every pattern compiled here so that nothing is re-read per request.

use std::collections::BTreeMap;
use std::time::Duration;

use graphqna_shared::{AppConfig, Category, GraphQnaError, MethodId, Result};

use crate::evaluator::{AnswerEvaluator, GenericMatcher};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a single retrieval attempt.
    pub attempt_timeout: Duration,
    pub enabled_methods: Vec<MethodId>,
    /// Per-category replacements for the built-in plan table.
    pub plan_overrides: BTreeMap<Category, Vec<MethodId>>,
    pub generic_matchers: Vec<GenericMatcher>,
    pub min_context_items: usize,
    /// Methods exempt from the supporting-context rule.
    pub ungrounded_methods: Vec<MethodId>,
    /// `top_k` used when a question does not set one.
    pub default_top_k: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            enabled_methods: MethodId::ALL.to_vec(),
            plan_overrides: BTreeMap::new(),
            generic_matchers: AnswerEvaluator::default().matchers().to_vec(),
            min_context_items: 1,
            ungrounded_methods: Vec::new(),
            default_top_k: 5,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_enabled(mut self, methods: &[MethodId]) -> Self {
        self.enabled_methods = methods.to_vec();
        self
    }

    pub fn with_plan(mut self, category: Category, methods: &[MethodId]) -> Self {
        self.plan_overrides.insert(category, methods.to_vec());
        self
    }

    pub fn with_matchers(mut self, matchers: Vec<GenericMatcher>) -> Self {
        self.generic_matchers = matchers;
        self
    }

    /// Evaluator described by this configuration.
    pub fn evaluator(&self) -> AnswerEvaluator {
        AnswerEvaluator::new(self.generic_matchers.clone())
            .with_min_context_items(self.min_context_items)
            .with_ungrounded(self.ungrounded_methods.iter().copied())
    }
}

impl TryFrom<&AppConfig> for OrchestratorConfig {
    type Error = GraphQnaError;

    fn try_from(app: &AppConfig) -> Result<Self> {
        let section = &app.orchestrator;
        if section.attempt_timeout_ms == 0 {
            return Err(GraphQnaError::config(
                "orchestrator.attempt_timeout_ms must be greater than zero",
            ));
        }
        if app.defaults.top_k == 0 {
            return Err(GraphQnaError::config("defaults.top_k must be greater than zero"));
        }

        let mut plan_overrides = BTreeMap::new();
        for (label, names) in &section.plans {
            let category = Category::from_label(label).ok_or_else(|| {
                GraphQnaError::config(format!("unknown category '{label}' in orchestrator.plans"))
            })?;
            plan_overrides.insert(category, parse_methods(names)?);
        }

        let generic_matchers = app
            .evaluator
            .generic_patterns
            .iter()
            .map(GenericMatcher::from_spec)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            attempt_timeout: Duration::from_millis(section.attempt_timeout_ms),
            enabled_methods: parse_methods(&section.enabled_methods)?,
            plan_overrides,
            generic_matchers,
            min_context_items: section.min_context_items,
            ungrounded_methods: parse_methods(&section.ungrounded_methods)?,
            default_top_k: app.defaults.top_k,
        })
    }
}

fn parse_methods(names: &[String]) -> Result<Vec<MethodId>> {
    names.iter().map(|name| name.parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_app_defaults() {
        let from_app = OrchestratorConfig::try_from(&AppConfig::default()).unwrap();
        let built_in = OrchestratorConfig::default();
        assert_eq!(from_app.attempt_timeout, built_in.attempt_timeout);
        assert_eq!(from_app.enabled_methods, built_in.enabled_methods);
        assert_eq!(from_app.generic_matchers.len(), built_in.generic_matchers.len());
        assert_eq!(from_app.default_top_k, 5);
        assert!(from_app.plan_overrides.is_empty());
    }

    #[test]
    fn parses_names_and_aliases() {
        let mut app = AppConfig::default();
        app.orchestrator.enabled_methods = vec!["vector".into(), "graphrag".into(), "kg".into()];
        app.orchestrator.ungrounded_methods = vec!["graph_enhanced".into()];
        app.orchestrator
            .plans
            .insert("Entity".into(), vec!["kg".into(), "vector".into()]);

        let config = OrchestratorConfig::try_from(&app).unwrap();
        assert_eq!(
            config.enabled_methods,
            vec![MethodId::Vector, MethodId::GraphEnhanced, MethodId::KnowledgeGraph]
        );
        assert_eq!(config.ungrounded_methods, vec![MethodId::GraphEnhanced]);
        assert_eq!(
            config.plan_overrides[&Category::Entity],
            vec![MethodId::KnowledgeGraph, MethodId::Vector]
        );
    }

    #[test]
    fn fixture_resolves() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/config/graphqna.fixture.toml");
        let app = graphqna_shared::load_config_from(&path).unwrap();
        let config = OrchestratorConfig::try_from(&app).unwrap();

        assert_eq!(config.attempt_timeout, Duration::from_secs(20));
        assert_eq!(config.default_top_k, 8);
        assert_eq!(config.generic_matchers.len(), 3);
        assert_eq!(
            config.plan_overrides[&Category::Procedural],
            vec![MethodId::GraphEnhanced, MethodId::Vector, MethodId::KnowledgeGraph]
        );
        assert!(
            config
                .evaluator()
                .evaluate(Some("No relevant results."), &[], MethodId::Vector)
                .reason
                .is_some()
        );
    }

    #[test]
    fn bad_values_are_config_errors() {
        let mut app = AppConfig::default();
        app.orchestrator.enabled_methods = vec!["bm25".into()];
        assert!(OrchestratorConfig::try_from(&app).unwrap_err().is_config());

        let mut app = AppConfig::default();
        app.orchestrator.plans.insert("opinion".into(), vec!["vector".into()]);
        let err = OrchestratorConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("opinion"));

        let mut app = AppConfig::default();
        app.orchestrator.attempt_timeout_ms = 0;
        assert!(OrchestratorConfig::try_from(&app).is_err());

        let mut app = AppConfig::default();
        app.evaluator.generic_patterns.push(graphqna_shared::PatternSpec {
            kind: graphqna_shared::PatternKind::Regex,
            pattern: "([".into(),
        });
        assert!(OrchestratorConfig::try_from(&app).unwrap_err().is_config());
    }
}
