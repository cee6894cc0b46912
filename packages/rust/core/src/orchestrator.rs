//! Orchestrator façade: classify → select a plan → walk it with fallback.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};

use graphqna_shared::{
    Category, GraphQnaError, MethodId, OrchestrationResult, Outcome, Question, RequestId, Result,
    RetrievalPlan, parse_method_override,
};

use crate::cancel::CancellationToken;
use crate::classifier::QueryClassifier;
use crate::config::OrchestratorConfig;
use crate::fallback::FallbackController;
use crate::progress::{ProgressReporter, SilentProgress};
use crate::registry::MethodRegistry;
use crate::selector::MethodSelector;

/// Entry point for answering questions.
///
/// Cheap to clone; clones share the read-only registry and plan table, so one
/// instance can serve many concurrent runs.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: OrchestratorConfig,
    selector: MethodSelector,
    classifier: QueryClassifier,
    controller: FallbackController,
    registry: Arc<MethodRegistry>,
}

impl Orchestrator {
    /// Validate the configuration against the registry and build the plan table.
    ///
    /// Fails with a configuration error if no method is enabled, a plan is
    /// malformed, or an enabled method has no registered engine.
    pub fn new(
        config: OrchestratorConfig,
        registry: MethodRegistry,
        classifier: QueryClassifier,
    ) -> Result<Self> {
        let selector = MethodSelector::new(&config.plan_overrides, &config.enabled_methods)?;
        if let Some(missing) = selector.enabled().find(|m| !registry.contains(*m)) {
            return Err(GraphQnaError::config(format!(
                "retrieval method '{missing}' is enabled but has no registered engine"
            )));
        }

        let registry = Arc::new(registry);
        let controller = FallbackController::new(
            registry.clone(),
            Arc::new(config.evaluator()),
            config.attempt_timeout,
        );

        info!(
            methods = ?selector.enabled().collect::<Vec<_>>(),
            classifier = %classifier.describe(),
            timeout_ms = config.attempt_timeout.as_millis() as u64,
            "orchestrator ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                selector,
                classifier,
                controller,
                registry,
            }),
        })
    }

    /// Answer a question. Errors only on misconfiguration (such as an
    /// unknown override); every retrieval problem ends up in the result.
    pub async fn orchestrate(&self, question: &Question) -> Result<OrchestrationResult> {
        self.orchestrate_with(question, &CancellationToken::new(), &SilentProgress)
            .await
    }

    /// Like [`orchestrate`](Self::orchestrate), aborting when `cancel` fires.
    pub async fn orchestrate_with_cancel(
        &self,
        question: &Question,
        cancel: &CancellationToken,
    ) -> Result<OrchestrationResult> {
        self.orchestrate_with(question, cancel, &SilentProgress).await
    }

    /// Full form: cancellation plus a progress observer.
    pub async fn orchestrate_with(
        &self,
        question: &Question,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<OrchestrationResult> {
        self.run(RequestId::new(), question, cancel, progress).await
    }

    #[instrument(skip_all, fields(request_id = %request_id))]
    async fn run(
        &self,
        request_id: RequestId,
        question: &Question,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<OrchestrationResult> {
        let started_at = Utc::now();
        let started = Instant::now();
        let inner = &self.inner;

        // Resolved before classification so a bad override never costs an LLM call.
        let method_override = match question.method_override.as_deref() {
            Some(raw) => parse_method_override(raw)?,
            None => None,
        };

        let (category, plan) = match method_override {
            Some(method) => (None, inner.selector.select(Category::Unknown, Some(method))?),
            None => {
                let category = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    category = inner.classifier.classify(&question.text) => Some(category),
                };
                let Some(category) = category else {
                    info!("cancelled during classification");
                    return Ok(OrchestrationResult {
                        request_id,
                        question: question.text.clone(),
                        category: None,
                        plan: Vec::new(),
                        answer: String::new(),
                        selected_method: None,
                        attempts: Vec::new(),
                        degraded: false,
                        outcome: Outcome::Cancelled,
                        started_at,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                };
                (Some(category), inner.selector.select(category, None)?)
            }
        };
        info!(category = ?category, %plan, "plan selected");
        progress.planned(category, &plan);

        let mut question = question.clone();
        question.options.top_k = question.options.top_k.or(Some(inner.config.default_top_k));

        let outcome = inner.controller.run(&plan, &question, cancel, progress).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            outcome = ?outcome.outcome,
            selected = ?outcome.selected,
            attempts = outcome.attempts.len(),
            elapsed_ms,
            "orchestration finished"
        );

        Ok(OrchestrationResult {
            request_id,
            question: question.text,
            category,
            plan: plan.methods().to_vec(),
            answer: outcome.answer,
            selected_method: outcome.selected,
            attempts: outcome.attempts,
            degraded: outcome.outcome == Outcome::Exhausted,
            outcome: outcome.outcome,
            started_at,
            elapsed_ms,
        })
    }

    /// Resolved category → plan table.
    pub fn plans(&self) -> &BTreeMap<Category, RetrievalPlan> {
        self.inner.selector.plans()
    }

    pub fn enabled_methods(&self) -> Vec<MethodId> {
        self.inner.selector.enabled().collect()
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.inner.registry
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.inner.classifier
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use graphqna_shared::{AttemptRecord, RejectReason};

    use super::*;
    use crate::testing::{StubClassifier, StubEngine, registry_with};

    struct Engines {
        vector: Arc<StubEngine>,
        graph: Arc<StubEngine>,
        kg: Arc<StubEngine>,
        schema: Arc<StubEngine>,
    }

    impl Engines {
        fn grounded() -> Self {
            Self {
                vector: StubEngine::grounded("vector answer"),
                graph: StubEngine::grounded("graph answer"),
                kg: StubEngine::grounded("kg answer"),
                schema: StubEngine::grounded("schema answer"),
            }
        }

        fn registry(&self) -> MethodRegistry {
            registry_with(&[
                (MethodId::Vector, self.vector.clone()),
                (MethodId::GraphEnhanced, self.graph.clone()),
                (MethodId::KnowledgeGraph, self.kg.clone()),
                (MethodId::SchemaGuidedKnowledgeGraph, self.schema.clone()),
            ])
        }
    }

    fn orchestrator(engines: &Engines, label: &str) -> Orchestrator {
        Orchestrator::new(
            OrchestratorConfig::default().with_attempt_timeout(Duration::from_millis(200)),
            engines.registry(),
            QueryClassifier::llm(Arc::new(StubClassifier::label(label)), Duration::from_secs(1)),
        )
        .unwrap()
    }

    fn methods(attempts: &[AttemptRecord]) -> Vec<MethodId> {
        attempts.iter().map(|a| a.method).collect()
    }

    #[tokio::test]
    async fn accepted_primary_yields_single_attempt() {
        let engines = Engines::grounded();
        let result = orchestrator(&engines, "factual")
            .orchestrate(&Question::new("What is a deal?"))
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Accepted);
        assert_eq!(result.category, Some(Category::Factual));
        assert_eq!(result.plan, vec![MethodId::GraphEnhanced, MethodId::Vector]);
        assert_eq!(methods(&result.attempts), vec![MethodId::GraphEnhanced]);
        assert_eq!(result.selected_method, Some(MethodId::GraphEnhanced));
        assert_eq!(result.answer, "graph answer");
        assert!(!result.degraded);
        assert_eq!(engines.vector.calls(), 0);
    }

    #[tokio::test]
    async fn rejected_primary_falls_back_in_plan_order() {
        let engines = Engines {
            graph: StubEngine::grounded("I don't have enough information about that."),
            ..Engines::grounded()
        };
        let result = orchestrator(&engines, "procedural")
            .orchestrate(&Question::new("How do I close a deal?"))
            .await
            .unwrap();

        assert!(result.attempts.len() >= 2);
        assert_eq!(result.attempts[1].method, result.plan[1]);
        assert_eq!(result.attempts[0].reason, Some(RejectReason::GenericAnswer));
        assert_eq!(result.selected_method, Some(MethodId::Vector));
    }

    #[tokio::test]
    async fn all_rejected_is_degraded_with_last_answer() {
        let engines = Engines {
            graph: StubEngine::ungrounded("graph guess"),
            vector: StubEngine::ungrounded("vector guess"),
            ..Engines::grounded()
        };
        let result = orchestrator(&engines, "factual")
            .orchestrate(&Question::new("What is a deal?"))
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Exhausted);
        assert!(result.degraded);
        assert_eq!(result.selected_method, None);
        assert_eq!(result.answer, "vector guess");
        assert_eq!(
            result.presentable().unwrap(),
            format!("{}\n\nvector guess", graphqna_shared::DEGRADED_DISCLAIMER)
        );
    }

    #[tokio::test]
    async fn override_disables_fallback() {
        let engines = Engines {
            vector: StubEngine::grounded("Not applicable: billing only"),
            ..Engines::grounded()
        };
        let classifier = Arc::new(StubClassifier::label("entity"));
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            engines.registry(),
            QueryClassifier::llm(classifier.clone(), Duration::from_secs(1)),
        )
        .unwrap();

        let result = orchestrator
            .orchestrate(&Question::new("List features").with_override("vector"))
            .await
            .unwrap();

        assert_eq!(result.plan, vec![MethodId::Vector]);
        assert_eq!(result.category, None);
        assert_eq!(result.outcome, Outcome::Exhausted);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(classifier.calls(), 0);
        assert_eq!(engines.graph.calls() + engines.schema.calls(), 0);
    }

    #[tokio::test]
    async fn hybrid_override_means_automatic() {
        let engines = Engines::grounded();
        let result = orchestrator(&engines, "entity")
            .orchestrate(&Question::new("List features").with_override("hybrid"))
            .await
            .unwrap();
        assert_eq!(result.category, Some(Category::Entity));
        assert_eq!(result.selected_method, Some(MethodId::SchemaGuidedKnowledgeGraph));
    }

    #[tokio::test]
    async fn entity_without_context_falls_back_to_graph() {
        let engines = Engines {
            schema: StubEngine::ungrounded("There are twelve features."),
            ..Engines::grounded()
        };
        let result = orchestrator(&engines, "entity")
            .orchestrate(&Question::new("What features are available?"))
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Accepted);
        assert_eq!(
            methods(&result.attempts),
            vec![MethodId::SchemaGuidedKnowledgeGraph, MethodId::GraphEnhanced]
        );
        assert_eq!(
            result.attempts[0].reason,
            Some(RejectReason::NoSupportingContext)
        );
        assert_eq!(result.answer, "graph answer");
    }

    #[tokio::test]
    async fn unknown_with_every_method_timing_out() {
        let slow = || StubEngine::hanging(Duration::from_secs(10));
        let engines = Engines {
            vector: slow(),
            graph: slow(),
            kg: slow(),
            ..Engines::grounded()
        };
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default().with_attempt_timeout(Duration::from_millis(30)),
            engines.registry(),
            QueryClassifier::disabled(),
        )
        .unwrap();

        let result = orchestrator.orchestrate(&Question::new("hmm")).await.unwrap();

        assert_eq!(result.category, Some(Category::Unknown));
        assert_eq!(result.outcome, Outcome::Exhausted);
        assert!(result.degraded);
        assert_eq!(result.attempts.len(), 3);
        assert!(
            result
                .attempts
                .iter()
                .all(|a| a.reason == Some(RejectReason::Timeout))
        );
        assert_eq!(result.answer, "");
    }

    #[tokio::test]
    async fn unknown_override_is_config_error() {
        let engines = Engines::grounded();
        let classifier = Arc::new(StubClassifier::label("factual"));
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            engines.registry(),
            QueryClassifier::llm(classifier.clone(), Duration::from_secs(1)),
        )
        .unwrap();

        let err = orchestrator
            .orchestrate(&Question::new("What is a deal?").with_override("not_a_method"))
            .await
            .unwrap_err();

        assert!(err.is_config());
        assert_eq!(classifier.calls(), 0);
        assert_eq!(engines.graph.calls() + engines.vector.calls(), 0);
    }

    #[tokio::test]
    async fn disabled_override_is_config_error() {
        let engines = Engines::grounded();
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default().with_enabled(&[
                MethodId::Vector,
                MethodId::GraphEnhanced,
                MethodId::KnowledgeGraph,
            ]),
            engines.registry(),
            QueryClassifier::keywords(),
        )
        .unwrap();
        let err = orchestrator
            .orchestrate(&Question::new("q").with_override("enhanced_kg"))
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn construction_validates_registry_and_methods() {
        let engines = Engines::grounded();
        let partial = registry_with(&[(MethodId::Vector, engines.vector.clone())]);
        let err = Orchestrator::new(
            OrchestratorConfig::default(),
            partial,
            QueryClassifier::keywords(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no registered engine"));

        let err = Orchestrator::new(
            OrchestratorConfig::default().with_enabled(&[]),
            engines.registry(),
            QueryClassifier::keywords(),
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn default_top_k_reaches_engines() {
        let engines = Engines::grounded();
        let orchestrator = orchestrator(&engines, "factual");

        orchestrator.orchestrate(&Question::new("What is a deal?")).await.unwrap();
        assert_eq!(engines.graph.last_top_k(), Some(5));

        orchestrator
            .orchestrate(&Question::new("What is a deal?").with_top_k(12))
            .await
            .unwrap();
        assert_eq!(engines.graph.last_top_k(), Some(12));
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_exhaustion() {
        let engines = Engines {
            graph: StubEngine::hanging(Duration::from_secs(10)),
            ..Engines::grounded()
        };
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            engines.registry(),
            QueryClassifier::keywords(),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = orchestrator
            .orchestrate_with_cancel(&Question::new("What is a deal?"), &cancel)
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Cancelled);
        assert!(result.is_cancelled());
        assert!(!result.degraded);
        assert_eq!(result.selected_method, None);
        assert_eq!(result.presentable(), None);
        assert_eq!(engines.vector.calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_during_classification() {
        let engines = Engines::grounded();
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            engines.registry(),
            QueryClassifier::llm(
                Arc::new(StubClassifier::slow("factual", Duration::from_secs(10))),
                Duration::from_secs(30),
            ),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = orchestrator
            .orchestrate_with_cancel(&Question::new("What is a deal?"), &cancel)
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Cancelled);
        assert!(result.attempts.is_empty());
        assert_eq!(engines.graph.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_runs_are_independent() {
        let engines = Engines::grounded();
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            engines.registry(),
            QueryClassifier::keywords(),
        )
        .unwrap();

        let questions = [
            "What is a deal?",
            "List all activity types",
            "Which roles can approve a discount?",
            "hello",
        ];
        let handles: Vec<_> = questions
            .iter()
            .map(|q| {
                let orchestrator = orchestrator.clone();
                let question = Question::new(*q);
                tokio::spawn(async move { orchestrator.orchestrate(&question).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.outcome, Outcome::Accepted);
            assert_eq!(result.attempts.len(), 1);
            ids.push(result.request_id);
        }
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        assert_eq!(ids.len(), questions.len());
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for Recorder {
        fn planned(&self, category: Option<Category>, plan: &RetrievalPlan) {
            self.events
                .lock()
                .unwrap()
                .push(format!("planned {category:?} {plan}"));
        }
        fn attempt_started(&self, method: MethodId, position: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {method} {position}/{total}"));
        }
        fn attempt_finished(&self, record: &AttemptRecord) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {} {}", record.method, record.acceptable));
        }
    }

    #[tokio::test]
    async fn progress_follows_the_run() {
        let engines = Engines {
            graph: StubEngine::failing("down"),
            ..Engines::grounded()
        };
        let recorder = Recorder::default();
        orchestrator(&engines, "factual")
            .orchestrate_with(&Question::new("q"), &CancellationToken::new(), &recorder)
            .await
            .unwrap();

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "planned Some(Factual) graph_enhanced → vector".to_string(),
                "start graph_enhanced 1/2".to_string(),
                "done graph_enhanced false".to_string(),
                "start vector 2/2".to_string(),
                "done vector true".to_string(),
            ]
        );
    }
}
