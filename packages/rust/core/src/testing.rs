//! Scripted collaborators for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use graphqna_shared::{ContextItem, GraphQnaError, MethodId, QueryOptions, Result};

use crate::classifier::TextClassifier;
use crate::registry::{EngineAnswer, MethodRegistry, RetrievalEngine};

/// What a stub engine does when searched.
#[derive(Debug, Clone)]
pub enum Script {
    Answer {
        answer: String,
        context: Vec<ContextItem>,
    },
    Fail(String),
    /// Sleep, then answer with grounded context.
    Hang(Duration),
}

/// Retrieval engine that replays a fixed script and counts its calls.
#[derive(Debug)]
pub struct StubEngine {
    script: Script,
    calls: AtomicUsize,
    last_top_k: std::sync::Mutex<Option<usize>>,
}

impl StubEngine {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_top_k: std::sync::Mutex::new(None),
        })
    }

    /// A specific answer backed by one passage.
    pub fn grounded(answer: &str) -> Arc<Self> {
        Self::new(Script::Answer {
            answer: answer.into(),
            context: vec![ContextItem::passage(format!("source passage for: {answer}"))],
        })
    }

    /// An answer with no supporting context.
    pub fn ungrounded(answer: &str) -> Arc<Self> {
        Self::new(Script::Answer {
            answer: answer.into(),
            context: vec![],
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Self::new(Script::Fail(reason.into()))
    }

    pub fn hanging(delay: Duration) -> Arc<Self> {
        Self::new(Script::Hang(delay))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_top_k(&self) -> Option<usize> {
        *self.last_top_k.lock().expect("top_k lock")
    }
}

#[async_trait]
impl RetrievalEngine for StubEngine {
    async fn search(&self, _question: &str, options: &QueryOptions) -> Result<EngineAnswer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_top_k.lock().expect("top_k lock") = options.top_k;
        match &self.script {
            Script::Answer { answer, context } => Ok(EngineAnswer {
                answer: answer.clone(),
                context: context.clone(),
            }),
            Script::Fail(reason) => Err(GraphQnaError::Network(reason.clone())),
            Script::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(EngineAnswer {
                    answer: "late answer".into(),
                    context: vec![ContextItem::passage("late passage")],
                })
            }
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Register one stub per listed method.
pub fn registry_with(engines: &[(MethodId, Arc<StubEngine>)]) -> MethodRegistry {
    engines
        .iter()
        .fold(MethodRegistry::new(), |registry, (method, engine)| {
            registry.with(*method, engine.clone())
        })
}

/// Classifier capability returning a fixed label, an error, or a late label.
#[derive(Debug)]
pub struct StubClassifier {
    reply: std::result::Result<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubClassifier {
    pub fn label(label: &str) -> Self {
        Self {
            reply: Ok(label.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            reply: Err(error.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(label: &str, delay: Duration) -> Self {
        Self {
            reply: Ok(label.into()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextClassifier for StubClassifier {
    async fn classify_text(&self, _text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .map_err(GraphQnaError::Classification)
    }

    fn name(&self) -> &str {
        "stub"
    }
}
