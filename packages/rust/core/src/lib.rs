//! Retrieval orchestration for GraphQnA.
//!
//! This crate decides how a question gets answered: it classifies the
//! question, picks an ordered plan of retrieval methods, and walks the plan
//! until an answer passes the generic-answer evaluator. Engines and the
//! optional LLM classifier are plugged in through [`RetrievalEngine`] and
//! [`TextClassifier`]; everything here is independent of transport.

pub mod cancel;
pub mod classifier;
pub mod config;
pub mod evaluator;
pub mod fallback;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod selector;

#[cfg(test)]
mod testing;

pub use cancel::CancellationToken;
pub use classifier::{QueryClassifier, TextClassifier, category_from_reply, keyword_category};
pub use config::OrchestratorConfig;
pub use evaluator::{AnswerEvaluator, GenericMatcher, Verdict};
pub use fallback::{ControllerOutcome, FallbackController};
pub use orchestrator::Orchestrator;
pub use progress::{ProgressReporter, SilentProgress};
pub use registry::{EngineAnswer, MethodAdapter, MethodRegistry, RetrievalEngine, RetrievalFailure};
pub use selector::{MethodSelector, default_plan};
