//! Shared types, error model, and configuration for GraphQnA.
//!
//! This crate is the foundation depended on by all other GraphQnA crates.
//! It provides:
//! - [`GraphQnaError`]: the unified error type
//! - Domain types ([`Question`], [`Category`], [`MethodId`], [`AttemptRecord`],
//!   [`OrchestrationResult`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, ClassifierMode, DefaultsConfig, EngineEndpoint, EvaluatorConfig,
    LlmConfig, OrchestratorSection, PatternKind, PatternSpec, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{GraphQnaError, Result};
pub use types::{
    AttemptRecord, Category, ContextItem, ContextKind, DEGRADED_DISCLAIMER, MethodId,
    OrchestrationResult, Outcome, QueryOptions, Question, RejectReason, RequestId, RetrievalPlan,
    parse_method_override,
};
