//! Application configuration for GraphQnA.
//!
//! User config lives at `~/.graphqna/graphqna.toml`.
//! CLI flags override config file values, which override defaults.
//! The file is read once at startup; nothing re-reads it per request.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GraphQnaError, Result};
use crate::types::MethodId;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "graphqna.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".graphqna";

// ---------------------------------------------------------------------------
// Config structs (matching graphqna.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Fallback policy and method set.
    #[serde(default)]
    pub orchestrator: OrchestratorSection,

    /// Generic-answer detection.
    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    /// Question classification.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// LLM endpoint used for classification.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retrieval engine endpoints keyed by method id (canonical or legacy name).
    #[serde(default)]
    pub engines: BTreeMap<String, EngineEndpoint>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default number of results engines retrieve.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Name of the knowledge domain, used in classification prompts.
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            domain_name: default_domain_name(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_domain_name() -> String {
    "Knowledge Domain".into()
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSection {
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Methods available for planning and overrides (snake_case ids).
    #[serde(default = "default_enabled_methods")]
    pub enabled_methods: Vec<String>,

    /// Substantive context items an answer needs to count as grounded.
    #[serde(default = "default_min_context_items")]
    pub min_context_items: usize,

    /// Methods allowed to answer without supporting context.
    #[serde(default)]
    pub ungrounded_methods: Vec<String>,

    /// Per-category plan overrides, e.g. `entity = ["knowledge_graph", "vector"]`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plans: BTreeMap<String, Vec<String>>,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: default_attempt_timeout_ms(),
            enabled_methods: default_enabled_methods(),
            min_context_items: default_min_context_items(),
            ungrounded_methods: Vec::new(),
            plans: BTreeMap::new(),
        }
    }
}

fn default_attempt_timeout_ms() -> u64 {
    30_000
}
fn default_enabled_methods() -> Vec<String> {
    MethodId::ALL.iter().map(|m| m.as_str().to_string()).collect()
}
fn default_min_context_items() -> usize {
    1
}

/// How a generic-answer pattern is matched against an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Phrase appears anywhere (case-insensitive).
    Contains,
    /// Answer starts with the phrase (case-insensitive).
    Prefix,
    /// Answer is exactly the phrase (case-insensitive, trimmed).
    Exact,
    /// Regular expression.
    Regex,
}

/// One `[[evaluator.generic_patterns]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub kind: PatternKind,
    pub pattern: String,
}

impl PatternSpec {
    pub fn contains(pattern: impl Into<String>) -> Self {
        Self {
            kind: PatternKind::Contains,
            pattern: pattern.into(),
        }
    }
}

/// `[evaluator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_generic_patterns")]
    pub generic_patterns: Vec<PatternSpec>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            generic_patterns: default_generic_patterns(),
        }
    }
}

/// Refusal phrasings the engines and their prompts are known to produce.
fn default_generic_patterns() -> Vec<PatternSpec> {
    [
        "Not applicable:",
        "I don't have enough information",
        "I couldn't find information",
        "no relevant information",
        "not enough context",
        "I apologize, but I encountered an error",
    ]
    .into_iter()
    .map(PatternSpec::contains)
    .collect()
}

/// Classification strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    /// Deterministic keyword rules.
    #[default]
    Keywords,
    /// Ask the configured LLM.
    Llm,
    /// Always `unknown`.
    Off,
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub mode: ClassifierMode,

    /// Timeout for one LLM classification call, in milliseconds.
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::default(),
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

fn default_classifier_timeout_ms() -> u64 {
    10_000
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for classification.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}

/// `[engines.<method>]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEndpoint {
    /// Base URL of the engine; requests go to `<url>/search`.
    pub url: Url,

    /// HTTP timeout for this engine in milliseconds. The orchestrator's
    /// per-attempt timeout still applies on top of it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.graphqna/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GraphQnaError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.graphqna/graphqna.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GraphQnaError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GraphQnaError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GraphQnaError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GraphQnaError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GraphQnaError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the LLM API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(GraphQnaError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable \
             or switch [classifier] mode to \"keywords\"."
        ))),
    }
}
