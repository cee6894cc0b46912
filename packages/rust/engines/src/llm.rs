//! LLM-backed question classifier (OpenAI-compatible chat completions).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use graphqna_core::TextClassifier;
use graphqna_shared::{GraphQnaError, LlmConfig, Result};

use crate::USER_AGENT;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Asks a chat model to label a question with one of the four categories.
#[derive(Debug, Clone)]
pub struct LlmClassifier {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    domain_name: String,
}

impl LlmClassifier {
    pub fn new(
        config: &LlmConfig,
        api_key: String,
        domain_name: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GraphQnaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            domain_name: domain_name.to_string(),
        })
    }

    fn prompt(&self, question: &str) -> String {
        let domain = &self.domain_name;
        format!(
            "Classify this question into exactly one of these types:\n\
             - factual: Seeking basic information or facts (e.g., \"What is {domain}?\")\n\
             - procedural: Asking how to do something (e.g., \"How do I create a report?\")\n\
             - entity: Asking about specific entities, their attributes, or types (e.g., \"What features are available?\")\n\
             - relationship: Asking about relationships between entities (e.g., \"Which roles can perform X?\")\n\
             \n\
             Question: {question}\n\
             \n\
             Classification (just respond with one word from the list above):"
        )
    }
}

#[async_trait]
impl TextClassifier for LlmClassifier {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn classify_text(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{ "role": "user", "content": self.prompt(text) }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphQnaError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphQnaError::Classification(format!(
                "{}: HTTP {status}",
                self.endpoint
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GraphQnaError::parse(format!("invalid chat completion: {e}")))?;

        let reply = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GraphQnaError::Classification("empty chat completion".into()))?;
        debug!(%reply, "classifier reply");
        Ok(reply.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
