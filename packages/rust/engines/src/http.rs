//! HTTP retrieval engine: one remote search service per method.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use graphqna_core::{EngineAnswer, RetrievalEngine};
use graphqna_shared::{ContextItem, EngineEndpoint, GraphQnaError, MethodId, QueryOptions, Result};

use crate::{DEFAULT_TIMEOUT_SECS, USER_AGENT};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    question: &'a str,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    context: Vec<ContextItem>,
    /// Set by engines that report failures in-band.
    #[serde(default)]
    error: Option<String>,
}

/// Talks to a retrieval service over `POST <url>/search`.
#[derive(Debug, Clone)]
pub struct HttpRetrievalEngine {
    method: MethodId,
    name: String,
    search_url: Url,
    client: Client,
}

impl HttpRetrievalEngine {
    pub fn new(method: MethodId, endpoint: &EngineEndpoint) -> Result<Self> {
        let base = endpoint.url.as_str().trim_end_matches('/');
        let search_url = Url::parse(&format!("{base}/search"))
            .map_err(|e| GraphQnaError::config(format!("invalid engine url '{base}': {e}")))?;
        let timeout = endpoint
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Ok(Self {
            method,
            name: format!("http:{method}"),
            search_url,
            client: build_client(timeout)?,
        })
    }

    pub fn search_url(&self) -> &Url {
        &self.search_url
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| GraphQnaError::Network(format!("failed to build HTTP client: {e}")))
}

#[async_trait]
impl RetrievalEngine for HttpRetrievalEngine {
    #[instrument(skip_all, fields(method = %self.method, url = %self.search_url))]
    async fn search(&self, question: &str, options: &QueryOptions) -> Result<EngineAnswer> {
        let url = &self.search_url;
        let response = self
            .client
            .post(url.clone())
            .json(&SearchRequest {
                question,
                method: self.method.as_str(),
                top_k: options.top_k,
            })
            .send()
            .await
            .map_err(|e| GraphQnaError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphQnaError::Network(format!("{url}: HTTP {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| GraphQnaError::parse(format!("{url}: invalid search response: {e}")))?;

        if let Some(error) = body.error {
            return Err(GraphQnaError::Retrieval(error));
        }
        let answer = body
            .answer
            .ok_or_else(|| GraphQnaError::Retrieval(format!("{url}: response has no answer")))?;

        debug!(context_items = body.context.len(), "search complete");
        Ok(EngineAnswer {
            answer,
            context: body.context,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
