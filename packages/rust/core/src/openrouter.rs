//! OpenAI-compatible chat completions client (OpenRouter by default).

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use songbook_shared::{EnrichmentSettings, Result, SongbookError};
use tracing::debug;

use crate::enrichment::TextGenerator;

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("Songbook/", env!("CARGO_PKG_VERSION"));

/// Low temperature keeps the JSON shape stable.
const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for a hosted text-generation model.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenRouterClient {
    /// Build a client from the enrichment settings and the resolved API key.
    ///
    /// Fails when the key cannot be sent as a header value.
    pub fn new(settings: &EnrichmentSettings, api_key: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim())).map_err(|_| {
            SongbookError::config(format!(
                "{} contains characters not allowed in an HTTP header",
                settings.api_key_env
            ))
        })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SongbookError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
        })
    }
}

impl TextGenerator for OpenRouterClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": TEMPERATURE,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SongbookError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SongbookError::Network(format!(
                "{}: HTTP {status}: {}",
                self.endpoint,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SongbookError::Enrichment(format!("invalid completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| SongbookError::Enrichment("completion had no content".into()))?;

        debug!(model = %self.model, chars = content.len(), "completion received");
        Ok(content)
    }
}
