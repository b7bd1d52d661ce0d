use reqwest::Client;

use crate::config::AssistantConfig;
use crate::errors::{AssistantError, AssistantResult};
use crate::types::{GenerateContentRequest, GenerateContentResponse};

/// Default base URL for the generative endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the generateContent endpoint.
///
/// The model is chosen per call: the text session switches between a light
/// and a higher-capability model depending on the analysis mode.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new API client from configuration.
    pub fn new(config: &AssistantConfig) -> AssistantResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AssistantError::Config("API key is required to initialize the client".to_string())
        })?;

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        })
    }

    fn request_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    /// Send one generateContent exchange.
    ///
    /// Non-success statuses are classified here: 429 and quota-marker bodies
    /// become `RateLimited` so the retry policy and the session managers can
    /// match on the variant instead of inspecting message text.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> AssistantResult<GenerateContentResponse> {
        let url = self.request_url(model);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.map_err(|e| {
                AssistantError::Transport(format!("Failed to read error response: {}", e))
            })?;
            tracing::warn!(status = status.as_u16(), "generateContent request failed");
            return Err(AssistantError::from_http_status(status.as_u16(), error_body));
        }

        response.json::<GenerateContentResponse>().await.map_err(|e| {
            AssistantError::MalformedResponse(format!("Failed to parse response: {}", e))
        })
    }
}
