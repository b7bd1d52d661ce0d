use std::time::{Duration, SystemTime, UNIX_EPOCH};

use newhealth_core::{
    call_with_retry, content_response_schema, fallback_content, AssistantConfig, Content,
    GenerateContentRequest, GenerationConfig, PharmacyData, DEFAULT_CHAT_MODEL,
};
use newhealth_store::ContentCache;

use crate::endpoint::TextEndpointRef;

const CONTENT_PROMPT: &str = "Generate professional pharmacy marketing content for 'New-Health Pharmacy Ltd' in Wuse, Abuja. \
Use tagline: 'Your Premier Wholesale Pharmacy for Medications Supplements, Skincare, & More. Elevate Your Wellness with Us.' \
Focus on wholesale prices and 100% authentic medications. Return JSON.";

const CONTENT_MAX_RETRIES: u32 = 2;
const CONTENT_INITIAL_BACKOFF: Duration = Duration::from_millis(1500);

/// Milliseconds since the Unix epoch, for callers that do not inject a
/// clock.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fetches the business content rendered by the page shell, memoized in the
/// timed cache to avoid burning quota on every load.
///
/// Without an endpoint (no API key configured) or on any generation
/// failure, the canned fallback content is returned instead.
pub struct ContentService {
    endpoint: Option<TextEndpointRef>,
    cache: ContentCache,
    model: String,
}

impl ContentService {
    pub fn new(
        endpoint: Option<TextEndpointRef>,
        cache: ContentCache,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            endpoint,
            cache,
            model: config
                .chat_model
                .clone()
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        }
    }

    /// Cached payload when fresh at `now_ms`; otherwise a fresh generation
    /// attempt, falling back to the canned content on failure.
    pub async fn fetch_pharmacy_content(&self, now_ms: u64) -> PharmacyData {
        if let Some(cached) = self.cache.get_fresh(now_ms).await {
            return cached;
        }

        let Some(endpoint) = &self.endpoint else {
            return fallback_content();
        };

        match self.generate(endpoint, now_ms).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("content generation fallback active: {}", e);
                fallback_content()
            }
        }
    }

    async fn generate(
        &self,
        endpoint: &TextEndpointRef,
        now_ms: u64,
    ) -> newhealth_core::AssistantResult<PharmacyData> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![newhealth_core::Part::text(CONTENT_PROMPT)],
                role: Some(newhealth_core::Role::User),
            }],
            system_instruction: None,
            tools: None,
            generation_config: Some(GenerationConfig {
                temperature: None,
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(content_response_schema()),
            }),
        };

        let response = call_with_retry(
            || endpoint.generate(&self.model, &request),
            CONTENT_MAX_RETRIES,
            CONTENT_INITIAL_BACKOFF,
        )
        .await?;

        let text = response.text().ok_or_else(|| {
            newhealth_core::AssistantError::MalformedResponse(
                "content response carried no text".to_string(),
            )
        })?;
        let data: PharmacyData = serde_json::from_str(&text)?;

        self.cache.put(data.clone(), now_ms).await;
        Ok(data)
    }
}
