use std::sync::Arc;

use async_trait::async_trait;

use newhealth_core::{AssistantResult, GeminiClient, GenerateContentRequest, GenerateContentResponse};

/// Seam between the session managers and the remote text endpoint. The
/// production implementation is `GeminiClient`; tests script a fake.
#[async_trait]
pub trait TextEndpoint: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> AssistantResult<GenerateContentResponse>;
}

#[async_trait]
impl TextEndpoint for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> AssistantResult<GenerateContentResponse> {
        self.generate_content(model, request).await
    }
}

/// Type alias for Arc-wrapped endpoint trait objects
pub type TextEndpointRef = Arc<dyn TextEndpoint>;
