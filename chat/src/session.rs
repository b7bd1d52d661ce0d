use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::Mutex;

use newhealth_core::{
    call_with_retry, function_tool_set, grounding_tool_set, resolve_tool, AssistantConfig,
    AssistantResult, Content, GenerateContentRequest, Part, PharmacyData, Role, Turn,
};
use newhealth_store::ConversationStore;

use crate::endpoint::TextEndpointRef;

/// Placeholder shown when a response carries no text.
pub const PROCESSING_PLACEHOLDER: &str = "I'm processing that. One moment.";

/// Apology for unrecoverable errors.
pub const CONNECTION_APOLOGY: &str = "I'm having a bit of trouble connecting to the clinical database. Please try again or call us at 08039366563.";

/// Apology variant when the endpoint is rate limiting us: points the user at
/// an alternative contact channel.
pub const HIGH_VOLUME_APOLOGY: &str = "We're experiencing high volumes. For immediate support, please WhatsApp us or call 08039366563.";

/// Image attached to a chat message. Bytes are base64-encoded on the way
/// into the turn.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Clears the busy flag on every exit path, including early returns.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn engage(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self {
            flag: Arc::clone(flag),
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates one request/response cycle with the text endpoint per user
/// message: optimistic history append, context construction, tool-call
/// round-tripping, and error-to-message conversion.
///
/// Sends are serialized: the conversation lock is held for the whole
/// exchange, so a second `send_message` waits for the first to finish
/// instead of interleaving appends.
pub struct ChatSession {
    endpoint: TextEndpointRef,
    config: AssistantConfig,
    pharmacy: PharmacyData,
    conversation: Mutex<ConversationStore>,
    busy: Arc<AtomicBool>,
    deep_analysis: AtomicBool,
}

impl ChatSession {
    pub fn new(
        endpoint: TextEndpointRef,
        config: AssistantConfig,
        pharmacy: PharmacyData,
        conversation: ConversationStore,
    ) -> Self {
        Self {
            endpoint,
            config,
            pharmacy,
            conversation: Mutex::new(conversation),
            busy: Arc::new(AtomicBool::new(false)),
            deep_analysis: AtomicBool::new(false),
        }
    }

    /// Busy/idle signal for the shell. True while an exchange is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Toggle deep-analysis mode: function-calling tools and the
    /// higher-capability model.
    pub fn set_deep_analysis(&self, enabled: bool) {
        self.deep_analysis.store(enabled, Ordering::SeqCst);
    }

    pub fn deep_analysis(&self) -> bool {
        self.deep_analysis.load(Ordering::SeqCst)
    }

    /// Snapshot of the conversation for rendering.
    pub async fn turns(&self) -> Vec<Turn> {
        self.conversation.lock().await.turns().to_vec()
    }

    /// Reset the conversation to the fixed greeting and erase the persisted
    /// history.
    pub async fn clear(&self) {
        self.conversation.lock().await.clear().await;
    }

    /// Turn one user input into appended conversation turns.
    ///
    /// Empty input (no text, no image) is a no-op. Remote errors never
    /// propagate: they are converted into a user-facing apology turn.
    pub async fn send_message(&self, text: &str, image: Option<ImageAttachment>) {
        let text = text.trim();
        if text.is_empty() && image.is_none() {
            return;
        }

        let mut parts = Vec::new();
        if let Some(image) = image {
            parts.push(Part::inline_data(image.mime_type, BASE64.encode(image.data)));
        }
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        let Some(user_turn) = Turn::new(Role::User, parts) else {
            return;
        };

        let mut conversation = self.conversation.lock().await;
        let _busy = BusyGuard::engage(&self.busy);

        conversation.append(user_turn).await;
        let history: Vec<Content> = conversation.turns().iter().map(Turn::as_content).collect();

        let reply = match self.exchange(&history).await {
            Ok(turn) => turn,
            Err(err) => {
                tracing::warn!("chat exchange failed: {}", err);
                if err.is_rate_limited() {
                    Turn::model_text(HIGH_VOLUME_APOLOGY)
                } else {
                    Turn::model_text(CONNECTION_APOLOGY)
                }
            }
        };
        conversation.append(reply).await;
    }

    /// One full exchange: first call, optional tool round-trip, final model
    /// turn. The intermediate tool-call/tool-result turns are only used to
    /// build the follow-up request and never become visible history.
    async fn exchange(&self, history: &[Content]) -> AssistantResult<Turn> {
        let deep = self.deep_analysis();
        let model = self.config.chat_model_for(deep);
        let tools = if deep {
            function_tool_set()
        } else {
            grounding_tool_set()
        };

        let request = GenerateContentRequest {
            contents: history.to_vec(),
            system_instruction: Some(Content::system(self.system_instruction())),
            tools: Some(tools),
            generation_config: None,
        };
        let response = self.generate_with_retry(&model, &request).await?;

        let calls = response.function_calls();
        if calls.is_empty() {
            let mut turn = Turn::model_text(
                response
                    .text()
                    .unwrap_or_else(|| PROCESSING_PLACEHOLDER.to_string()),
            );
            turn.grounding = response.grounding();
            return Ok(turn);
        }

        // Resolve each call with the local stub table, then issue the
        // follow-up carrying the model's tool-call turn and our results.
        let tool_results: Vec<Part> = calls
            .iter()
            .map(|call| Part::function_response(call.name.clone(), resolve_tool(call).to_value()))
            .collect();

        let mut follow_up_contents = history.to_vec();
        follow_up_contents.push(Content {
            parts: response.parts(),
            role: Some(Role::Model),
        });
        follow_up_contents.push(Content {
            parts: tool_results,
            role: Some(Role::User),
        });

        let follow_up = GenerateContentRequest {
            contents: follow_up_contents,
            system_instruction: Some(Content::system(self.system_instruction())),
            tools: Some(function_tool_set()),
            generation_config: None,
        };
        let second = self.generate_with_retry(&model, &follow_up).await?;

        Ok(Turn::model_text(
            second
                .text()
                .unwrap_or_else(|| PROCESSING_PLACEHOLDER.to_string()),
        ))
    }

    async fn generate_with_retry(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> AssistantResult<newhealth_core::GenerateContentResponse> {
        let max_retries = self.config.max_retries.unwrap_or(3);
        let delay = Duration::from_millis(self.config.initial_backoff_ms.unwrap_or(2000));
        call_with_retry(|| self.endpoint.generate(model, request), max_retries, delay).await
    }

    fn system_instruction(&self) -> String {
        format!(
            "You are the New-Health Clinical Specialist. {} Be empathetic. Use real context.",
            self.pharmacy.context_summary()
        )
    }
}
