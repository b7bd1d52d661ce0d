//! Client for the third-party form-relay endpoint the booking and contact
//! forms POST to. Success is any 2xx; a failure body's message is surfaced
//! verbatim to the user.

use reqwest::Client;
use serde::Serialize;

use crate::errors::{AssistantError, AssistantResult};

#[derive(Debug, Clone, Serialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingForm {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub needs: String,
    pub date: String,
}

#[derive(Debug, Clone)]
pub struct FormRelayClient {
    client: Client,
    relay_url: String,
}

impl FormRelayClient {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            relay_url: relay_url.into(),
        }
    }

    pub async fn submit_contact(&self, form: &ContactForm) -> AssistantResult<()> {
        self.submit(form).await
    }

    pub async fn submit_booking(&self, form: &BookingForm) -> AssistantResult<()> {
        self.submit(form).await
    }

    async fn submit<T: Serialize>(&self, payload: &T) -> AssistantResult<()> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(format!("Form relay unreachable: {}", e)))?;

        if response.status().is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AssistantError::Form(relay_error_message(body)))
    }
}

/// Message surfaced to the user for a failed submission: the `error` field
/// of a JSON body when present, otherwise the body verbatim.
fn relay_error_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or(body)
}
