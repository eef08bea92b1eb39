//! Intent-detection service client
//!
//! Forwards free-text messages to a Dialogflow-style detect-intent endpoint
//! bound to a fixed session and returns the fulfillment text verbatim. The
//! gateway is the only caller; it decides what reaches this client.

use serde_json::json;
use std::time::Duration;

/// Result type for intent operations
pub type Result<T> = std::result::Result<T, IntentError>;

/// Errors that can occur during intent detection
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("Intent service unavailable: {0}")]
    Unavailable(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Client for the remote intent-detection service
pub struct IntentClient {
    base_url: String,
    project_id: String,
    session_id: String,
    language: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl IntentClient {
    /// Create a new client bound to a fixed project and session
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        session_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            project_id: project_id.into(),
            session_id: session_id.into(),
            language: language.into(),
            token: None,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Attach a bearer token for the service
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Detect the intent of a message and return its fulfillment text
    pub async fn detect_intent(&self, message: &str) -> Result<String> {
        let url = format!(
            "{}/v2/projects/{}/agent/sessions/{}:detectIntent",
            self.base_url, self.project_id, self.session_id
        );

        let payload = json!({
            "queryInput": {
                "text": {
                    "text": message,
                    "languageCode": self.language,
                }
            }
        });

        let mut request = self.client.post(&url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IntentError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IntentError::Unavailable(format!(
                "Intent service error ({}): {}",
                status, text
            )));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| IntentError::Parse(e.to_string()))?;

        data.get("queryResult")
            .and_then(|r| r.get("fulfillmentText"))
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| IntentError::Parse("No fulfillment text in response".to_string()))
    }
}
