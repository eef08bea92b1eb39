//! Conversational Gateway
//!
//! Accepts free-text input from the chat endpoint. Messages mentioning the
//! task-list keyword are answered directly from the mirror store; anything
//! else is forwarded to the external intent-detection service.

use crate::db::TaskStore;
use crate::intent::{IntentClient, IntentError};

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced to the chat endpoint
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Messages containing this word (case-insensitive) short-circuit to the
/// mirror listing and never reach the intent service.
const TASK_LIST_KEYWORD: &str = "tareas";

/// Gateway between the chat endpoint, the mirror store, and the intent
/// service
pub struct ConversationalGateway {
    store: TaskStore,
    intent: IntentClient,
}

impl ConversationalGateway {
    pub fn new(store: TaskStore, intent: IntentClient) -> Self {
        Self { store, intent }
    }

    /// Produce a reply for a free-text message
    pub async fn handle(&self, message: &str) -> Result<String> {
        if message.to_lowercase().contains(TASK_LIST_KEYWORD) {
            return self.format_task_list().await;
        }

        Ok(self.intent.detect_intent(message).await?)
    }

    async fn format_task_list(&self) -> Result<String> {
        let tasks = self.store.list().await.map_err(GatewayError::Store)?;

        if tasks.is_empty() {
            return Ok("No tienes tareas disponibles.".to_string());
        }

        let mut reply = String::from("Estas son tus tareas:");
        for task in tasks {
            let course = task.course_name.unwrap_or_default();
            reply.push_str(&format!("\n📝 {} ({})", task.title, course));
        }

        Ok(reply)
    }
}
