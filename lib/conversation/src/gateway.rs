//! Chat platform capability.

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sidekick_core::{ConversationKey, UserId};

/// Platform message limit used when a gateway does not declare its own.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 2000;

/// A member of the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Platform user ID.
    pub id: UserId,
    /// Name shown to other users.
    pub display_name: String,
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Posts a single message that already fits the platform limit.
    async fn post_message(&self, key: &ConversationKey, text: &str) -> Result<(), GatewayError>;

    /// Shows a "working on it" indicator in the conversation.
    async fn indicate_activity(&self, key: &ConversationKey) -> Result<(), GatewayError>;

    /// Looks up a platform member.
    async fn lookup_member(&self, user: &UserId) -> Result<Option<Member>, GatewayError>;

    /// Longest message the platform accepts, in characters.
    fn max_message_chars(&self) -> usize {
        DEFAULT_MAX_MESSAGE_CHARS
    }

    /// Sends `text`, split into sequential posts when it exceeds the limit.
    async fn send_message(&self, key: &ConversationKey, text: &str) -> Result<(), GatewayError> {
        for chunk in chunk_message(text, self.max_message_chars()) {
            self.post_message(key, &chunk).await?;
        }
        Ok(())
    }
}

/// Splits `text` into pieces of at most `max_chars` characters.
///
/// Splits on character boundaries only; an empty input yields no pieces.
#[must_use]
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
