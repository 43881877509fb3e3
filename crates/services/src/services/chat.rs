use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;

use super::claude_api::{ClaudeApiClient, ClaudeApiError, Message, Role};

const SYSTEM_PROMPT: &str = "You are a master chef with decades of experience in professional kitchens \
around the world. You guide starting cooks with warmth and encouragement, sharing techniques, \
flavor combinations and kitchen wisdom. Give practical advice and help build their confidence.";

const MAX_TOKENS: u32 = 1024;
const MAX_MESSAGES: usize = 50;
const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat assistant is not configured")]
    Unavailable,
    #[error("invalid conversation: {0}")]
    InvalidConversation(&'static str),
    #[error(transparent)]
    Api(#[from] ClaudeApiError),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ChatRequest {
    #[ts(type = "Array<{ role: 'user' | 'assistant', content: string }>")]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone)]
pub struct ChatService {
    claude: Option<ClaudeApiClient>,
}

impl ChatService {
    pub fn new(claude: Option<ClaudeApiClient>) -> Self {
        Self { claude }
    }

    pub fn is_available(&self) -> bool {
        self.claude.is_some()
    }

    pub async fn chat(&self, messages: &[Message]) -> Result<String, ChatError> {
        let claude = self.claude.as_ref().ok_or(ChatError::Unavailable)?;
        validate_conversation(messages)?;
        debug!(turns = messages.len(), "Forwarding chat conversation");
        Ok(claude.chat(messages, Some(SYSTEM_PROMPT), MAX_TOKENS).await?)
    }
}

fn validate_conversation(messages: &[Message]) -> Result<(), ChatError> {
    if messages.is_empty() {
        return Err(ChatError::InvalidConversation("no messages"));
    }
    if messages.len() > MAX_MESSAGES {
        return Err(ChatError::InvalidConversation("too many messages"));
    }
    if messages
        .iter()
        .any(|m| m.content.trim().is_empty() || m.content.chars().count() > MAX_MESSAGE_CHARS)
    {
        return Err(ChatError::InvalidConversation("message content is empty or too long"));
    }
    if messages.last().map(|m| m.role) != Some(Role::User) {
        return Err(ChatError::InvalidConversation("last message must come from the user"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_without_a_client() {
        let service = ChatService::new(None);
        assert!(!service.is_available());
        let err = service.chat(&[Message::user("How long do I boil an egg?")]).await.unwrap_err();
        assert!(matches!(err, ChatError::Unavailable));

        let err = service.chat(&[]).await.unwrap_err();
        assert!(matches!(err, ChatError::Unavailable));
    }

    #[test]
    fn conversation_rules() {
        assert!(validate_conversation(&[]).is_err());
        assert!(validate_conversation(&[Message::user("  ")]).is_err());
        assert!(
            validate_conversation(&[Message::user("hi"), Message::assistant("hello")]).is_err()
        );
        assert!(validate_conversation(&[
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("what can I cook with leeks?"),
        ])
        .is_ok());
    }

    #[test]
    fn request_parses_roles() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"pasta?"},{"role":"assistant","content":"sure"}]}"#,
        )
        .unwrap();
        assert_eq!(request.messages[1].role, Role::Assistant);
    }
}
