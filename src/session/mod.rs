use log::info;
use thiserror::Error;

use crate::ingest::{IngestError, Ingestor, TurnObserver};
use crate::models::chat::{Conversation, Message};

pub const DEFAULT_GREETING: &str =
    "Hi! I'm here to help you explore university courses and career paths. What questions do you have about your future?";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Message cannot be empty")]
    EmptyInput,

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// State behind the chat widget: the full history that is sent on every turn.
///
/// `submit` takes `&mut self`, so a second turn cannot start while one is in
/// flight.
#[derive(Debug, Clone)]
pub struct ChatSession {
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(greeting: Option<&str>) -> Self {
        let mut conversation = Conversation::new();
        if let Some(greeting) = greeting.filter(|g| !g.trim().is_empty()) {
            conversation.push(Message::assistant(greeting));
        }
        Self { conversation }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Sends `input` with the whole prior history and appends exactly one
    /// assistant reply, which is also returned.
    pub async fn submit<O: TurnObserver + ?Sized>(
        &mut self,
        input: &str,
        ingestor: &Ingestor,
        observer: &mut O,
    ) -> Result<&Message, SessionError> {
        if input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        self.conversation.push(Message::user(input));
        Ingestor::validate(&self.conversation)?;
        info!(
            "Submitting turn with {} messages of history",
            self.conversation.len()
        );

        let reply = ingestor.respond(&self.conversation, observer).await;
        self.conversation.push(reply);

        Ok(self.conversation.last().ok_or(IngestError::InvalidConversation)?)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(Some(DEFAULT_GREETING))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;

    #[test]
    fn default_session_starts_with_greeting() {
        let session = ChatSession::default();
        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), Role::Assistant);
        assert_eq!(messages[0].content(), DEFAULT_GREETING);
    }

    #[test]
    fn blank_greeting_is_skipped() {
        assert!(ChatSession::new(Some("  ")).conversation().is_empty());
        assert!(ChatSession::new(None).conversation().is_empty());
    }
}
