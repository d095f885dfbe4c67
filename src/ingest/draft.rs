use super::TurnEvent;
use crate::models::chat::Message;

/// The assistant turn while it is still being streamed. It is the only
/// mutable view of the reply and becomes an immutable [`Message`] through
/// [`Draft::into_message`].
#[derive(Debug, Default)]
pub struct Draft {
    content: String,
    started: bool,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Appends a fragment and reports how the visible conversation changes.
    pub fn push(&mut self, fragment: &str) -> TurnEvent {
        self.content.push_str(fragment);
        if self.started {
            TurnEvent::Updated(self.content.clone())
        } else {
            self.started = true;
            TurnEvent::Started(self.content.clone())
        }
    }

    pub fn into_message(self) -> Message {
        Message::assistant(self.content)
    }
}
