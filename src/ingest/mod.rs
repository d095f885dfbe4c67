mod draft;

pub use draft::Draft;

use futures::StreamExt;
use log::{debug, error, info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::completion::sse::{EventStreamDecoder, StreamEvent};
use crate::completion::{ChunkStream, CompletionBackend, CompletionError};
use crate::models::chat::{Conversation, Message};

pub const FALLBACK_ERROR_TEXT: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Conversation must be non-empty and end with a user message")]
    InvalidConversation,
}

/// What the caller's conversation view should show for the assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// First streamed content: append a new assistant message with this text.
    Started(String),
    /// Replace the text of the message added by `Started`.
    Updated(String),
    /// The turn has settled on this message. Always delivered exactly once.
    Completed(Message),
}

pub trait TurnObserver {
    fn on_event(&mut self, event: &TurnEvent);
}

impl TurnObserver for Vec<TurnEvent> {
    fn on_event(&mut self, event: &TurnEvent) {
        self.push(event.clone());
    }
}

/// Discards every event.
pub struct Ignore;

impl TurnObserver for Ignore {
    fn on_event(&mut self, _event: &TurnEvent) {}
}

enum StreamOutcome {
    Finished(Draft),
    Failed(Draft, CompletionError),
}

pub struct Ingestor {
    backend: Arc<dyn CompletionBackend>,
}

impl Ingestor {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub fn validate(conversation: &Conversation) -> Result<(), IngestError> {
        if conversation.ends_with_user() {
            Ok(())
        } else {
            Err(IngestError::InvalidConversation)
        }
    }

    /// Obtains the assistant reply for `conversation`, which must end with the
    /// new user message. Streams when possible, falls back to a single-shot
    /// request otherwise, and never fails: an unrecoverable error settles on
    /// [`FALLBACK_ERROR_TEXT`].
    pub async fn respond<O: TurnObserver + ?Sized>(
        &self,
        conversation: &Conversation,
        observer: &mut O,
    ) -> Message {
        let message = match self.backend.open_stream(conversation).await {
            Ok(chunks) => match Self::ingest(chunks, observer).await {
                StreamOutcome::Finished(draft) if draft.is_started() => draft.into_message(),
                StreamOutcome::Finished(_) => {
                    warn!("Stream ended without content, retrying without streaming");
                    self.fallback(conversation).await
                }
                StreamOutcome::Failed(draft, e) if draft.is_started() => {
                    warn!(
                        "Stream interrupted after {} bytes ({}), retrying without streaming",
                        draft.content().len(),
                        e
                    );
                    self.replace_draft(conversation, draft, observer).await
                }
                StreamOutcome::Failed(_, e) => {
                    warn!("Stream failed before any content: {}", e);
                    self.fallback(conversation).await
                }
            },
            Err(e) => {
                info!("Streaming unavailable ({}), retrying without streaming", e);
                self.fallback(conversation).await
            }
        };

        observer.on_event(&TurnEvent::Completed(message.clone()));
        message
    }

    async fn ingest<O: TurnObserver + ?Sized>(
        mut chunks: ChunkStream,
        observer: &mut O,
    ) -> StreamOutcome {
        let mut decoder = EventStreamDecoder::new();
        let mut draft = Draft::new();

        while let Some(chunk) = chunks.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    decoder.finish();
                    return StreamOutcome::Failed(draft, e);
                }
            };
            for event in decoder.push(&bytes) {
                match event {
                    StreamEvent::Delta(fragment) => {
                        let update = draft.push(&fragment);
                        observer.on_event(&update);
                    }
                    StreamEvent::Done => debug!("End-of-stream sentinel received"),
                }
            }
        }

        decoder.finish();
        StreamOutcome::Finished(draft)
    }

    /// Single-shot retry for a stream that broke after content was shown.
    /// The visible draft is replaced in place; it is kept only when the
    /// retry fails as well.
    async fn replace_draft<O: TurnObserver + ?Sized>(
        &self,
        conversation: &Conversation,
        draft: Draft,
        observer: &mut O,
    ) -> Message {
        match self.backend.complete(conversation).await {
            Ok(content) => {
                observer.on_event(&TurnEvent::Updated(content.clone()));
                Message::assistant(content)
            }
            Err(e) => {
                error!("Chat error: {}, keeping partial reply", e);
                draft.into_message()
            }
        }
    }

    async fn fallback(&self, conversation: &Conversation) -> Message {
        match self.backend.complete(conversation).await {
            Ok(content) => Message::assistant(content),
            Err(e) => {
                error!("Chat error: {}", e);
                Message::assistant(FALLBACK_ERROR_TEXT)
            }
        }
    }
}
