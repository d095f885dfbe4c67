//! Line framing for the completion endpoint's event stream.
//!
//! The transport may split chunks anywhere, including inside a line or inside
//! a UTF-8 code point, so bytes are accumulated and only newline-terminated
//! lines are decoded:
//!
//! ```text
//! : keep-alive
//!
//! data: {"choices":[{"delta":{"content":"Study "}}]}
//!
//! data: [DONE]
//! ```

use log::debug;

use crate::models::wire::delta_content;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty content fragment for the assistant turn.
    Delta(String),
    /// The `[DONE]` sentinel was seen.
    Done,
}

/// Per-request accumulator for the event stream.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    /// A complete data line whose payload failed to parse. It stays at the
    /// front of the queue and is retried before anything behind it.
    carry: Option<String>,
}

enum LineOutcome {
    Skip,
    Event(StreamEvent),
    Unparsed,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transport chunk and returns the events decoded from the
    /// complete lines now available. Decoding for this chunk stops at the
    /// `[DONE]` sentinel; lines behind it stay buffered for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();

        if let Some(line) = self.carry.take() {
            match self.interpret(&line) {
                LineOutcome::Unparsed => {
                    self.carry = Some(line);
                    return events;
                }
                outcome => {
                    if Self::apply(outcome, &mut events) {
                        return events;
                    }
                }
            }
        }

        while let Some(line) = self.next_line() {
            match self.interpret(&line) {
                LineOutcome::Unparsed => {
                    debug!("Holding back unparsed stream line ({} bytes)", line.len());
                    self.carry = Some(line);
                    break;
                }
                outcome => {
                    if Self::apply(outcome, &mut events) {
                        break;
                    }
                }
            }
        }

        events
    }

    /// Ends the stream. Anything still buffered is dropped.
    pub fn finish(self) {
        let pending = self.buffer.len() + self.carry.as_ref().map_or(0, |line| line.len());
        if pending > 0 {
            debug!("Dropping {} bytes of undecoded stream data", pending);
        }
    }

    /// Records the outcome; returns `true` when the sentinel was reached.
    fn apply(outcome: LineOutcome, events: &mut Vec<StreamEvent>) -> bool {
        match outcome {
            LineOutcome::Event(StreamEvent::Done) => {
                events.push(StreamEvent::Done);
                true
            }
            LineOutcome::Event(event) => {
                events.push(event);
                false
            }
            LineOutcome::Skip | LineOutcome::Unparsed => false,
        }
    }

    fn next_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
        let mut line = String::from_utf8_lossy(&raw[..newline]).into_owned();
        while line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    fn interpret(&self, line: &str) -> LineOutcome {
        if line.starts_with(':') || line.trim().is_empty() {
            return LineOutcome::Skip;
        }
        let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
            return LineOutcome::Skip;
        };
        let payload = rest.trim();
        if payload == DONE_SENTINEL {
            return LineOutcome::Event(StreamEvent::Done);
        }
        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(value) => match delta_content(&value) {
                Some(content) => LineOutcome::Event(StreamEvent::Delta(content.to_string())),
                None => LineOutcome::Skip,
            },
            Err(_) => LineOutcome::Unparsed,
        }
    }
}
