use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chat::Conversation;

/// Body posted to the completion endpoint. `stream` is left out entirely for
/// the streamed request and set to `false` for the single-shot fallback.
#[derive(Serialize, Debug)]
pub struct CompletionRequest<'a> {
    pub messages: &'a Conversation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[derive(Deserialize, Debug)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
pub struct CompletionChoice {
    pub message: Option<CompletionMessage>,
}

#[derive(Deserialize, Debug)]
pub struct CompletionMessage {
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Content of the first choice, if it carries non-empty text.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
    }
}

/// Pulls `choices[0].delta.content` out of a parsed stream payload. Any other
/// shape yields `None` rather than an error.
pub fn delta_content(payload: &Value) -> Option<&str> {
    payload
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Message;

    #[test]
    fn streamed_request_omits_stream_field() {
        let conversation = Conversation::from(vec![Message::user("hi")]);
        let body = serde_json::to_value(CompletionRequest {
            messages: &conversation,
            stream: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "messages": [{ "role": "user", "content": "hi" }] })
        );
    }

    #[test]
    fn fallback_request_disables_streaming() {
        let conversation = Conversation::from(vec![Message::user("hi")]);
        let body = serde_json::to_value(CompletionRequest {
            messages: &conversation,
            stream: Some(false),
        })
        .unwrap();
        assert_eq!(body["stream"], serde_json::json!(false));
    }

    #[test]
    fn delta_content_ignores_other_shapes() {
        let with_role_only =
            serde_json::json!({ "choices": [{ "delta": { "role": "assistant" } }] });
        assert_eq!(delta_content(&with_role_only), None);

        let empty = serde_json::json!({ "choices": [{ "delta": { "content": "" } }] });
        assert_eq!(delta_content(&empty), None);

        let text = serde_json::json!({ "choices": [{ "delta": { "content": "Study " } }] });
        assert_eq!(delta_content(&text), Some("Study "));
    }

    #[test]
    fn into_content_requires_text() {
        let missing: CompletionResponse =
            serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert_eq!(missing.into_content(), None);

        let empty: CompletionResponse = serde_json::from_value(
            serde_json::json!({ "choices": [{ "message": { "content": "" } }] }),
        )
        .unwrap();
        assert_eq!(empty.into_content(), None);

        let full: CompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "X" } }]
        }))
        .unwrap();
        assert_eq!(full.into_content().as_deref(), Some("X"));
    }
}
