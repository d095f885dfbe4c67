pub mod sse;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client as HttpClient, StatusCode,
};
use std::pin::Pin;
use thiserror::Error;
use url::Url;

use crate::cli::Args;
use crate::models::chat::Conversation;
use crate::models::wire::{CompletionRequest, CompletionResponse};

pub const DEFAULT_FUNCTION_PATH: &str = "/functions/v1/chat";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid API key format: {0}")]
    InvalidApiKey(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Request to completion endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Completion endpoint returned status {0}")]
    Status(StatusCode),

    #[error("No content returned from completion endpoint")]
    MissingContent,
}

/// Raw body chunks of a streamed response, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, CompletionError>> + Send>>;

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Requests a streamed reply. Fails on transport errors and non-success status.
    async fn open_stream(&self, conversation: &Conversation)
        -> Result<ChunkStream, CompletionError>;

    /// Requests the whole reply in one response and returns its text.
    async fn complete(&self, conversation: &Conversation) -> Result<String, CompletionError>;
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub function_path: String,
    pub api_key: String,
}

impl EndpointConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            base_url: args.chat_base_url.clone(),
            function_path: args.chat_function_path.clone(),
            api_key: args.chat_api_key.clone(),
        }
    }

    pub fn chat_url(&self) -> Result<Url, CompletionError> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.function_path.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }
}

pub struct CompletionClient {
    http: HttpClient,
    url: Url,
}

impl CompletionClient {
    pub fn new(config: &EndpointConfig) -> Result<Self, CompletionError> {
        let url = config.chat_url()?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))?,
        );

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn post(
        &self,
        conversation: &Conversation,
        stream: Option<bool>,
    ) -> Result<reqwest::Response, CompletionError> {
        let req = CompletionRequest {
            messages: conversation,
            stream,
        };
        let resp = self.http.post(self.url.clone()).json(&req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CompletionError::Status(status));
        }
        Ok(resp)
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn open_stream(
        &self,
        conversation: &Conversation,
    ) -> Result<ChunkStream, CompletionError> {
        debug!("Opening stream with {} messages", conversation.len());
        let resp = self.post(conversation, None).await?;
        let chunks = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(CompletionError::from));
        Ok(Box::pin(chunks))
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, CompletionError> {
        debug!(
            "Requesting single-shot completion with {} messages",
            conversation.len()
        );
        let resp = self.post(conversation, Some(false)).await?;
        let body = resp.json::<CompletionResponse>().await?;
        body.into_content().ok_or(CompletionError::MissingContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, function_path: &str) -> EndpointConfig {
        EndpointConfig {
            base_url: base_url.to_string(),
            function_path: function_path.to_string(),
            api_key: "anon-key".to_string(),
        }
    }

    #[test]
    fn chat_url_joins_without_doubled_slashes() {
        let url = config("https://project.example.co/", DEFAULT_FUNCTION_PATH)
            .chat_url()
            .unwrap();
        assert_eq!(url.as_str(), "https://project.example.co/functions/v1/chat");

        let url = config("https://project.example.co", "functions/v1/chat")
            .chat_url()
            .unwrap();
        assert_eq!(url.as_str(), "https://project.example.co/functions/v1/chat");
    }

    #[test]
    fn chat_url_rejects_relative_base() {
        let err = config("not a url", DEFAULT_FUNCTION_PATH)
            .chat_url()
            .unwrap_err();
        assert!(matches!(err, CompletionError::InvalidUrl(_)));
    }

    #[test]
    fn client_targets_joined_chat_url() {
        let client =
            CompletionClient::new(&config("https://project.example.co/", "/chat")).unwrap();
        assert_eq!(client.url().as_str(), "https://project.example.co/chat");
    }

    #[test]
    fn client_rejects_api_key_with_newline() {
        let mut bad = config("https://project.example.co", DEFAULT_FUNCTION_PATH);
        bad.api_key = "line\nbreak".to_string();
        assert!(matches!(
            CompletionClient::new(&bad),
            Err(CompletionError::InvalidApiKey(_))
        ));
    }
}
