use crate::provider::core::{GenerationResult, ProviderAdapter, ProviderError};
use crate::provider::http::{HttpClient, build_https_client, collect_body};
use async_trait::async_trait;
use http_body_util::Full;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::bytes::Bytes;
use tracing::debug;

pub const OPENAI_PROVIDER_ID: &str = "openai";

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODELS_URL: &str = "https://api.openai.com/v1/models";
const OPENAI_MODEL: &str = "gpt-4";

/// Adapter for the OpenAI chat-completions API.
#[derive(Debug)]
pub struct OpenAiAdapter {
    client: HttpClient,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    request_timeout: Duration,
}

impl OpenAiAdapter {
    pub fn new(
        api_key: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: build_https_client(),
            api_key: api_key.into(),
            temperature,
            max_tokens,
            request_timeout,
        }
    }

    fn request_error(&self, message: impl ToString) -> ProviderError {
        ProviderError::Request {
            provider: OPENAI_PROVIDER_ID.to_string(),
            message: message.to_string(),
        }
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<(StatusCode, Bytes), ProviderError> {
        let round_trip = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| self.request_error(e))?;
            collect_body(response).await.map_err(|e| self.request_error(e))
        };

        match tokio::time::timeout(self.request_timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: OPENAI_PROVIDER_ID.to_string(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &str {
        OPENAI_PROVIDER_ID
    }

    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> Result<GenerationResult, ProviderError> {
        let body = json!({
            "model": OPENAI_MODEL,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri(CHAT_COMPLETIONS_URL)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(Full::new(Bytes::from(body.to_string())))
            .map_err(|e| self.request_error(e))?;

        let (status, bytes) = self.send(request).await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: OPENAI_PROVIDER_ID.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        parse_chat_completion(&bytes)
    }

    async fn is_available(&self) -> bool {
        let request = match Request::builder()
            .method(Method::GET)
            .uri(MODELS_URL)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(Full::new(Bytes::new()))
        {
            Ok(request) => request,
            Err(_) => return false,
        };

        match self.send(request).await {
            Ok((status, _)) => status.is_success(),
            Err(e) => {
                debug!(error = %e, "OpenAI availability probe failed");
                false
            }
        }
    }
}

/// Extracts the generated text and token usage from a chat-completion body.
fn parse_chat_completion(bytes: &[u8]) -> Result<GenerationResult, ProviderError> {
    let body: Value = serde_json::from_slice(bytes).map_err(|e| ProviderError::Request {
        provider: OPENAI_PROVIDER_ID.to_string(),
        message: format!("malformed response body: {e}"),
    })?;

    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ProviderError::EmptyResponse {
            provider: OPENAI_PROVIDER_ID.to_string(),
        })?;

    let tokens_used = body["usage"]["total_tokens"].as_u64().map(|n| n as u32);

    Ok(GenerationResult {
        content: content.to_string(),
        provider_id: OPENAI_PROVIDER_ID.to_string(),
        tokens_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_and_usage() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Generated text" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 30, "total_tokens": 42 }
        });

        let result = parse_chat_completion(body.to_string().as_bytes()).unwrap();
        assert_eq!(result.content, "Generated text");
        assert_eq!(result.provider_id, OPENAI_PROVIDER_ID);
        assert_eq!(result.tokens_used, Some(42));
    }

    #[test]
    fn missing_usage_is_not_an_error() {
        let body = json!({
            "choices": [{ "message": { "content": "hi" } }]
        });

        let result = parse_chat_completion(body.to_string().as_bytes()).unwrap();
        assert_eq!(result.tokens_used, None);
    }

    #[test]
    fn empty_choices_is_empty_response() {
        let body = json!({ "choices": [] });

        let err = parse_chat_completion(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
        assert_eq!(err.provider(), OPENAI_PROVIDER_ID);
    }

    #[test]
    fn empty_content_is_empty_response() {
        let body = json!({
            "choices": [{ "message": { "content": "" } }]
        });

        let err = parse_chat_completion(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
    }

    #[test]
    fn garbage_body_is_a_request_error() {
        let err = parse_chat_completion(b"not json").unwrap_err();
        assert!(matches!(err, ProviderError::Request { .. }));
    }
}
