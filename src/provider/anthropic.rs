use crate::provider::core::{GenerationResult, ProviderAdapter, ProviderError};
use crate::provider::http::{HttpClient, build_https_client, collect_body};
use async_trait::async_trait;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::bytes::Bytes;

pub const ANTHROPIC_PROVIDER_ID: &str = "claude";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for the Anthropic messages API.
#[derive(Debug)]
pub struct AnthropicAdapter {
    client: HttpClient,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    request_timeout: Duration,
}

impl AnthropicAdapter {
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
            provider: ANTHROPIC_PROVIDER_ID.to_string(),
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
                provider: ANTHROPIC_PROVIDER_ID.to_string(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &str {
        ANTHROPIC_PROVIDER_ID
    }

    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> Result<GenerationResult, ProviderError> {
        let body = json!({
            "model": ANTHROPIC_MODEL,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system_prompt,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri(MESSAGES_URL)
            .header(CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .body(Full::new(Bytes::from(body.to_string())))
            .map_err(|e| self.request_error(e))?;

        let (status, bytes) = self.send(request).await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: ANTHROPIC_PROVIDER_ID.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        parse_message(&bytes)
    }

    async fn is_available(&self) -> bool {
        // A key-validity probe would cost a billable request, so the check
        // only verifies that a key is present at all.
        !self.api_key.is_empty()
    }
}

/// Extracts the first text block and token usage from a messages-API body.
fn parse_message(bytes: &[u8]) -> Result<GenerationResult, ProviderError> {
    let body: Value = serde_json::from_slice(bytes).map_err(|e| ProviderError::Request {
        provider: ANTHROPIC_PROVIDER_ID.to_string(),
        message: format!("malformed response body: {e}"),
    })?;

    let block = match body["content"].as_array().and_then(|blocks| blocks.first()) {
        Some(block) => block,
        None => {
            return Err(ProviderError::EmptyResponse {
                provider: ANTHROPIC_PROVIDER_ID.to_string(),
            });
        }
    };

    if block["type"].as_str() != Some("text") {
        return Err(ProviderError::NonText {
            provider: ANTHROPIC_PROVIDER_ID.to_string(),
        });
    }

    let content = block["text"]
        .as_str()
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ProviderError::EmptyResponse {
            provider: ANTHROPIC_PROVIDER_ID.to_string(),
        })?;

    let tokens_used = match (
        body["usage"]["input_tokens"].as_u64(),
        body["usage"]["output_tokens"].as_u64(),
    ) {
        (Some(input), Some(output)) => Some((input + output) as u32),
        _ => None,
    };

    Ok(GenerationResult {
        content: content.to_string(),
        provider_id: ANTHROPIC_PROVIDER_ID.to_string(),
        tokens_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_block_and_sums_usage() {
        let body = json!({
            "content": [{ "type": "text", "text": "Generated text" }],
            "usage": { "input_tokens": 10, "output_tokens": 32 }
        });

        let result = parse_message(body.to_string().as_bytes()).unwrap();
        assert_eq!(result.content, "Generated text");
        assert_eq!(result.provider_id, ANTHROPIC_PROVIDER_ID);
        assert_eq!(result.tokens_used, Some(42));
    }

    #[test]
    fn empty_content_array_is_empty_response() {
        let body = json!({ "content": [] });

        let err = parse_message(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
        assert_eq!(err.provider(), ANTHROPIC_PROVIDER_ID);
    }

    #[test]
    fn tool_use_block_is_non_text() {
        let body = json!({
            "content": [{ "type": "tool_use", "id": "toolu_1", "name": "lookup" }]
        });

        let err = parse_message(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, ProviderError::NonText { .. }));
    }

    #[test]
    fn partial_usage_drops_token_count() {
        let body = json!({
            "content": [{ "type": "text", "text": "hi" }],
            "usage": { "output_tokens": 5 }
        });

        let result = parse_message(body.to_string().as_bytes()).unwrap();
        assert_eq!(result.tokens_used, None);
    }
}
