use crate::ai::{ChatMessage, GenerationError, GenerationErrorKind, ResponseGenerator};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Single-attempt OpenAI chat-completions client.
pub struct OpenAIClient {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAIClient {
    pub fn new(
        api_key: &str,
        endpoint: Option<&str>,
        model: &str,
    ) -> Result<Self, GenerationError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| {
                GenerationError::new(
                    GenerationErrorKind::AuthFailure,
                    format!("Invalid API key format: {}", e),
                )
            })?;
        headers.insert(header::AUTHORIZATION, auth_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| {
                GenerationError::new(
                    GenerationErrorKind::Unknown,
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            model: model.to_string(),
        })
    }

    fn classify_status(status: StatusCode, body: &str) -> GenerationErrorKind {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationErrorKind::AuthFailure,
            StatusCode::TOO_MANY_REQUESTS => {
                if body.contains("insufficient_quota") {
                    GenerationErrorKind::QuotaExceeded
                } else {
                    GenerationErrorKind::RateLimited
                }
            }
            StatusCode::REQUEST_TIMEOUT => GenerationErrorKind::TransientServiceError,
            s if s.is_server_error() => GenerationErrorKind::TransientServiceError,
            _ => GenerationErrorKind::Unknown,
        }
    }
}

#[async_trait]
impl ResponseGenerator for OpenAIClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        log::debug!(
            "Sending request to OpenAI API: model={} messages={}",
            self.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() || e.is_connect() {
                    GenerationErrorKind::TransientServiceError
                } else {
                    GenerationErrorKind::Unknown
                };
                GenerationError::new(kind, format!("OpenAI API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.clone());
            return Err(GenerationError::new(
                Self::classify_status(status, &body),
                format!("OpenAI API error ({}): {}", status, message),
            ));
        }

        let data: ChatCompletionResponse = response.json().await.map_err(|e| {
            GenerationError::new(
                GenerationErrorKind::Unknown,
                format!("Failed to parse OpenAI response: {}", e),
            )
        })?;

        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let content = content.trim();

        // The Messages UI swallows empty sends; substitute a placeholder.
        if content.is_empty() {
            return Ok("\u{2026}".to_string());
        }
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            OpenAIClient::classify_status(StatusCode::UNAUTHORIZED, ""),
            GenerationErrorKind::AuthFailure
        );
        assert_eq!(
            OpenAIClient::classify_status(StatusCode::FORBIDDEN, ""),
            GenerationErrorKind::AuthFailure
        );
        assert_eq!(
            OpenAIClient::classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            GenerationErrorKind::RateLimited
        );
        assert_eq!(
            OpenAIClient::classify_status(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"message":"...","code":"insufficient_quota"}}"#
            ),
            GenerationErrorKind::QuotaExceeded
        );
        assert_eq!(
            OpenAIClient::classify_status(StatusCode::INTERNAL_SERVER_ERROR, ""),
            GenerationErrorKind::TransientServiceError
        );
        assert_eq!(
            OpenAIClient::classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            GenerationErrorKind::TransientServiceError
        );
        assert_eq!(
            OpenAIClient::classify_status(StatusCode::REQUEST_TIMEOUT, ""),
            GenerationErrorKind::TransientServiceError
        );
        assert_eq!(
            OpenAIClient::classify_status(StatusCode::BAD_REQUEST, ""),
            GenerationErrorKind::Unknown
        );
    }

    #[test]
    fn test_rejects_unprintable_api_key() {
        assert!(OpenAIClient::new("sk-test", None, "gpt-4o-mini").is_ok());
        assert!(OpenAIClient::new("bad\nkey", None, "gpt-4o-mini").is_err());
    }
}
