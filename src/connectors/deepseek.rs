// src/connectors/deepseek.rs
use crate::config::SignalConfig;
use crate::connectors::messages::{ApiErrorResponse, ChatMessage, ChatRequest, ChatResponse};
use crate::connectors::traits::SignalSource;
use crate::error::{SignalError, SignalErrorKind};
use crate::types::{IndicatorSnapshot, Signal};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{error, info, warn};

const SYSTEM_PROMPT: &str =
    "You are a trading signal generator. Your only output is 'buy', 'sell', or 'hold'.";

/// Chat-completion backed signal source.
pub struct DeepSeekClient {
    http_client: Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl DeepSeekClient {
    pub fn new(config: &SignalConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            http_client: builder.build()?,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, indicators: &IndicatorSnapshot) -> Result<ChatRequest, SignalError> {
        let rendered = serde_json::to_string(indicators).map_err(|e| {
            SignalError::new(
                SignalErrorKind::UnexpectedError,
                format!("Failed to render indicators: {}", e),
            )
        })?;
        let prompt = format!(
            "Given the following technical indicator values:\n{}\n\n\
             Based on these values, provide a trading signal. \
             Respond with only one word: 'buy', 'sell', or 'hold'.",
            rendered
        );

        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        })
    }
}

#[async_trait]
impl SignalSource for DeepSeekClient {
    async fn fetch_signal(&self, indicators: &IndicatorSnapshot) -> Result<Signal, SignalError> {
        let request = self.build_request(indicators)?;

        info!("Requesting trading signal from {}", self.api_url);
        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = classify_transport_error(&e);
                error!("Signal request failed: {}", err);
                err
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            let err = classify_transport_error(&e);
            error!("Failed to read signal response body: {}", err);
            err
        })?;

        let result = interpret_response(status, &body);
        match &result {
            Ok(signal) => info!("Received signal: {}", signal),
            Err(e) => warn!("Signal rejected: {}", e),
        }
        result
    }
}

fn classify_transport_error(e: &reqwest::Error) -> SignalError {
    if e.is_builder() {
        SignalError::new(
            SignalErrorKind::UnexpectedError,
            format!("An unexpected error occurred during signal API call: {}", e),
        )
    } else {
        SignalError::new(
            SignalErrorKind::NetworkError,
            format!("Network error during signal API call: {}", e),
        )
    }
}

/// Maps a completed HTTP exchange onto the signal contract.
pub fn interpret_response(status: StatusCode, body: &str) -> Result<Signal, SignalError> {
    if !status.is_success() {
        let envelope = serde_json::from_str::<ApiErrorResponse>(body).ok();
        let detail = envelope
            .as_ref()
            .map(|env| env.error.message.as_str())
            .unwrap_or(body);
        let err = SignalError::new(
            SignalErrorKind::HttpError,
            format!("HTTP error from signal API: {} - {}", status.as_u16(), detail),
        );
        return Err(match envelope {
            Some(env) => err.with_upstream_type(env.error.kind),
            None => err,
        });
    }

    let completion: ChatResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(parse_err) => {
            return Err(match serde_json::from_str::<ApiErrorResponse>(body) {
                Ok(env) => SignalError::new(SignalErrorKind::ValidationError, env.error.message)
                    .with_upstream_type(env.error.kind),
                Err(_) => SignalError::new(
                    SignalErrorKind::ValidationError,
                    format!("Failed to parse signal response ({}): {}", parse_err, body),
                ),
            });
        }
    };

    let content = completion
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_deref())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| {
            SignalError::new(SignalErrorKind::ParsingError, "No signal found in response.")
        })?;

    content.parse::<Signal>().map_err(|_| {
        SignalError::new(
            SignalErrorKind::ParsingError,
            format!("Unexpected signal format: {}", content.trim().to_lowercase()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(content: &str) -> String {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1678886400,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        })
        .to_string()
    }

    fn test_config(api_url: &str) -> SignalConfig {
        SignalConfig {
            api_key: "test_key".to_string(),
            api_url: api_url.to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_tokens: 150,
            request_timeout_secs: Some(5),
        }
    }

    #[test]
    fn accepts_each_signal_word() {
        assert_eq!(interpret_response(StatusCode::OK, &completion("buy")), Ok(Signal::Buy));
        assert_eq!(interpret_response(StatusCode::OK, &completion("sell")), Ok(Signal::Sell));
        assert_eq!(interpret_response(StatusCode::OK, &completion(" Hold\n")), Ok(Signal::Hold));
    }

    #[test]
    fn auth_failure_is_http_error_with_upstream_message() {
        let body = r#"{"error":{"message":"Invalid API key","type":"authentication_error","code":"invalid_api_key"}}"#;
        let err = interpret_response(StatusCode::UNAUTHORIZED, body).unwrap_err();
        assert_eq!(err.kind, SignalErrorKind::HttpError);
        assert!(err.message.contains("Invalid API key"));
        assert!(err.message.contains("401"));
        assert_eq!(err.upstream_type.as_deref(), Some("authentication_error"));
    }

    #[test]
    fn non_json_failure_body_is_kept_verbatim() {
        let err = interpret_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert_eq!(err.kind, SignalErrorKind::HttpError);
        assert!(err.message.contains("upstream down"));
        assert_eq!(err.upstream_type, None);
    }

    #[test]
    fn unexpected_word_is_parsing_error() {
        let err = interpret_response(StatusCode::OK, &completion("unexpected_format")).unwrap_err();
        assert_eq!(err.kind, SignalErrorKind::ParsingError);
        assert!(err.message.contains("Unexpected signal format"));
    }

    #[test]
    fn empty_choices_and_empty_content_are_parsing_errors() {
        let empty_choices = r#"{"id":"x","choices":[],"usage":{}}"#;
        let err = interpret_response(StatusCode::OK, empty_choices).unwrap_err();
        assert_eq!(err.kind, SignalErrorKind::ParsingError);
        assert!(err.message.contains("No signal found in response."));

        let err = interpret_response(StatusCode::OK, &completion("")).unwrap_err();
        assert_eq!(err.kind, SignalErrorKind::ParsingError);
        assert!(err.message.contains("No signal found in response."));
    }

    #[test]
    fn malformed_success_body_is_validation_error() {
        let err = interpret_response(StatusCode::OK, r#"{"unexpected": true}"#).unwrap_err();
        assert_eq!(err.kind, SignalErrorKind::ValidationError);

        let envelope = r#"{"error":{"message":"model overloaded","type":"server_error"}}"#;
        let err = interpret_response(StatusCode::OK, envelope).unwrap_err();
        assert_eq!(err.kind, SignalErrorKind::ValidationError);
        assert_eq!(err.message, "model overloaded");
        assert_eq!(err.upstream_type.as_deref(), Some("server_error"));
    }

    #[test]
    fn request_body_has_chat_completion_shape() {
        let client = DeepSeekClient::new(&test_config("http://localhost/chat")).unwrap();
        let indicators: IndicatorSnapshot = vec![("rsi_14", 30.0)].into_iter().collect();
        let body = serde_json::to_value(client.build_request(&indicators).unwrap()).unwrap();

        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("\"rsi_14\":30.0"));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let client = DeepSeekClient::new(&test_config("http://127.0.0.1:1/chat/completions")).unwrap();
        let indicators: IndicatorSnapshot = vec![("rsi_14", 50.0)].into_iter().collect();

        let err = client.fetch_signal(&indicators).await.unwrap_err();
        assert_eq!(err.kind, SignalErrorKind::NetworkError);
    }
}
