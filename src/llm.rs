use crate::config::LlmConfig;
use crate::error::{LlmError, PipelineError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Text-generation backend: prompt in, text out.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Builds the configured backend. Fails before any network call when no credential is present.
pub fn create_llm(config: &LlmConfig) -> Result<Box<dyn LlmClient>, PipelineError> {
    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            PipelineError::AuthenticationError(format!(
                "no API key configured for provider '{}'",
                config.provider
            ))
        })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
        .map_err(|e| PipelineError::GenerationError(format!("HTTP client: {}", e)))?;

    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiClient::new(
            client,
            api_key,
            &config.model,
            config.base_url.as_deref(),
        ))),
        "openai" => Ok(Box::new(OpenAIClient::new(
            client,
            api_key,
            &config.model,
            config.base_url.as_deref(),
        ))),
        other => Err(PipelineError::ConfigurationInvalid(format!(
            "unknown LLM provider: {}",
            other
        ))),
    }
}

fn classify_status(provider: &str, status: StatusCode, body: &str) -> LlmError {
    let message = format!("{} API error ({}): {}", provider, status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => LlmError::Transient(message),
        s if s.is_server_error() => LlmError::Transient(message),
        _ => LlmError::Permanent(message),
    }
}

// --- Gemini ---
#[derive(Debug)]
struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    fn new(client: reqwest::Client, api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://generativelanguage.googleapis.com/v1beta")
                .trim_end_matches('/')
                .to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

fn parse_gemini_response(body: &str) -> Result<String, LlmError> {
    let result: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::Permanent(format!("Failed to parse Gemini response: {}. Body: {}", e, body))
    })?;

    if let Some(err) = result.error {
        return Err(LlmError::Permanent(format!(
            "Gemini API returned error: {}",
            err.message
        )));
    }

    let first = result
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .ok_or_else(|| {
            LlmError::Permanent(format!("Gemini response has no candidates. Body: {}", body))
        })?;

    let text: String = first
        .content
        .as_ref()
        .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(LlmError::Permanent(format!(
            "Gemini response empty. Finish reason: {}",
            reason
        )));
    }
    Ok(text)
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(classify_status("Gemini", status, &body));
        }
        parse_gemini_response(&body)
    }
}

// --- OpenAI ---

#[derive(Debug)]
struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(client: reqwest::Client, api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

fn parse_openai_response(body: &str) -> Result<String, LlmError> {
    let result: OpenAIResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::Permanent(format!("Failed to parse OpenAI response: {}. Body: {}", e, body))
    })?;
    result
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LlmError::Permanent("OpenAI response empty or missing content".to_string()))
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(classify_status("OpenAI", status, &body));
        }
        parse_openai_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_authentication_error() {
        let config = LlmConfig::default();
        let err = create_llm(&config).unwrap_err();
        assert!(matches!(err, PipelineError::AuthenticationError(_)));

        let config = LlmConfig {
            api_key: Some("   ".to_string()),
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_llm(&config).unwrap_err(),
            PipelineError::AuthenticationError(_)
        ));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = LlmConfig {
            provider: "mystery".to_string(),
            api_key: Some("key".to_string()),
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_llm(&config).unwrap_err(),
            PipelineError::ConfigurationInvalid(_)
        ));
    }

    #[test]
    fn test_known_providers_build() {
        for provider in ["gemini", "openai"] {
            let config = LlmConfig {
                provider: provider.to_string(),
                api_key: Some("key".to_string()),
                ..LlmConfig::default()
            };
            assert!(create_llm(&config).is_ok());
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status("Gemini", StatusCode::UNAUTHORIZED, ""),
            LlmError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status("Gemini", StatusCode::FORBIDDEN, ""),
            LlmError::Unauthorized(_)
        ));
        assert!(classify_status("Gemini", StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(classify_status("Gemini", StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!classify_status("Gemini", StatusCode::BAD_REQUEST, "").is_retryable());
    }

    #[test]
    fn test_gemini_response_parsing_success() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "Did you know " },
                            { "text": "Marcus Aurelius journaled?" }
                        ],
                        "role": "model"
                    },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        }"#;

        assert_eq!(
            parse_gemini_response(json).unwrap(),
            "Did you know Marcus Aurelius journaled?"
        );
    }

    #[test]
    fn test_gemini_response_parsing_safety_block() {
        let json = r#"{
            "candidates": [
                {
                    "finishReason": "SAFETY",
                    "index": 0
                }
            ]
        }"#;

        let err = parse_gemini_response(json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_gemini_error_body() {
        let json = r#"{ "error": { "code": 400, "message": "API key not valid" } }"#;
        let err = parse_gemini_response(json).unwrap_err();
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn test_malformed_body_is_permanent() {
        let err = parse_gemini_response("<html>oops</html>").unwrap_err();
        assert!(matches!(err, LlmError::Permanent(_)));
    }

    #[test]
    fn test_openai_response_parsing_success() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Stoicism in sixty seconds."
                },
                "finish_reason": "stop"
            }]
        }"#;

        assert_eq!(parse_openai_response(json).unwrap(), "Stoicism in sixty seconds.");
    }

    #[test]
    fn test_openai_missing_content() {
        let json = r#"{ "choices": [{ "message": { "role": "assistant", "content": null } }] }"#;
        assert!(parse_openai_response(json).is_err());
    }
}
