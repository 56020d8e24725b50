use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{CompletionProvider, ProviderError};
use crate::prompt::Prompt;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Google Generative Language REST client.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: RwLock<String>,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("failed to build configured http client, using defaults: {err}");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: RwLock::new(config.model),
        }
    }

    pub fn model(&self) -> String {
        self.model
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Switches the model used by subsequent requests.
    pub fn set_model(&self, model: &str) {
        let model = model.trim();
        if model.is_empty() {
            return;
        }
        *self
            .model
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = model.to_string();
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model())
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    async fn generate(&self, prompt: &Prompt, credential: &str) -> Result<String, ProviderError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.as_str(),
                }],
            }],
        };

        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, credential)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Malformed(err.to_string()))?;
        debug!(model = %self.model(), "gemini completion received");
        extract_text(parsed)
    }

    async fn list_one_model(&self, credential: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.models_url())
            .header(API_KEY_HEADER, credential)
            .query(&[("pageSize", "1")])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }
}

impl CompletionProvider for GeminiProvider {
    async fn complete(&self, prompt: &Prompt, credential: &str) -> Result<String, ProviderError> {
        self.generate(prompt, credential).await
    }

    async fn verify(&self, credential: &str) -> Result<(), ProviderError> {
        self.list_one_model(credential).await
    }
}

fn classify_status(status: u16, body: &str) -> ProviderError {
    let message = extract_error_message(body).unwrap_or_else(|| body.trim().to_string());
    match status {
        503 => ProviderError::Overloaded(message),
        401 | 403 => ProviderError::InvalidCredential(message),
        400 if body.contains("API_KEY_INVALID") || body.contains("API key not valid") => {
            ProviderError::InvalidCredential(message)
        }
        400..=499 => ProviderError::BadRequest(format!("{status}: {message}")),
        _ => ProviderError::Status { status, message },
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    value
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(|message| message.as_str())
        .map(str::to_string)
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    let texts: Vec<String> = parts.into_iter().filter_map(|part| part.text).collect();
    if texts.is_empty() {
        return Err(ProviderError::Malformed(
            "response did not contain any text".to_string(),
        ));
    }
    Ok(texts.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(payload: &str) -> GenerateContentResponse {
        serde_json::from_str(payload).expect("response should parse")
    }

    #[test]
    fn overloaded_status_is_transient() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded. Please try again later.","status":"UNAVAILABLE"}}"#;
        assert_eq!(
            classify_status(503, body),
            ProviderError::Overloaded("The model is overloaded. Please try again later.".into())
        );
    }

    #[test]
    fn invalid_key_is_a_credential_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        assert!(matches!(
            classify_status(400, body),
            ProviderError::InvalidCredential(_)
        ));
        assert!(matches!(
            classify_status(403, "forbidden"),
            ProviderError::InvalidCredential(_)
        ));
    }

    #[test]
    fn other_statuses_are_permanent() {
        assert!(matches!(
            classify_status(404, r#"{"error":{"message":"model not found"}}"#),
            ProviderError::BadRequest(message) if message.contains("model not found")
        ));
        assert!(matches!(
            classify_status(500, "internal"),
            ProviderError::Status { status: 500, .. }
        ));
    }

    #[test]
    fn text_parts_are_concatenated() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"Photosynthesis "},{"text":"converts light."}],"role":"model"}}]}"#,
        );
        assert_eq!(
            extract_text(response),
            Ok("Photosynthesis converts light.".to_string())
        );
    }

    #[test]
    fn response_without_text_is_malformed() {
        let response = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert!(matches!(
            extract_text(response),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            extract_text(parse("{}")),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn request_body_matches_api_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
        };
        let serialized = serde_json::to_string(&body).expect("body should serialize");
        assert_eq!(serialized, r#"{"contents":[{"parts":[{"text":"hello"}]}]}"#);
    }

    #[test]
    fn urls_use_configured_model() {
        let provider = GeminiProvider::new(GeminiConfig {
            base_url: "http://localhost:9999/v1beta/".to_string(),
            model: "gemini-test".to_string(),
            ..GeminiConfig::default()
        });
        assert_eq!(
            provider.generate_url(),
            "http://localhost:9999/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(provider.models_url(), "http://localhost:9999/v1beta/models");
    }

    #[test]
    fn model_can_be_switched_but_not_blanked() {
        let provider = GeminiProvider::new(GeminiConfig::default());
        provider.set_model("gemini-2.5-pro");
        provider.set_model("   ");
        assert_eq!(provider.model(), "gemini-2.5-pro");
        assert!(provider.generate_url().ends_with("/models/gemini-2.5-pro:generateContent"));
    }
}
