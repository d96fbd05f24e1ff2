//! Enrichment: short AI commentary on a new diary entry
//!
//! Provides an `Annotator` trait with implementations for:
//! - **Gemini**: one `generateContent` call per entry, no retries
//! - **Disabled**: used when no API key is configured
//!
//! Annotation is cosmetic: every failure is logged and turned into `None`, so
//! it can never fail or stall the write that follows it.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EnrichmentConfig;

/// Default prompt; `{text}` is replaced by the entry text with markup removed.
pub const DEFAULT_PROMPT: &str = "あなたは優しい日本語の先生です。次の日本語学習日記を書いた学生に、\
20字以内の短い日本語で励ましの一言を書いてください。\n\n{text}";

// ============================================================================
// Annotator trait
// ============================================================================

#[async_trait]
pub trait Annotator: Send + Sync {
    /// Commentary for `text`, or `None` if none could be produced.
    async fn annotate(&self, text: &str) -> Option<String>;

    /// Annotator name for logging.
    fn name(&self) -> &str;
}

/// Always returns `None`.
#[derive(Debug, Default, Clone)]
pub struct DisabledAnnotator;

#[async_trait]
impl Annotator for DisabledAnnotator {
    async fn annotate(&self, _text: &str) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Pick the annotator for the given configuration.
pub fn create_annotator(config: &EnrichmentConfig) -> Box<dyn Annotator> {
    match config.resolved_api_key() {
        Some(api_key) => match GeminiAnnotator::new(GeminiSettings::from_config(config, api_key)) {
            Ok(annotator) => Box::new(annotator),
            Err(e) => {
                tracing::warn!(error = %e, "Gemini annotator unavailable, commentary disabled");
                Box::new(DisabledAnnotator)
            }
        },
        None => {
            tracing::info!("No Gemini API key configured, commentary disabled");
            Box::new(DisabledAnnotator)
        }
    }
}

// ============================================================================
// Errors / settings
// ============================================================================

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing text in response")]
    MissingText,

    #[error("Missing API key")]
    MissingApiKey,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_output_tokens: u32,
    pub prompt: String,
}

impl GeminiSettings {
    pub fn from_config(config: &EnrichmentConfig, api_key: String) -> Self {
        Self {
            api_key,
            model: config.model.clone(),
            base_url: config.api_base.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            max_output_tokens: config.max_output_tokens,
            prompt: config
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiAnnotator
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiAnnotator {
    client: Client,
    settings: GeminiSettings,
}

impl GeminiAnnotator {
    pub fn new(settings: GeminiSettings) -> Result<Self, AnnotationError> {
        if settings.api_key.is_empty() {
            return Err(AnnotationError::MissingApiKey);
        }

        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self { client, settings })
    }

    pub fn build_prompt(&self, text: &str) -> String {
        self.settings.prompt.replace("{text}", &strip_markup(text))
    }

    /// One request, errors returned to the caller.
    pub async fn generate(&self, text: &str) -> Result<String, AnnotationError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model,
            self.settings.api_key
        );

        let request = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(self.build_prompt(text)),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.settings.max_output_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let (code, message) = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));
            return Err(AnnotationError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;
        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(AnnotationError::MissingText)
    }
}

#[async_trait]
impl Annotator for GeminiAnnotator {
    async fn annotate(&self, text: &str) -> Option<String> {
        if strip_markup(text).trim().is_empty() {
            return None;
        }
        match self.generate(text).await {
            Ok(commentary) => Some(commentary),
            Err(e) => {
                tracing::warn!(error = %e, "Gemini commentary failed, saving entry without it");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn strip_markup(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"));
    tags.replace_all(text, "").into_owned()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";

    fn settings(base_url: String) -> GeminiSettings {
        GeminiSettings {
            api_key: "test-key".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url,
            timeout: Duration::from_secs(2),
            max_output_tokens: 100,
            prompt: "Comment: {text}".to_string(),
        }
    }

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        })
    }

    #[tokio::test]
    async fn annotate_sends_prompt_and_trims_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(query_param("key", "test-key"))
            .and(body_json(serde_json::json!({
                "contents": [{ "parts": [{ "text": "Comment: 今日は良い一日でした" }] }],
                "generationConfig": { "maxOutputTokens": 100 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("  よくできました！\n")))
            .mount(&server)
            .await;

        let annotator = GeminiAnnotator::new(settings(server.uri())).unwrap();
        let result = annotator.annotate("<p>今日は良い一日でした</p>").await;
        assert_eq!(result.as_deref(), Some("よくできました！"));
    }

    #[tokio::test]
    async fn api_error_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "quota exceeded" }
            })))
            .mount(&server)
            .await;

        let annotator = GeminiAnnotator::new(settings(server.uri())).unwrap();
        assert!(annotator.annotate("hello").await.is_none());

        match annotator.generate("hello").await {
            Err(AnnotationError::Api { code, message }) => {
                assert_eq!(code, 429);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_reply_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let annotator = GeminiAnnotator::new(settings(server.uri())).unwrap();
        assert!(annotator.annotate("hello").await.is_none());
    }

    #[tokio::test]
    async fn slow_service_is_cut_off_by_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply("late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut s = settings(server.uri());
        s.timeout = Duration::from_millis(200);
        let annotator = GeminiAnnotator::new(s).unwrap();
        assert!(annotator.annotate("hello").await.is_none());
    }

    #[tokio::test]
    async fn empty_text_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("unused")))
            .expect(0)
            .mount(&server)
            .await;

        let annotator = GeminiAnnotator::new(settings(server.uri())).unwrap();
        assert!(annotator.annotate("  <br/> ").await.is_none());
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut s = settings("http://localhost".to_string());
        s.api_key.clear();
        assert!(matches!(
            GeminiAnnotator::new(s),
            Err(AnnotationError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn disabled_annotator_returns_none() {
        assert!(DisabledAnnotator.annotate("hello").await.is_none());
        assert_eq!(DisabledAnnotator.name(), "disabled");
    }

    #[test]
    fn markup_is_stripped() {
        assert_eq!(strip_markup("<b>漢字</b>を<br/>勉強"), "漢字を勉強");
    }
}
