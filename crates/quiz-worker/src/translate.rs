//! Translation of quiz text for bilingual videos.
//!
//! [`translate_or_fallback`] is the only entry point the pipeline uses; it
//! always yields a complete [`Translation`], falling back to the source text
//! field by field.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use quiz_models::{QuizScript, Translation, TranslationRequest};

use crate::error::TranslateError;

/// Translates quiz text into the secondary language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> Result<Translation, TranslateError>;
}

/// Translate a script, never failing.
///
/// Any translator error yields the source text in every field. Choices the
/// translator left out keep their source titles.
pub async fn translate_or_fallback(
    translator: Option<&dyn Translator>,
    script: &QuizScript,
) -> Translation {
    let Some(translator) = translator else {
        debug!("No translator configured, using source text");
        return Translation::source_fallback(script);
    };

    match translator.translate(&script.translation_request()).await {
        Ok(translation) => translation.completed_from(script),
        Err(e) => {
            warn!(error = %e, retryable = e.is_retryable(), "Translation failed, using source text");
            Translation::source_fallback(script)
        }
    }
}

/// Gemini translator configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Tried in order until one answers
    pub models: Vec<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            models: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.5-flash-lite".to_string(),
                "gemini-2.5-pro".to_string(),
            ],
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, TranslateError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| TranslateError::Config("GEMINI_API_KEY not set".to_string()))?;
        let defaults = Self::default();

        Ok(Self {
            api_key,
            models: std::env::var("GEMINI_MODELS")
                .map(|s| {
                    s.split(',')
                        .map(|m| m.trim().to_string())
                        .filter(|m| !m.is_empty())
                        .collect::<Vec<_>>()
                })
                .ok()
                .filter(|models| !models.is_empty())
                .unwrap_or(defaults.models),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        })
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Translation JSON as the model writes it; choice keys are strings.
#[derive(Debug, Deserialize)]
struct TranslationBody {
    #[serde(default)]
    question: String,
    #[serde(default)]
    choices: BTreeMap<String, String>,
    #[serde(default)]
    end_message: Option<String>,
}

/// Translator backed by the Gemini `generateContent` API.
pub struct GeminiTranslator {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTranslator {
    pub fn new(config: GeminiConfig) -> Result<Self, TranslateError> {
        if config.api_key.trim().is_empty() {
            return Err(TranslateError::Config("Gemini API key is empty".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, TranslateError> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn build_prompt(request: &TranslationRequest) -> String {
        let choices = request
            .choices
            .iter()
            .map(|c| format!("{}. {}", c.number, c.text))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Translate this Japanese quiz into natural, short English suitable for on-screen captions.

QUESTION:
{question}

CHOICES:
{choices}

Return ONLY a single JSON object with this schema:
{{
  "question": "English question",
  "choices": {{ "1": "English choice 1", "2": "English choice 2" }}
}}
Use the choice numbers above as keys. Do not add commentary."#,
            question = request.question,
            choices = choices
        )
    }

    async fn call_model(&self, model: &str, prompt: &str) -> Result<Translation, TranslateError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| TranslateError::invalid_response("No content in Gemini response"))?;

        parse_translation(text)
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<Translation, TranslateError> {
        let prompt = Self::build_prompt(request);
        let mut last_error = None;

        for model in &self.config.models {
            debug!(model = %model, "Requesting translation");
            match self.call_model(model, &prompt).await {
                Ok(translation) => {
                    info!(model = %model, "Translation received");
                    return Ok(translation);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Translation model failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| TranslateError::Config("no Gemini models configured".to_string())))
    }
}

/// Parse the model's JSON answer, tolerating markdown code fences.
pub fn parse_translation(text: &str) -> Result<Translation, TranslateError> {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text).trim();

    let body: TranslationBody = serde_json::from_str(text)?;

    let choices = body
        .choices
        .into_iter()
        .filter_map(|(key, value)| match key.trim().parse::<u32>() {
            Ok(number) => Some((number, value)),
            Err(_) => {
                debug!(key = %key, "Ignoring non-numeric choice key");
                None
            }
        })
        .collect();

    Ok(Translation {
        question: body.question,
        choices,
        end_message: body.end_message.filter(|m| !m.trim().is_empty()),
        is_fallback: false,
    })
}
