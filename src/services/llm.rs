use crate::core::config::{Config, GeminiConfig};
use crate::core::state::Role;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use url::Url;

// --- Request model ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
    BlockNone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    /// Blocks only high-probability harm in all four categories, so ordinary
    /// children's scenes are not refused.
    pub fn permissive() -> Vec<SafetySetting> {
        [
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ]
        .into_iter()
        .map(|category| SafetySetting {
            category,
            threshold: HarmBlockThreshold::BlockOnlyHigh,
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct TextRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub history: Vec<Turn>,
    /// When set, the backend is asked for JSON matching this schema.
    pub response_schema: Option<serde_json::Value>,
    pub safety: Vec<SafetySetting>,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageRequest {
    pub prompt: String,
    pub safety: Vec<SafetySetting>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineImage {
        mime_type: Option<String>,
        data: String,
    },
}

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// Returns the generated text, or an empty string when the backend
    /// produced none.
    async fn generate_text(&self, request: &TextRequest) -> Result<String>;

    /// Returns the content parts of the first candidate, in order.
    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<ContentPart>>;
}

pub fn create_llm(config: &Config) -> Result<Arc<dyn LlmClient>> {
    match config.llm.provider.as_str() {
        "gemini" => {
            let cfg = &config.llm.gemini;
            if cfg.api_key.trim().is_empty() {
                return Err(anyhow!(
                    "Gemini API key missing. Set llm.gemini.api_key in config.yml or the GEMINI_API_KEY environment variable."
                ));
            }
            Ok(Arc::new(GeminiClient::new(cfg)))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.llm.provider)),
    }
}

// --- Gemini ---

#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    image_model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> Self {
        Self {
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            image_model: cfg.image_model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, model: &str) -> Result<Url> {
        let raw = format!("{}/models/{}:generateContent", self.base_url, model);
        Url::parse_with_params(&raw, &[("key", self.api_key.as_str())])
            .with_context(|| format!("Invalid Gemini endpoint: {}", raw))
    }

    async fn post(&self, model: &str, body: &GeminiRequest) -> Result<GeminiCandidate> {
        let url = self.endpoint(model)?;
        let resp = self.client.post(url).json(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            anyhow!("Failed to parse Gemini response: {}. Body: {}", e, response_text)
        })?;

        first_candidate(result)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn user_content(text: &str) -> GeminiContent {
    GeminiContent {
        role: "user".to_string(),
        parts: vec![GeminiPart {
            text: text.to_string(),
        }],
    }
}

impl GeminiRequest {
    fn for_text(request: &TextRequest) -> Self {
        let mut contents: Vec<GeminiContent> = request
            .history
            .iter()
            .map(|turn| GeminiContent {
                role: role_name(turn.role).to_string(),
                parts: vec![GeminiPart {
                    text: turn.text.clone(),
                }],
            })
            .collect();
        contents.push(user_content(&request.prompt));

        let generation_config = request
            .response_schema
            .as_ref()
            .map(|schema| GeminiGenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema.clone()),
                response_modalities: None,
            });

        Self {
            contents,
            system_instruction: request.system.as_ref().map(|s| GeminiSystemInstruction {
                parts: vec![GeminiPart { text: s.clone() }],
            }),
            generation_config,
            safety_settings: request.safety.clone(),
        }
    }

    fn for_image(request: &ImageRequest) -> Self {
        Self {
            contents: vec![user_content(&request.prompt)],
            system_instruction: None,
            generation_config: Some(GeminiGenerationConfig {
                response_mime_type: None,
                response_schema: None,
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            }),
            safety_settings: request.safety.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "inline_data")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

/// A blocked prompt comes back without candidates; that is reported as an
/// empty candidate so callers see "no output" rather than a transport error.
fn first_candidate(result: GeminiResponse) -> Result<GeminiCandidate> {
    if let Some(err) = result.error {
        return Err(anyhow!("Gemini API returned error: {}", err.message));
    }

    match result.candidates.and_then(|c| c.into_iter().next()) {
        Some(candidate) => Ok(candidate),
        None => {
            let reason = result
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "UNKNOWN".to_string());
            log::warn!("Gemini returned no candidates. Block reason: {}", reason);
            Ok(GeminiCandidate::default())
        }
    }
}

fn candidate_text(candidate: &GeminiCandidate) -> String {
    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
        log::warn!("Gemini response has no text. Finish reason: {}", reason);
    }
    text
}

fn candidate_parts(candidate: GeminiCandidate) -> Vec<ContentPart> {
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut out = Vec::new();
    for part in parts {
        if let Some(inline) = part.inline_data {
            if !inline.data.is_empty() {
                out.push(ContentPart::InlineImage {
                    mime_type: inline.mime_type.filter(|m| !m.is_empty()),
                    data: inline.data,
                });
            }
        }
        if let Some(text) = part.text {
            if !text.trim().is_empty() {
                out.push(ContentPart::Text(text));
            }
        }
    }
    out
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate_text(&self, request: &TextRequest) -> Result<String> {
        let body = GeminiRequest::for_text(request);
        let candidate = self.post(&self.model, &body).await?;
        Ok(candidate_text(&candidate))
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<ContentPart>> {
        let body = GeminiRequest::for_image(request);
        let candidate = self.post(&self.image_model, &body).await?;
        Ok(candidate_parts(candidate))
    }
}
