use crate::core::error::RequestError;
use crate::utils::data_uri::ImagePayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user asked for. Both fields are trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    child_name: String,
    theme: String,
}

impl GenerationRequest {
    pub fn new(child_name: &str, theme: &str) -> Result<Self, RequestError> {
        let child_name = child_name.trim();
        let theme = theme.trim();
        if child_name.is_empty() {
            return Err(RequestError::EmptyChildName);
        }
        if theme.is_empty() {
            return Err(RequestError::EmptyTheme);
        }
        Ok(Self {
            child_name: child_name.to_string(),
            theme: theme.to_string(),
        })
    }

    pub fn child_name(&self) -> &str {
        &self.child_name
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }
}

/// One page's subject. Used as the image prompt and as the page caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenePrompt(pub String);

impl ScenePrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScenePrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScenePrompt {
    fn from(s: &str) -> Self {
        ScenePrompt(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub id: String,
    pub image: ImagePayload,
    pub prompt: ScenePrompt,
}

impl RenderedPage {
    pub fn new(index: usize, image: ImagePayload, prompt: ScenePrompt) -> Self {
        Self {
            id: format!("img-{}-{}", Utc::now().timestamp_millis(), index),
            image,
            prompt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Planning,
    Generating,
    Complete,
    Error,
}

impl GenerationStatus {
    pub fn is_busy(self) -> bool {
        matches!(self, GenerationStatus::Planning | GenerationStatus::Generating)
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationStatus::Idle => "idle",
            GenerationStatus::Planning => "planning",
            GenerationStatus::Generating => "generating",
            GenerationStatus::Complete => "complete",
            GenerationStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationState {
    pub status: GenerationStatus,
    pub message: String,
    /// Percent of planned pages attempted, 0..=100.
    pub progress: u8,
}

/// A decorative cover image drawn at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub image: ImagePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CoverChoice {
    #[default]
    None,
    Preset(CoverPreset),
    Upload(ImagePayload),
}

impl CoverChoice {
    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            CoverChoice::None => None,
            CoverChoice::Preset(preset) => Some(&preset.image),
            CoverChoice::Upload(image) => Some(image),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
