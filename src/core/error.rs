//! Error types for the generation pipeline, one per stage. A
//! [`RenderFailure`] skips one page; a [`PlanningFailure`] ends the run.

use crate::core::state::GenerationStatus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("child's name must not be empty")]
    EmptyChildName,

    #[error("theme must not be empty")]
    EmptyTheme,
}

/// Only transport problems escape the planner; unparseable output falls back
/// to templated scenes instead.
#[derive(Debug, Error)]
pub enum PlanningFailure {
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RenderFailure {
    #[error("model refused: {0}")]
    Refused(String),

    #[error("no image produced")]
    NoImage,

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl RenderFailure {
    pub fn reason(&self) -> String {
        match self {
            RenderFailure::Refused(text) => text.clone(),
            RenderFailure::NoImage => "no image produced".to_string(),
            RenderFailure::Transport(err) => format!("{:#}", err),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssemblyFailure {
    #[error("image payload is not valid base64: {0}")]
    Payload(#[from] base64::DecodeError),

    #[error("image could not be decoded: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported image type: {0}")]
    UnsupportedMime(String),

    #[error("PDF could not be written: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF output failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ChatFailure {
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("a run can only start from idle (current status: {0})")]
    NotIdle(GenerationStatus),

    #[error("planning failed: {0}")]
    Planning(#[from] PlanningFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_failure_reasons() {
        assert_eq!(RenderFailure::NoImage.reason(), "no image produced");
        assert_eq!(
            RenderFailure::Refused("I can't draw that".to_string()).reason(),
            "I can't draw that"
        );
        let transport = RenderFailure::from(anyhow::anyhow!("connection reset"));
        assert_eq!(transport.reason(), "connection reset");
    }

    #[test]
    fn test_run_error_display() {
        let err = RunError::NotIdle(GenerationStatus::Complete);
        assert_eq!(
            err.to_string(),
            "a run can only start from idle (current status: complete)"
        );
    }
}
