//! Terminal front end: prompts, progress display and the chat loop.

use crate::core::io::Storage;
use crate::core::state::{CoverChoice, CoverPreset, GenerationRequest, GenerationStatus, Role};
use crate::services::chat::ChatSession;
use crate::services::cover::find_preset;
use crate::services::workflow::{GenerationSession, GenerationSnapshot};
use crate::utils::data_uri::ImagePayload;
use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Select, Text};
use std::path::Path;

pub const INSPIRATION: [&str; 3] = [
    "Underwater castle with mermaid cats",
    "Superheroes saving a vegetable city",
    "Friendly monsters baking cookies",
];

pub const NOTHING_TO_DOWNLOAD: &str = "Nothing to download: no pages were drawn.";

const UPLOAD_OPTION: &str = "Upload my own image";
const NO_COVER_OPTION: &str = "No cover image";

pub fn print_inspiration() {
    println!("Need inspiration? Try one of these:");
    for idea in INSPIRATION {
        println!("  - {}", idea);
    }
}

/// Asks for whatever is missing until both fields are non-blank.
pub fn prompt_request(name: Option<String>, theme: Option<String>) -> Result<GenerationRequest> {
    let mut name = name.unwrap_or_default();
    let mut theme = theme.unwrap_or_default();
    loop {
        if name.trim().is_empty() {
            name = Text::new("Child's name:").prompt()?;
        }
        if theme.trim().is_empty() {
            theme = Text::new("Coloring book theme:")
                .with_placeholder(INSPIRATION[0])
                .prompt()?;
        }
        match GenerationRequest::new(&name, &theme) {
            Ok(request) => return Ok(request),
            Err(e) => println!("{}", e),
        }
    }
}

/// Maps a `--cover` value onto a choice. `None` means nothing was given.
pub fn cover_from_arg(presets: &[CoverPreset], arg: Option<&str>) -> Result<Option<CoverChoice>> {
    match arg {
        None => Ok(None),
        Some("none") => Ok(Some(CoverChoice::None)),
        Some(id) => find_preset(presets, id)
            .map(|p| Some(CoverChoice::Preset(p.clone())))
            .ok_or_else(|| anyhow!("Unknown cover preset: {}", id)),
    }
}

pub async fn cover_from_file(storage: &dyn Storage, path: &Path) -> Result<CoverChoice> {
    let bytes = storage.read(&path.to_string_lossy()).await?;
    let image = ImagePayload::from_file_bytes(path, &bytes)?;
    log::info!("Using uploaded cover {} ({})", path.display(), image.mime_type);
    Ok(CoverChoice::Upload(image))
}

pub fn cover_options(presets: &[CoverPreset]) -> Vec<String> {
    presets
        .iter()
        .map(|p| format!("{} ({})", p.name, p.id))
        .chain([UPLOAD_OPTION.to_string(), NO_COVER_OPTION.to_string()])
        .collect()
}

pub async fn select_cover(presets: &[CoverPreset], storage: &dyn Storage) -> Result<CoverChoice> {
    let options = cover_options(presets);
    let selection = Select::new("Pick a cover:", options).prompt()?;

    if selection == NO_COVER_OPTION {
        return Ok(CoverChoice::None);
    }
    if selection == UPLOAD_OPTION {
        let path = Text::new("Path to image (png, jpg, gif, webp):").prompt()?;
        return cover_from_file(storage, Path::new(path.trim())).await;
    }

    presets
        .iter()
        .find(|p| selection == format!("{} ({})", p.name, p.id))
        .map(|p| CoverChoice::Preset(p.clone()))
        .ok_or_else(|| anyhow!("Unknown cover selection: {}", selection))
}

/// Only a completed run that drew nothing gets the empty-book notice; a failed
/// run has already shown its error message.
pub fn missing_book_notice(session: &GenerationSession) -> Option<&'static str> {
    let finished_empty =
        session.state().status == GenerationStatus::Complete && !session.ready_to_download();
    finished_empty.then_some(NOTHING_TO_DOWNLOAD)
}

pub fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new(prompt).with_default(false).prompt()?)
}

/// Mirrors the session's progress percentage and status message on a bar.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self { bar })
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn update(&self, snapshot: &GenerationSnapshot<'_>) {
        self.bar.set_position(snapshot.state.progress as u64);
        self.bar.set_message(snapshot.state.message.clone());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Helper",
    }
}

/// Reads lines until an empty one or `exit`.
pub async fn run_chat(session: &mut ChatSession) -> Result<()> {
    for message in session.messages() {
        println!("{}: {}", speaker(message.role), message.text);
    }

    loop {
        let input = Text::new("You:").prompt()?;
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("exit") {
            break;
        }
        if let Some(answer) = session.send(trimmed).await {
            println!("{}: {}", speaker(answer.role), answer.text);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BookConfig;
    use crate::core::io::NativeStorage;
    use crate::core::state::GenerationState;
    use crate::services::mock::ScriptedLlm;
    use crate::services::workflow::WorkflowManager;
    use std::sync::Arc;

    fn presets() -> Vec<CoverPreset> {
        vec![
            CoverPreset {
                id: "space",
                name: "Cosmic",
                image: ImagePayload::new("image/jpeg", "AAAA"),
            },
            CoverPreset {
                id: "rainbow",
                name: "Rainbow",
                image: ImagePayload::new("image/jpeg", "BBBB"),
            },
        ]
    }

    #[test]
    fn test_cover_from_arg() {
        let presets = presets();
        assert_eq!(cover_from_arg(&presets, None).unwrap(), None);
        assert_eq!(cover_from_arg(&presets, Some("none")).unwrap(), Some(CoverChoice::None));

        let choice = cover_from_arg(&presets, Some("rainbow")).unwrap().unwrap();
        assert_eq!(choice.image().unwrap().base64, "BBBB");

        assert!(cover_from_arg(&presets, Some("plaid")).is_err());
    }

    #[test]
    fn test_cover_options_end_with_upload_and_none() {
        let options = cover_options(&presets());
        assert_eq!(
            options,
            vec!["Cosmic (space)", "Rainbow (rainbow)", UPLOAD_OPTION, NO_COVER_OPTION]
        );
    }

    #[tokio::test]
    async fn test_cover_from_file_uses_extension() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("drawing.JPG");
        tokio::fs::write(&path, b"\xff\xd8\xff").await?;

        let choice = cover_from_file(&NativeStorage::new(), &path).await?;
        let image = choice.image().unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.decode()?, b"\xff\xd8\xff".to_vec());

        let bad = dir.path().join("notes.txt");
        tokio::fs::write(&bad, b"hello").await?;
        assert!(cover_from_file(&NativeStorage::new(), &bad).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_book_notice_only_after_complete() {
        let request = GenerationRequest::new("Leo", "space").unwrap();

        let llm = Arc::new(ScriptedLlm::new().text_err("offline"));
        let mut failed = WorkflowManager::new(llm, &BookConfig::default());
        assert!(failed.run(&request, |_| {}).await.is_err());
        assert_eq!(failed.session().state().status, GenerationStatus::Error);
        assert_eq!(missing_book_notice(failed.session()), None);

        let llm = Arc::new(ScriptedLlm::new().text_ok(r#"["a rocket"]"#).image_err("refused"));
        let mut empty = WorkflowManager::new(llm, &BookConfig::default());
        assert!(empty.run(&request, |_| {}).await.unwrap().is_empty());
        assert_eq!(missing_book_notice(empty.session()), Some(NOTHING_TO_DOWNLOAD));

        let llm = Arc::new(ScriptedLlm::new().text_ok(r#"["a rocket"]"#).image_ok(None, "AAAA"));
        let mut drawn = WorkflowManager::new(llm, &BookConfig::default());
        assert_eq!(drawn.run(&request, |_| {}).await.unwrap().len(), 1);
        assert_eq!(missing_book_notice(drawn.session()), None);
    }

    #[test]
    fn test_progress_reporter_tracks_snapshot() {
        let reporter = ProgressReporter::hidden();
        let state = GenerationState {
            status: GenerationStatus::Generating,
            message: "Drawing page 2 of 5: \"a comet\"".to_string(),
            progress: 20,
        };
        reporter.update(&GenerationSnapshot {
            state: &state,
            pages: &[],
            planned: 5,
        });
        assert_eq!(reporter.bar.position(), 20);
        assert_eq!(reporter.bar.message(), state.message);
    }
}
