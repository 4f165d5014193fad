use crate::core::config::BookConfig;
use crate::core::error::{RenderFailure, RunError};
use crate::core::state::{
    GenerationRequest, GenerationState, GenerationStatus, RenderedPage, ScenePrompt,
};
use crate::services::llm::LlmClient;
use crate::services::planner::PromptPlanner;
use crate::services::renderer::PageRenderer;
use std::sync::Arc;

pub const MSG_PLANNING: &str = "Brainstorming page ideas...";
pub const MSG_GENERATING: &str = "Drawing pages...";
pub const MSG_COMPLETE: &str = "All done! Ready to print.";
pub const MSG_ERROR: &str = "Something went wrong. Please try again.";

/// Read-only view handed to progress observers.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSnapshot<'a> {
    pub state: &'a GenerationState,
    pub pages: &'a [RenderedPage],
    /// Number of scenes planned for this run; 0 until planning finishes.
    pub planned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub index: usize,
    pub prompt: ScenePrompt,
    pub reason: String,
}

/// The one live generation state of a session. Only the transition methods
/// below change it.
#[derive(Debug, Default)]
pub struct GenerationSession {
    state: GenerationState,
    prompts: Vec<ScenePrompt>,
    pages: Vec<RenderedPage>,
    failures: Vec<PageFailure>,
}

impl GenerationSession {
    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    pub fn failures(&self) -> &[PageFailure] {
        &self.failures
    }

    pub fn prompts(&self) -> &[ScenePrompt] {
        &self.prompts
    }

    pub fn snapshot(&self) -> GenerationSnapshot<'_> {
        GenerationSnapshot {
            state: &self.state,
            pages: &self.pages,
            planned: self.prompts.len(),
        }
    }

    pub fn reset(&mut self) {
        *self = GenerationSession::default();
    }

    /// A book can only be assembled from a finished run with at least one page.
    pub fn ready_to_download(&self) -> bool {
        self.state.status == GenerationStatus::Complete && !self.pages.is_empty()
    }

    fn begin_planning(&mut self) -> Result<(), RunError> {
        if self.state.status != GenerationStatus::Idle {
            return Err(RunError::NotIdle(self.state.status));
        }
        self.state = GenerationState {
            status: GenerationStatus::Planning,
            message: MSG_PLANNING.to_string(),
            progress: 0,
        };
        Ok(())
    }

    fn begin_generating(&mut self, prompts: Vec<ScenePrompt>) {
        self.prompts = prompts;
        self.state.status = GenerationStatus::Generating;
        self.state.message = MSG_GENERATING.to_string();
    }

    fn drawing(&mut self, index: usize) {
        let total = self.prompts.len();
        if let Some(prompt) = self.prompts.get(index) {
            self.state.message = format!("Drawing page {} of {}: \"{}\"", index + 1, total, prompt);
        }
    }

    fn record(&mut self, index: usize, outcome: Result<RenderedPage, RenderFailure>) {
        match outcome {
            Ok(page) => self.pages.push(page),
            Err(failure) => self.failures.push(PageFailure {
                index,
                prompt: self.prompts.get(index).cloned().unwrap_or_else(|| "".into()),
                reason: failure.reason(),
            }),
        }
        let percent = percent_done(index + 1, self.prompts.len());
        self.state.progress = self.state.progress.max(percent);
    }

    fn complete(&mut self) {
        self.state.status = GenerationStatus::Complete;
        self.state.message = MSG_COMPLETE.to_string();
        self.state.progress = 100;
    }

    fn fail(&mut self) {
        self.prompts.clear();
        self.pages.clear();
        self.failures.clear();
        self.state.status = GenerationStatus::Error;
        self.state.message = MSG_ERROR.to_string();
    }
}

pub fn percent_done(attempted: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let ratio = attempted.min(total) as f64 / total as f64;
    (ratio * 100.0).round() as u8
}

/// Drives planning, then one render per scene, strictly one at a time.
pub struct WorkflowManager {
    llm: Arc<dyn LlmClient>,
    page_count: usize,
    session: GenerationSession,
}

impl WorkflowManager {
    pub fn new(llm: Arc<dyn LlmClient>, book: &BookConfig) -> Self {
        Self {
            llm,
            page_count: book.page_count,
            session: GenerationSession::default(),
        }
    }

    pub fn session(&self) -> &GenerationSession {
        &self.session
    }

    /// Required before starting another run.
    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Runs one book from planning to `complete`. A failed page is logged
    /// and skipped; only a failed planning call ends the run in `error`.
    pub async fn run<F>(
        &mut self,
        request: &GenerationRequest,
        mut on_progress: F,
    ) -> Result<Vec<RenderedPage>, RunError>
    where
        F: FnMut(&GenerationSnapshot<'_>),
    {
        self.session.begin_planning()?;
        on_progress(&self.session.snapshot());

        let planner = PromptPlanner::new(self.llm.as_ref(), self.page_count);
        let prompts = match planner.plan_pages(request.theme()).await {
            Ok(prompts) => prompts,
            Err(e) => {
                self.session.fail();
                on_progress(&self.session.snapshot());
                return Err(RunError::Planning(e));
            }
        };

        self.session.begin_generating(prompts.clone());
        on_progress(&self.session.snapshot());

        let renderer = PageRenderer::new(self.llm.as_ref());
        let total = prompts.len();
        for (i, prompt) in prompts.into_iter().enumerate() {
            self.session.drawing(i);
            on_progress(&self.session.snapshot());

            let outcome = renderer
                .render_page(prompt.as_str())
                .await
                .map(|image| RenderedPage::new(i, image, prompt));
            if let Err(e) = &outcome {
                log::warn!("Failed to generate page {} of {}: {}", i + 1, total, e.reason());
            }

            self.session.record(i, outcome);
            on_progress(&self.session.snapshot());
        }

        self.session.complete();
        on_progress(&self.session.snapshot());
        log::info!(
            "Run complete: {} of {} pages drawn for {:?}",
            self.session.pages.len(),
            total,
            request.child_name()
        );

        Ok(self.session.pages.clone())
    }
}
