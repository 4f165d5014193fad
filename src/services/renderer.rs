use crate::core::error::RenderFailure;
use crate::services::llm::{ContentPart, ImageRequest, LlmClient, SafetySetting};
use crate::utils::data_uri::{ImagePayload, DEFAULT_IMAGE_MIME};

/// Turns one scene description into a line-art image. Never retries.
pub struct PageRenderer<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> PageRenderer<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    pub async fn render_page(&self, description: &str) -> Result<ImagePayload, RenderFailure> {
        let request = ImageRequest {
            prompt: coloring_page_prompt(description),
            safety: SafetySetting::permissive(),
        };

        let parts = self.llm.generate_image(&request).await?;
        extract_image(parts)
    }
}

fn coloring_page_prompt(description: &str) -> String {
    format!(
        "A professional children's coloring book page of {description}.\n\
         Strictly black and white line art.\n\
         White background.\n\
         Thick, clean, distinct black lines.\n\
         No shading, no greyscale, no fill, no colors.\n\
         Simple, cute, high contrast, vector style illustration.\n\
         Centered composition."
    )
}

/// First inline image wins; otherwise any text is treated as a refusal.
fn extract_image(parts: Vec<ContentPart>) -> Result<ImagePayload, RenderFailure> {
    let mut refusal: Option<String> = None;
    for part in parts {
        match part {
            ContentPart::InlineImage { mime_type, data } => {
                let mime = mime_type.unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
                return Ok(ImagePayload::new(mime, data));
            }
            ContentPart::Text(text) => {
                if refusal.is_none() {
                    refusal = Some(text);
                }
            }
        }
    }

    match refusal {
        Some(text) => {
            log::warn!("Model refused image generation: {}", text);
            Err(RenderFailure::Refused(text))
        }
        None => Err(RenderFailure::NoImage),
    }
}
