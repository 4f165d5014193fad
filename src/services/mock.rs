//! Scripted backend for tests: replies are queued up front and every request
//! is recorded for later inspection.

use crate::services::llm::{ContentPart, ImageRequest, LlmClient, TextRequest};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct ScriptedLlm {
    text_replies: Mutex<VecDeque<Result<String, String>>>,
    image_replies: Mutex<VecDeque<Result<Vec<ContentPart>, String>>>,
    pub text_requests: Mutex<Vec<TextRequest>>,
    pub image_requests: Mutex<Vec<ImageRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text_ok(self, text: &str) -> Self {
        self.text_replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn text_err(self, message: &str) -> Self {
        self.text_replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn image_ok(self, mime_type: Option<&str>, data: &str) -> Self {
        let part = ContentPart::InlineImage {
            mime_type: mime_type.map(str::to_string),
            data: data.to_string(),
        };
        self.image_replies.lock().unwrap().push_back(Ok(vec![part]));
        self
    }

    pub fn image_parts(self, parts: Vec<ContentPart>) -> Self {
        self.image_replies.lock().unwrap().push_back(Ok(parts));
        self
    }

    pub fn image_err(self, message: &str) -> Self {
        self.image_replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn text_calls(&self) -> usize {
        self.text_requests.lock().unwrap().len()
    }

    pub fn image_calls(&self) -> usize {
        self.image_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate_text(&self, request: &TextRequest) -> Result<String> {
        self.text_requests.lock().unwrap().push(request.clone());
        match self.text_replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted text reply left")),
        }
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<ContentPart>> {
        self.image_requests.lock().unwrap().push(request.clone());
        match self.image_replies.lock().unwrap().pop_front() {
            Some(Ok(parts)) => Ok(parts),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted image reply left")),
        }
    }
}
