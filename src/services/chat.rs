use crate::core::error::ChatFailure;
use crate::core::state::ChatMessage;
use crate::services::llm::{LlmClient, TextRequest, Turn};
use std::sync::Arc;

pub const GREETING: &str = "Hi! Need help thinking of a cool theme? Ask me anything!";
pub const APOLOGY: &str = "Sorry, I'm having trouble connecting right now.";
const EMPTY_REPLY: &str = "I'm not sure how to respond to that.";
const PERSONA: &str = "You are a helpful assistant for a coloring book generator app. \
    You help parents and kids come up with creative themes for their coloring books. \
    Keep answers concise and friendly.";

/// Stateless theme brainstorming helper. Independent of any generation run.
#[derive(Debug, Clone)]
pub struct ChatAssistant {
    llm: Arc<dyn LlmClient>,
}

impl ChatAssistant {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn reply(&self, history: &[ChatMessage], message: &str) -> Result<String, ChatFailure> {
        let request = TextRequest {
            system: Some(PERSONA.to_string()),
            history: history
                .iter()
                .map(|m| Turn {
                    role: m.role,
                    text: m.text.clone(),
                })
                .collect(),
            ..TextRequest::new(message)
        };

        let text = self.llm.generate_text(&request).await?;
        if text.trim().is_empty() {
            Ok(EMPTY_REPLY.to_string())
        } else {
            Ok(text)
        }
    }
}

/// A conversation transcript. Failures never surface to the caller; they
/// become an apology message in the transcript.
#[derive(Debug, Clone)]
pub struct ChatSession {
    assistant: ChatAssistant,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(assistant: ChatAssistant) -> Self {
        Self {
            assistant,
            messages: vec![ChatMessage::assistant(GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns the assistant's answer, or `None` when the input was blank and
    /// nothing was sent.
    pub async fn send(&mut self, text: &str) -> Option<&ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }

        let history = self.messages.clone();
        self.messages.push(ChatMessage::user(text));

        let answer = match self.assistant.reply(&history, text).await {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("Chat request failed: {:#}", e);
                APOLOGY.to_string()
            }
        };
        self.messages.push(ChatMessage::assistant(answer));
        self.messages.last()
    }
}
