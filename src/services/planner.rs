use crate::core::error::PlanningFailure;
use crate::core::state::ScenePrompt;
use crate::services::llm::{LlmClient, TextRequest};
use serde_json::json;

/// Asks the text model for a list of scene descriptions for one theme.
pub struct PromptPlanner<'a> {
    llm: &'a dyn LlmClient,
    page_count: usize,
}

impl<'a> PromptPlanner<'a> {
    pub fn new(llm: &'a dyn LlmClient, page_count: usize) -> Self {
        Self { llm, page_count }
    }

    /// Unusable output is replaced by templated scenes; only a failed call is
    /// reported. The list keeps whatever length the model returned.
    pub async fn plan_pages(&self, theme: &str) -> Result<Vec<ScenePrompt>, PlanningFailure> {
        let request = TextRequest {
            response_schema: Some(json!({
                "type": "ARRAY",
                "items": { "type": "STRING" }
            })),
            ..TextRequest::new(planning_prompt(theme, self.page_count))
        };

        let response = match self.llm.generate_text(&request).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("Scene planning request failed: {:#}", e);
                return Err(PlanningFailure::Transport(e));
            }
        };

        match parse_scene_list(&response) {
            Some(scenes) => {
                log::info!("Planned {} scenes for theme {:?}", scenes.len(), theme);
                Ok(scenes)
            }
            None => {
                log::warn!(
                    "Could not parse scene list, using fallback scenes. Response: {}",
                    response
                );
                Ok(fallback_prompts(theme, self.page_count))
            }
        }
    }
}

fn planning_prompt(theme: &str, count: usize) -> String {
    format!(
        "I am making a coloring book for children with the theme: \"{theme}\".\n\
         Write {count} different, creative and fun descriptions, one for each coloring page, based on this theme.\n\
         Keep each description visual and simple so it can be turned into an image prompt.\n\
         Every description must be safe for children and family-friendly, and must not use copyrighted characters; \
         use generic terms instead (\"a princess\", not a named film princess; \"a superhero\", not a named hero).\n\
         Return ONLY a JSON array of strings, without markdown formatting or code blocks.\n\
         Example: [\"A cute dinosaur eating a leaf\", \"A rocket ship flying past the moon\"]"
    )
}

pub fn fallback_prompts(theme: &str, count: usize) -> Vec<ScenePrompt> {
    (1..=count)
        .map(|i| ScenePrompt(format!("{} scene {}", theme, i)))
        .collect()
}

/// Parses a JSON array of strings, tolerating code fences. Blank entries are
/// dropped; `None` when nothing usable is left.
pub fn parse_scene_list(response: &str) -> Option<Vec<ScenePrompt>> {
    let clean = strip_code_blocks(response);
    if clean.is_empty() {
        return None;
    }
    let items: Vec<String> = serde_json::from_str(&clean).ok()?;
    let scenes: Vec<ScenePrompt> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(ScenePrompt)
        .collect();
    if scenes.is_empty() {
        None
    } else {
        Some(scenes)
    }
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::ScriptedLlm;

    fn texts(scenes: &[ScenePrompt]) -> Vec<&str> {
        scenes.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n[]\n```"), "[]");
        assert_eq!(strip_code_blocks("```\n[]\n```"), "[]");
        assert_eq!(strip_code_blocks("  ```json  \n  []  \n  ```  "), "[]");
    }

    #[tokio::test]
    async fn test_plan_returns_model_scenes() {
        let llm = ScriptedLlm::new().text_ok(
            r#"["A dinosaur in a spacesuit", "A T-rex on the moon", "Stegosaurus astronaut", "A comet shaped like a bone", "Baby dinos in a rocket"]"#,
        );
        let planner = PromptPlanner::new(&llm, 5);

        let scenes = planner.plan_pages("space dinosaurs").await.unwrap();
        assert_eq!(scenes.len(), 5);
        assert!(scenes.iter().all(|s| !s.as_str().is_empty()));
        assert_eq!(scenes[1].as_str(), "A T-rex on the moon");

        let requests = llm.text_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("\"space dinosaurs\""));
        assert!(requests[0].prompt.contains("Write 5 different"));
        assert_eq!(requests[0].response_schema.as_ref().unwrap()["items"]["type"], "STRING");
    }

    #[tokio::test]
    async fn test_plan_accepts_fenced_json() {
        let llm = ScriptedLlm::new().text_ok("```json\n[\"a\", \"b\", \"c\", \"d\", \"e\"]\n```");
        let scenes = PromptPlanner::new(&llm, 5).plan_pages("ocean").await.unwrap();
        assert_eq!(texts(&scenes), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_plan_malformed_output_uses_fallback() {
        for body in ["not json at all", "", "{\"scenes\": []}", "[]", "[\"  \"]"] {
            let llm = ScriptedLlm::new().text_ok(body);
            let scenes = PromptPlanner::new(&llm, 5).plan_pages("pirates").await.unwrap();
            assert_eq!(
                texts(&scenes),
                vec![
                    "pirates scene 1",
                    "pirates scene 2",
                    "pirates scene 3",
                    "pirates scene 4",
                    "pirates scene 5"
                ],
                "body {:?} should fall back",
                body
            );
        }
    }

    #[tokio::test]
    async fn test_plan_keeps_short_lists() {
        let llm = ScriptedLlm::new().text_ok(r#"["one", "", "two"]"#);
        let scenes = PromptPlanner::new(&llm, 5).plan_pages("farm").await.unwrap();
        assert_eq!(texts(&scenes), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_plan_transport_error_is_reported() {
        let llm = ScriptedLlm::new().text_err("connection refused");
        let result = PromptPlanner::new(&llm, 5).plan_pages("farm").await;
        let err = result.err().unwrap();
        assert!(err.to_string().contains("connection refused"));
    }
}
