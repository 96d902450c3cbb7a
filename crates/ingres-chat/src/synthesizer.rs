//! Result set to natural-language answer.

use std::sync::Arc;

use tracing::{debug, warn};

use ingres_core::config::LlmConfig;
use ingres_core::record::ResultRecord;

use crate::llm::{CompletionRequest, LanguageModel};

/// Reply used when the model cannot produce an answer.
pub const SYNTHESIS_FALLBACK: &str =
    "I'm sorry, but I encountered an error while processing your request.";

const SYNTHESIS_PROMPT: &str = r#"You are an expert data analyst and a helpful virtual assistant for groundwater data. You will be given a user's question and data retrieved from a database in JSON format.

INSTRUCTIONS:
1. Analyze the user's question and the JSON data together.
2. If the data is empty, politely tell the user that no matching information was found.
3. Otherwise, synthesize a clear, concise, human-readable answer from the data.
4. If the question asks for the highest or lowest value, state the district name and the corresponding value.
5. Do not output raw JSON. Present the information in natural language."#;

/// Writes the final answer with one model call.
pub struct ResponseSynthesizer {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    max_tokens: u32,
}

impl ResponseSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, config: &LlmConfig) -> Self {
        Self {
            model,
            temperature: config.synthesis_temperature,
            max_tokens: config.synthesis_max_tokens,
        }
    }

    /// Answer `question` from `results`. Never fails; a model fault yields
    /// [`SYNTHESIS_FALLBACK`].
    pub async fn synthesize(&self, question: &str, results: &[ResultRecord]) -> String {
        let request = CompletionRequest {
            system: SYNTHESIS_PROMPT.to_string(),
            user: synthesis_user_content(question, results),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        match self.model.complete(&request).await {
            Ok(answer) => {
                debug!(records = results.len(), "Answer synthesized");
                answer
            }
            Err(e) => {
                warn!(error = %e, "Response synthesis failed");
                SYNTHESIS_FALLBACK.to_string()
            }
        }
    }
}

fn synthesis_user_content(question: &str, results: &[ResultRecord]) -> String {
    let data = serde_json::to_string_pretty(results).unwrap_or_else(|_| "[]".to_string());
    format!(
        "User's Original Question: \"{}\"\n\nData from Database:\n{}",
        question, data
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use ingres_core::record::{DocumentId, StoredDocument};
    use serde_json::json;

    use crate::llm::{LanguageModel, MockLanguageModel};

    fn record() -> ResultRecord {
        StoredDocument::new(
            DocumentId::new(),
            json!({"DISTRICT": "Wayanad", "rainfall_mm_Total": 2890.5})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .into_record()
    }

    #[test]
    fn test_user_content_embeds_question_and_data() {
        let content = synthesis_user_content("Which district is wettest?", &[record()]);
        assert!(content.starts_with("User's Original Question: \"Which district is wettest?\""));
        assert!(content.contains("Data from Database:\n["));
        assert!(content.contains("\"DISTRICT\": \"Wayanad\""));
    }

    #[test]
    fn test_user_content_empty_results() {
        let content = synthesis_user_content("anything in goa?", &[]);
        assert!(content.ends_with("Data from Database:\n[]"));
    }

    #[tokio::test]
    async fn test_synthesize_returns_model_answer() {
        let model = Arc::new(MockLanguageModel::new().with_reply("Wayanad received 2890.5 mm."));
        let synth = ResponseSynthesizer::new(
            Arc::clone(&model) as Arc<dyn LanguageModel>,
            &LlmConfig::default(),
        );
        let answer = synth.synthesize("wettest district?", &[record()]).await;
        assert_eq!(answer, "Wayanad received 2890.5 mm.");

        let request = &model.requests()[0];
        assert_eq!(request.temperature, 0.5);
        assert_eq!(request.max_tokens, 1024);
        assert!(request.system.contains("Do not output raw JSON"));
    }

    #[tokio::test]
    async fn test_synthesize_model_fault_falls_back() {
        let model = Arc::new(MockLanguageModel::new().with_error("rate limited"));
        let synth = ResponseSynthesizer::new(model, &LlmConfig::default());
        assert_eq!(synth.synthesize("q", &[]).await, SYNTHESIS_FALLBACK);
    }
}
