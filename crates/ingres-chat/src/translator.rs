//! Natural-language question to structured filter.

use std::sync::Arc;

use tracing::{debug, warn};

use ingres_core::config::LlmConfig;
use ingres_core::filter::QueryFilter;
use ingres_core::schema::SchemaDescription;

use crate::llm::{CompletionRequest, LanguageModel};

/// Outcome of one translation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// A non-empty filter ready to execute.
    Filter(QueryFilter),
    /// The model answered `{}`: the question is not a data query.
    Declined,
    /// The model replied with something that is not a valid filter object.
    Unparseable(String),
    /// The model could not be reached or returned an error.
    ModelUnavailable(String),
}

impl Translation {
    /// Collapse to the filter, using the empty filter for every non-filter
    /// outcome.
    pub fn into_filter(self) -> QueryFilter {
        match self {
            Translation::Filter(filter) => filter,
            _ => QueryFilter::empty(),
        }
    }
}

/// Turns questions into filters with one model call per question.
pub struct QueryTranslator {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    max_tokens: u32,
}

impl QueryTranslator {
    pub fn new(model: Arc<dyn LanguageModel>, config: &LlmConfig) -> Self {
        Self {
            model,
            temperature: config.translation_temperature,
            max_tokens: config.translation_max_tokens,
        }
    }

    /// Translate and report why no filter was produced, if none was.
    pub async fn translate_detailed(&self, question: &str, schema: &SchemaDescription) -> Translation {
        let request = CompletionRequest {
            system: translation_prompt(schema),
            user: question.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let raw = match self.model.complete(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Query translation failed");
                return Translation::ModelUnavailable(e.to_string());
            }
        };

        let translation = parse_model_output(&raw);
        match &translation {
            Translation::Filter(filter) => debug!(filter = %filter, "Generated filter"),
            Translation::Declined => debug!("Model declined to produce a filter"),
            Translation::Unparseable(reason) => {
                warn!(reason = %reason, raw = %raw, "Could not parse generated filter")
            }
            Translation::ModelUnavailable(_) => {}
        }
        translation
    }

    /// Translate, returning the empty filter when nothing usable came back.
    pub async fn translate(&self, question: &str, schema: &SchemaDescription) -> QueryFilter {
        self.translate_detailed(question, schema).await.into_filter()
    }
}

/// System instruction for filter generation, with the schema embedded.
pub fn translation_prompt(schema: &SchemaDescription) -> String {
    format!(
        r#"You are a precise MongoDB query assistant. Convert the user's question into a MongoDB filter for the collection described below.

DATABASE SCHEMA:
{schema}

RULES:
1. Respond with a single valid JSON filter object and nothing else. No explanations, no text before or after the JSON.
2. For text fields such as STATE or DISTRICT, match case-insensitively with "$regex" and "$options": "i". Example: {{"STATE": {{"$regex": "delhi", "$options": "i"}}}}
3. For numeric fields (for example names ending in "_mm_Total" or "_ham_Total"), use "$gt", "$gte", "$lt" or "$lte" when the question says "more than", "less than", "at least", "at most" and similar.
4. When the question asks to list items belonging to a category, filter on the parent category field.
5. If the question cannot be answered with a database query, respond with {{}}."#,
        schema = schema.to_prompt_text()
    )
}

/// Extract the body of the first Markdown code fence, with or without a
/// language tag. Prose before the opening fence and after the closing one
/// is dropped. Text without a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    const FENCE: &str = "```";
    let Some(open) = text.find(FENCE) else {
        return text.trim();
    };
    let rest = &text[open + FENCE.len()..];
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let body = match rest.find(FENCE) {
        Some(close) => &rest[..close],
        None => rest,
    };
    body.trim()
}

fn parse_model_output(raw: &str) -> Translation {
    match QueryFilter::from_json_str(strip_code_fence(raw)) {
        Ok(filter) if filter.is_empty() => Translation::Declined,
        Ok(filter) => Translation::Filter(filter),
        Err(e) => Translation::Unparseable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::llm::MockLanguageModel;

    fn schema() -> SchemaDescription {
        let mut fields = BTreeMap::new();
        fields.insert("STATE".to_string(), "string".to_string());
        fields.insert("rainfall_mm_Total".to_string(), "float".to_string());
        SchemaDescription::Fields(fields)
    }

    fn translator(model: Arc<MockLanguageModel>) -> QueryTranslator {
        QueryTranslator::new(model, &LlmConfig::default())
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```JSON\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json {\"a\": 1} ```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fence_surrounded_by_prose() {
        assert_eq!(
            strip_code_fence("Here is the query:\n```json\n{\"a\": 1}\n```"),
            "{\"a\": 1}"
        );
        assert_eq!(
            strip_code_fence("```json\n{\"a\": 1}\n```\nThis finds Goa."),
            "{\"a\": 1}"
        );
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_fenced_filter_with_prose_parses() {
        let expected = parse_model_output(r#"{"STATE": "GOA"}"#);
        assert!(matches!(expected, Translation::Filter(_)));
        assert_eq!(
            parse_model_output("Here is the query:\n```json\n{\"STATE\": \"GOA\"}\n```"),
            expected
        );
        assert_eq!(
            parse_model_output("```json\n{\"STATE\": \"GOA\"}\n```\nThis finds Goa."),
            expected
        );
        assert_eq!(
            parse_model_output("Sure.\n```\n{\"STATE\": \"GOA\"}\n```\nLet me know."),
            expected
        );
    }

    #[test]
    fn test_fenced_and_plain_output_parse_identically() {
        let plain = r#"{"rainfall_mm_Total": {"$gt": 1000}}"#;
        let fenced = format!("```json\n{}\n```", plain);
        assert_eq!(parse_model_output(plain), parse_model_output(&fenced));
        assert!(matches!(parse_model_output(plain), Translation::Filter(_)));
    }

    #[test]
    fn test_parse_model_output_classifies() {
        assert_eq!(parse_model_output("{}"), Translation::Declined);
        assert_eq!(parse_model_output("```json\n{}\n```"), Translation::Declined);
        assert!(matches!(
            parse_model_output("Sure! Here is your query."),
            Translation::Unparseable(_)
        ));
        assert!(matches!(parse_model_output("[1, 2]"), Translation::Unparseable(_)));
        assert!(matches!(parse_model_output("\"STATE\""), Translation::Unparseable(_)));
        assert!(matches!(
            parse_model_output(r#"{"$where": "1"}"#),
            Translation::Unparseable(_)
        ));
    }

    #[test]
    fn test_prompt_embeds_schema_and_rules() {
        let prompt = translation_prompt(&schema());
        assert!(prompt.contains("DATABASE SCHEMA:"));
        assert!(prompt.contains("\"rainfall_mm_Total\": \"float\""));
        assert!(prompt.contains(r#"{"STATE": {"$regex": "delhi", "$options": "i"}}"#));
        assert!(prompt.contains("respond with {}"));
    }

    #[test]
    fn test_prompt_embeds_placeholder_schema() {
        let prompt = translation_prompt(&SchemaDescription::empty_collection());
        assert!(prompt.contains("No documents in collection to infer schema from."));
    }

    #[tokio::test]
    async fn test_translate_numeric_threshold() {
        let model = Arc::new(
            MockLanguageModel::new().with_reply(r#"{"rainfall_mm_Total": {"$gt": 1000}}"#),
        );
        let filter = translator(Arc::clone(&model))
            .translate("districts with rainfall more than 1000", &schema())
            .await;

        assert_eq!(filter.to_json(), json!({"rainfall_mm_Total": {"$gt": 1000}}));

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user, "districts with rainfall more than 1000");
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, 512);
        assert!(requests[0].system.contains("rainfall_mm_Total"));
    }

    #[tokio::test]
    async fn test_translate_unparseable_yields_empty_filter() {
        let model = Arc::new(MockLanguageModel::new().with_reply("I cannot help with that"));
        let filter = translator(model).translate("asdkjasd", &schema()).await;
        assert!(filter.is_empty());
    }

    #[tokio::test]
    async fn test_translate_model_fault_yields_empty_filter() {
        let model = Arc::new(MockLanguageModel::new().with_error("503 Service Unavailable"));
        let t = translator(model);
        let detailed = t.translate_detailed("rainfall in goa", &schema()).await;
        assert!(matches!(detailed, Translation::ModelUnavailable(ref m) if m.contains("503")));
        assert!(detailed.into_filter().is_empty());
    }
}
