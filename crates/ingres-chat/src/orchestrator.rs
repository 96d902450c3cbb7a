//! Chat orchestrator: central coordinator wiring translation, execution,
//! and synthesis.
//!
//! Routes each message through the pipeline and short-circuits greetings
//! and untranslatable questions before touching the store.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use ingres_core::config::IngresConfig;
use ingres_core::schema::SchemaDescription;
use ingres_storage::DocumentStore;

use crate::error::ChatError;
use crate::executor::QueryExecutor;
use crate::introspector::describe_schema;
use crate::llm::LanguageModel;
use crate::synthesizer::ResponseSynthesizer;
use crate::translator::{QueryTranslator, Translation};

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

pub const GREETING_REPLY: &str =
    "Hello! I am an AI assistant for INGRES. How can I help you with the groundwater data?";

pub const CLARIFY_REPLY: &str = "I'm sorry, I couldn't determine what to search for in the database. Could you please ask a more specific question about the data?";

const GREETING_TOKENS: [&str; 3] = ["hi", "hello", "hey"];

/// Which path produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Greeting,
    Clarify,
    Answer,
}

/// The pipeline's answer to one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub kind: ReplyKind,
    /// Records handed to synthesis; zero for short-circuited replies.
    pub result_count: usize,
}

impl ChatReply {
    fn canned(response: &str, kind: ReplyKind) -> Self {
        Self {
            response: response.to_string(),
            kind,
            result_count: 0,
        }
    }
}

/// Central chat orchestrator.
pub struct ChatOrchestrator {
    translator: QueryTranslator,
    executor: QueryExecutor,
    synthesizer: ResponseSynthesizer,
    schema: SchemaDescription,
}

impl ChatOrchestrator {
    /// Build the pipeline, inferring the schema from `store` once.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn DocumentStore>,
        config: &IngresConfig,
    ) -> Self {
        let schema = describe_schema(store.as_ref());
        let executor = QueryExecutor::with_limit(store, config.store.max_results);
        info!(
            schema_fields = schema.field_count(),
            max_results = executor.limit(),
            "Chat pipeline initialized"
        );
        Self {
            translator: QueryTranslator::new(Arc::clone(&model), &config.llm),
            executor,
            synthesizer: ResponseSynthesizer::new(model, &config.llm),
            schema,
        }
    }

    /// The schema description inferred at startup.
    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    /// Handle an incoming chat message.
    pub async fn handle_message(&self, message: &str) -> Result<ChatReply, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }

        let filter = match self.translator.translate_detailed(message, &self.schema).await {
            Translation::Filter(filter) => filter,
            other => return Ok(self.short_circuit(message, &other)),
        };

        let results = self.executor.execute(&filter)?;
        let response = self.synthesizer.synthesize(message, &results).await;

        Ok(ChatReply {
            response,
            kind: ReplyKind::Answer,
            result_count: results.len(),
        })
    }

    fn short_circuit(&self, message: &str, translation: &Translation) -> ChatReply {
        if is_greeting(message) {
            return ChatReply::canned(GREETING_REPLY, ReplyKind::Greeting);
        }
        match translation {
            Translation::Declined => debug!("Question is not a data query"),
            Translation::Unparseable(reason) => debug!(reason = %reason, "Filter unusable"),
            Translation::ModelUnavailable(reason) => {
                debug!(reason = %reason, "Translation unavailable")
            }
            Translation::Filter(_) => {}
        }
        ChatReply::canned(CLARIFY_REPLY, ReplyKind::Clarify)
    }
}

/// Case-insensitive substring check for a greeting token.
fn is_greeting(message: &str) -> bool {
    let lower = message.to_lowercase();
    GREETING_TOKENS.iter().any(|token| lower.contains(token))
}
