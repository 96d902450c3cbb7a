//! Error types for the question-answering pipeline.

use ingres_core::error::IngresError;

/// Errors surfaced by the chat pipeline.
///
/// Model faults never appear here on the request path: translation and
/// synthesis degrade locally. `LlmError` is produced by
/// [`crate::llm::LanguageModel`] implementations and consumed by those stages.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("LLM error: {0}")]
    LlmError(String),
    #[error("query execution failed: {0}")]
    ExecutionFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<IngresError> for ChatError {
    fn from(err: IngresError) -> Self {
        ChatError::ExecutionFailed(err.to_string())
    }
}
