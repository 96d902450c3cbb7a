//! Question-answering pipeline for INGRES.
//!
//! Translates a natural-language question into a document filter with a
//! language model, runs it against the collection, and has the model
//! phrase the results as an answer.

pub mod error;
pub mod executor;
pub mod introspector;
pub mod llm;
pub mod orchestrator;
pub mod synthesizer;
pub mod translator;

pub use error::ChatError;
pub use executor::QueryExecutor;
pub use introspector::describe_schema;
pub use llm::{ChatCompletionClient, CompletionRequest, LanguageModel, MockLanguageModel};
pub use orchestrator::{ChatOrchestrator, ChatReply, ReplyKind};
pub use synthesizer::ResponseSynthesizer;
pub use translator::{QueryTranslator, Translation};
