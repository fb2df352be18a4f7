pub mod context;
pub mod llm;
pub mod oracle;
pub mod responder;

pub use context::PromptContext;
pub use llm::{FailingLlmClient, HttpLlmClient, LlmClient, ScriptedLlmClient};
pub use oracle::ExtractionOracle;
pub use responder::{Responder, FALLBACK_REPLY};
