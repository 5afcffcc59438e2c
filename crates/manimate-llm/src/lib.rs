//! LLM completion client and structured-output generation.
//!
//! This crate provides:
//! - A `CompletionClient` trait plus an OpenAI-compatible implementation
//! - Code-fence-tolerant strict-JSON parsing of model responses
//! - A bounded retry loop that re-prompts the model on malformed output

pub mod backoff;
pub mod client;
pub mod error;
pub mod generate;
pub mod parser;

pub use backoff::BackoffPolicy;
pub use client::{ChatMessage, CompletionClient, OpenAiClient, OpenAiConfig};
pub use error::{LlmError, LlmResult};
pub use generate::{generate_structured, GeneratorConfig, StructuredOutput};
pub use parser::{parse_structured, strip_code_fences, RepairPrompt};
