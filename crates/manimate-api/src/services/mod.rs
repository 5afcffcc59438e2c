//! Pipeline services behind the HTTP boundary.

pub mod pipeline;
pub mod prompts;
pub mod tts;

pub use pipeline::Pipeline;
pub use tts::{TtsClient, TtsConfig};
