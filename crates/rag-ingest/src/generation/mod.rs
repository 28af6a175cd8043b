//! Answer generation with an LLM over retrieved chunks

pub mod chain;
pub mod prompt;

pub use chain::{Answer, RagChain};
pub use prompt::PromptBuilder;
