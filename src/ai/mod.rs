// AI Module - provider-agnostic email categorization and task generation
//
// Supports:
// - Self-hosted APIs (Ollama)
// - OpenAI and OpenAI-compatible servers

pub mod provider;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod categorizer;
pub mod reconciler;
pub mod analyzer;

pub use provider::*;
pub use analyzer::*;
pub use prompt::Tone;
pub use reconciler::{reconcile, reconcile_categories, reconcile_tasks, Reconciled};
