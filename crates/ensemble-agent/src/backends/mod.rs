//! Concrete [`ModelClient`] implementations.
//!
//! To add a provider, create a module here, implement
//! [`crate::model::ModelClient`] for its struct, and hand it to
//! [`crate::AgentLoop`] behind an `Arc`.
//!
//! [`ModelClient`]: crate::model::ModelClient

pub mod openai;

pub use openai::{ModelConfig, OpenAiModel};
