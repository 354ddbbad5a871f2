//! Core types and error definitions for the ensemble orchestrator.
//!
//! This crate provides the foundational types shared across all ensemble
//! crates: error handling, conversation messages, tool-call abstractions and
//! the immutable tool specification model.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum for all subsystems.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`Role`] / [`Message`] — Conversation history entries.
//! - [`ToolCall`] / [`ToolResult`] — A model-initiated invocation and its outcome.
//! - [`ToolSpecification`] — A tool's name, description and parameter schema.

pub mod error;
pub mod message;
pub mod spec;
pub mod tool;

pub use error::{EnsembleError, EnsembleResult};
pub use message::{Message, Role};
pub use spec::{ParameterField, ParameterSchema, ToolSpecification};
pub use tool::{ToolCall, ToolResult};
