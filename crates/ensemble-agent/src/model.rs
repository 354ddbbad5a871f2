//! The chat-completion transport contract: message history plus tool
//! specifications in, one assistant turn out.

use ensemble_core::{EnsembleResult, Message, ToolCall, ToolSpecification};
use async_trait::async_trait;

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Terminal: the turn is the final answer.
    Stop,
    /// The turn requests tool invocations.
    ToolCalls,
    /// Any other provider-specific reason.
    Other(String),
}

impl FinishReason {
    /// Maps a wire-level finish reason string.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "stop" => Self::Stop,
            "tool_calls" => Self::ToolCalls,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this is the transport's terminal signal.
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// One assistant turn returned by the model transport.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    /// Textual content of the turn (may be empty on pure tool-call turns).
    pub content: String,
    /// Requested tool invocations, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
}

/// Trait for chat-completion backends.
///
/// System instructions travel as [`ensemble_core::Role::System`] messages in
/// the history; the backend maps them to its wire format.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One blocking request/response round trip.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpecification],
    ) -> EnsembleResult<AssistantTurn>;
}
