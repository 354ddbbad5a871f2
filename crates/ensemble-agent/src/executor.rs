//! Executes one tool-call request against whichever backend owns the name,
//! normalizing every failure into an error-flagged tool result. One bad
//! tool never aborts the loop.

use crate::resolver::{CandidateSet, SEARCH_TOOL_NAME};
use ensemble_core::{ToolCall, ToolResult};
use ensemble_mcp::RemoteServerManager;
use tracing::{debug, warn};

/// Per-exchange tool invocation boundary.
pub struct ToolInvoker<'a> {
    candidates: &'a CandidateSet,
    remotes: &'a RemoteServerManager,
    search_available: bool,
}

impl<'a> ToolInvoker<'a> {
    /// Creates an invoker over the exchange's candidate set and the shared
    /// remote manager. `search_available` controls whether unknown-name
    /// errors suggest the search meta-tool.
    pub fn new(
        candidates: &'a CandidateSet,
        remotes: &'a RemoteServerManager,
        search_available: bool,
    ) -> Self {
        Self {
            candidates,
            remotes,
            search_available,
        }
    }

    /// Resolves and executes one tool call. Never returns an `Err`: every
    /// failure becomes an error-flagged [`ToolResult`] for the model to see.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        debug!(tool = %call.name, call_id = %call.id, "Executing tool call");

        if let Some(registration) = self.candidates.local(&call.name) {
            let decoded = ToolCall::new(
                &call.id,
                &call.name,
                decode_arguments(&call.arguments),
            );
            return match registration.execute(decoded).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Local tool failed");
                    ToolResult::error(&call.id, e.to_string())
                }
            };
        }

        if self.remotes.owns_tool(&call.name) {
            return match self
                .remotes
                .call_tool(&call.name, decode_arguments(&call.arguments))
                .await
            {
                Ok(output) if output.is_error => ToolResult::error(&call.id, output.content),
                Ok(output) => ToolResult::success(&call.id, output.content),
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Remote tool failed");
                    ToolResult::error(&call.id, e.to_string())
                }
            };
        }

        let mut message = format!("Unknown tool '{}'.", call.name);
        if self.search_available {
            message.push_str(&format!(
                " Use the '{SEARCH_TOOL_NAME}' tool to discover available tools."
            ));
        }
        ToolResult::error(&call.id, message)
    }
}

/// Models sometimes hand arguments over as a JSON-encoded string rather
/// than an object; decode that one level.
pub(crate) fn decode_arguments(arguments: &serde_json::Value) -> serde_json::Value {
    match arguments {
        serde_json::Value::String(raw) => {
            serde_json::from_str(raw).unwrap_or_else(|_| arguments.clone())
        }
        other => other.clone(),
    }
}
