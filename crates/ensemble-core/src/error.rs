use thiserror::Error;

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Top-level error type for the ensemble orchestrator.
///
/// Recoverable tool failures never surface through this enum during an
/// exchange — they are folded into error-flagged tool results so the model
/// can react to them. The variants below are either fatal for the exchange
/// (`NoToolsAvailable`, `MaxToolIterations`, `ServerInit`) or internal
/// plumbing errors that the invocation boundary converts into tool results.
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// An error from the chat-completion transport.
    #[error("Model error: {0}")]
    Model(String),

    /// An error raised while executing a tool, local or remote.
    #[error("Tool error: {0}")]
    Tool(String),

    /// A transport-level failure talking to a remote tool server.
    ///
    /// Distinct from [`EnsembleError::Tool`]: only transport failures are
    /// eligible for the connection manager's reconnect-and-retry path.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// No candidate tools exist for the requested tags; raised before any
    /// model call is made.
    #[error("No tools available for tags [{0}]")]
    NoToolsAvailable(String),

    /// The agentic loop hit its iteration bound without converging.
    #[error("Exceeded the maximum of {0} tool iterations")]
    MaxToolIterations(u32),

    /// A remote tool server could not be brought up at initialization time.
    #[error("Server '{server}' failed to initialize: {reason}")]
    ServerInit { server: String, reason: String },

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnsembleError {
    /// Whether this error indicates a broken connection rather than a
    /// tool-level failure. Transport errors are the only ones that trigger
    /// a reconnect attempt.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            EnsembleError::Transport(_) | EnsembleError::Http(_) | EnsembleError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(EnsembleError::Transport("reset".into()).is_transport());
        assert!(EnsembleError::Http("503".into()).is_transport());
        assert!(!EnsembleError::Tool("bad args".into()).is_transport());
        assert!(!EnsembleError::Model("quota".into()).is_transport());
    }

    #[test]
    fn fatal_errors_render_their_subject() {
        let err = EnsembleError::MaxToolIterations(10);
        assert!(err.to_string().contains("10"));

        let err = EnsembleError::NoToolsAvailable("math, users".into());
        assert!(err.to_string().contains("math, users"));

        let err = EnsembleError::ServerInit {
            server: "weather".into(),
            reason: "spawn failed".into(),
        };
        assert!(err.to_string().contains("weather"));
    }
}
