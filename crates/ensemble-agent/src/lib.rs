//! The agentic tool-calling orchestrator: candidate resolution, the
//! model-call/tool-execution loop, and the tool invocation boundary.
//!
//! One [`AgentLoop`] is shared across exchanges. Per exchange it resolves a
//! candidate tool set from the registry, the semantic index and the remote
//! server manager, then drives the model to convergence:
//!
//! ```no_run
//! use ensemble_agent::{AgentLoop, ModelConfig, OpenAiModel, OrchestratorConfig, ToolExclusions};
//! use ensemble_core::Message;
//! use ensemble_mcp::RemoteServerManager;
//! use ensemble_registry::{SemanticToolIndex, ToolRegistry};
//! use std::sync::Arc;
//!
//! # async fn run() -> ensemble_core::EnsembleResult<()> {
//! let registry = Arc::new(ToolRegistry::new());
//! let index = Arc::new(SemanticToolIndex::new(registry.clone(), None));
//! let remotes = Arc::new(RemoteServerManager::new());
//! let model = Arc::new(OpenAiModel::new(ModelConfig::new("gpt-4o-mini", "sk-...")));
//!
//! let agent = AgentLoop::new(model, registry, index, remotes, OrchestratorConfig::default());
//!
//! let mut history = vec![Message::user("What is 17 + 25?")];
//! let outcome = agent
//!     .run(&mut history, &["math".to_string()], &ToolExclusions::none())
//!     .await?;
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod engine;
pub mod executor;
pub mod model;
pub mod resolver;

pub use backends::{ModelConfig, OpenAiModel};
pub use config::OrchestratorConfig;
pub use engine::{AgentLoop, IterationState, LoopOutcome};
pub use executor::ToolInvoker;
pub use model::{AssistantTurn, FinishReason, ModelClient};
pub use resolver::{CandidateResolver, CandidateSet, ToolExclusions, SEARCH_TOOL_NAME};
