//! The agentic loop: call the model, execute requested tools, append
//! results, repeat until a final answer, a return-direct short circuit, or
//! the iteration bound.

use crate::config::OrchestratorConfig;
use crate::executor::{decode_arguments, ToolInvoker};
use crate::model::{FinishReason, ModelClient};
use crate::resolver::{CandidateResolver, CandidateSet, ToolExclusions, SEARCH_TOOL_NAME};
use ensemble_core::{EnsembleError, EnsembleResult, Message, ToolCall, ToolResult};
use ensemble_mcp::RemoteServerManager;
use ensemble_registry::{SemanticToolIndex, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Audit record of one loop run.
#[derive(Debug, Clone, Default)]
pub struct IterationState {
    /// Completed model-call/tool-execution cycles.
    pub iterations: u32,
    /// Every tool name the model invoked, in execution order.
    pub invoked_tools: Vec<String>,
    /// Whether the run ended in a return-direct short circuit.
    pub return_direct: bool,
    /// The last finish reason reported by the model.
    pub finish_reason: Option<FinishReason>,
}

/// The outcome of one exchange.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// The final answer: the model's last text, or a return-direct tool's
    /// raw result.
    pub answer: String,
    /// Audit state accumulated over the run.
    pub state: IterationState,
}

/// Drives repeated model-call/tool-execution cycles to convergence.
///
/// One engine instance is shared across exchanges; everything mutable per
/// exchange (candidate set, history, iteration state) is local to [`run`].
///
/// [`run`]: AgentLoop::run
pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    index: Arc<SemanticToolIndex>,
    remotes: Arc<RemoteServerManager>,
    config: OrchestratorConfig,
}

impl AgentLoop {
    /// Assembles the loop over the shared registry, index, remote manager
    /// and a model transport.
    pub fn new(
        model: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        index: Arc<SemanticToolIndex>,
        remotes: Arc<RemoteServerManager>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            model,
            registry,
            index,
            remotes,
            config,
        }
    }

    /// Runs one exchange to completion, appending every assistant turn and
    /// tool result to `history`. The caller owns the history across
    /// exchanges; within one run it is append-only.
    pub async fn run(
        &self,
        history: &mut Vec<Message>,
        tags: &[String],
        exclusions: &ToolExclusions,
    ) -> EnsembleResult<LoopOutcome> {
        let resolver = CandidateResolver::new(
            self.registry.clone(),
            self.index.clone(),
            self.remotes.clone(),
        );
        let mut candidates = resolver.resolve(tags, exclusions).await?;
        let effective_tags = CandidateResolver::effective_tags(tags, exclusions);

        let mut state = IterationState::default();
        info!(tags = ?tags, tools = candidates.len(), "Starting agent loop");

        loop {
            let turn = self.model.chat(history, candidates.specs()).await?;
            state.finish_reason = Some(turn.finish_reason.clone());

            if turn.tool_calls.is_empty() || turn.finish_reason.is_stop() {
                history.push(Message::assistant(&turn.content));
                info!(iterations = state.iterations, "Agent loop done");
                return Ok(LoopOutcome {
                    answer: turn.content,
                    state,
                });
            }

            history.push(Message::assistant_with_calls(
                &turn.content,
                turn.tool_calls.clone(),
            ));

            // Execute in model-emitted order; later calls may depend on
            // earlier ones, so there is no fan-out.
            let mut executed: Vec<ToolResult> = Vec::new();
            let mut all_return_direct = true;
            for call in &turn.tool_calls {
                state.invoked_tools.push(call.name.clone());

                let result = if call.name == SEARCH_TOOL_NAME && candidates.contains(SEARCH_TOOL_NAME)
                {
                    // Meta-tool: grows the candidate set and never counts
                    // toward the return-direct check.
                    self.run_search(&mut candidates, call, &effective_tags).await
                } else {
                    let invoker = ToolInvoker::new(
                        &candidates,
                        &self.remotes,
                        candidates.contains(SEARCH_TOOL_NAME),
                    );
                    let result = invoker.invoke(call).await;
                    all_return_direct &= self.remotes.is_return_direct(&call.name);
                    executed.push(result.clone());
                    result
                };

                history.push(Message::tool_result(&result));
            }

            if !executed.is_empty() && all_return_direct && executed.iter().all(|r| !r.is_error) {
                let answer = executed
                    .last()
                    .map(|r| r.content.clone())
                    .unwrap_or_default();
                state.return_direct = true;
                info!(iterations = state.iterations, "Return-direct short circuit");
                return Ok(LoopOutcome { answer, state });
            }

            state.iterations += 1;
            if state.iterations >= self.config.max_tool_iterations {
                warn!(
                    max = self.config.max_tool_iterations,
                    "Agent loop hit its iteration bound"
                );
                return Err(EnsembleError::MaxToolIterations(
                    self.config.max_tool_iterations,
                ));
            }
        }
    }

    /// Handles one invocation of the search meta-tool: query the semantic
    /// index and merge discoveries into the candidate set for subsequent
    /// iterations.
    async fn run_search(
        &self,
        candidates: &mut CandidateSet,
        call: &ToolCall,
        effective_tags: &[String],
    ) -> ToolResult {
        let arguments = decode_arguments(&call.arguments);
        let query = match arguments.get("query").and_then(|q| q.as_str()) {
            Some(query) => query.to_string(),
            None => match arguments.as_str() {
                Some(raw) => raw.to_string(),
                None => {
                    return ToolResult::error(&call.id, "search_tools requires a 'query' argument")
                }
            },
        };

        let hits = match self
            .index
            .search(
                &query,
                effective_tags,
                self.config.search_max_results,
                self.config.search_min_score,
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Tool search failed");
                return ToolResult::error(&call.id, e.to_string());
            }
        };

        let mut added = Vec::new();
        for hit in hits {
            if candidates.add_local(hit.registration.clone()) {
                added.push(hit.registration.name().to_string());
            }
        }

        debug!(query = %query, found = added.len(), "Tool search merged results");

        if added.is_empty() {
            ToolResult::success(&call.id, "No additional tools found for that query.")
        } else {
            ToolResult::success(
                &call.id,
                format!("Found additional tools, now available: {}", added.join(", ")),
            )
        }
    }
}
