use serde::{Deserialize, Serialize};

/// Orchestrator-level knobs for one agent loop instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard bound on model-call/tool-execution cycles per exchange.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Maximum number of tools one semantic search may surface.
    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    /// Minimum similarity score for a semantic search hit.
    #[serde(default)]
    pub search_min_score: f32,
}

fn default_max_tool_iterations() -> u32 {
    10
}

fn default_search_max_results() -> usize {
    5
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            search_max_results: default_search_max_results(),
            search_min_score: 0.0,
        }
    }
}
