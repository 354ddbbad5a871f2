//! Builds the per-exchange candidate tool set: exposed registry matches,
//! remote servers' tools, and — when searchable tools are reachable — the
//! synthetic search meta-tool.

use ensemble_core::{EnsembleError, EnsembleResult, ParameterField, ToolSpecification};
use ensemble_mcp::RemoteServerManager;
use ensemble_registry::{SemanticToolIndex, ToolRegistration, ToolRegistry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Name of the synthetic meta-tool that surfaces searchable tools on demand.
pub const SEARCH_TOOL_NAME: &str = "search_tools";

/// Specification of the search meta-tool, the only path by which a
/// searchable tool can enter a candidate set.
pub fn search_tool_specification() -> ToolSpecification {
    ToolSpecification::new(
        SEARCH_TOOL_NAME,
        "Search the catalog of additional available tools. Use this when none \
         of the current tools fits the task; newly found tools become \
         available for subsequent calls.",
    )
    .with_parameter(
        ParameterField::new("query", "string", true)
            .with_description("Natural-language description of the capability needed"),
    )
}

/// Tags and/or remote-server names dropped from one exchange's candidate
/// set. Never mutates the registry.
#[derive(Debug, Clone, Default)]
pub struct ToolExclusions {
    /// Tags to drop.
    pub tags: HashSet<String>,
    /// Remote-server names to drop.
    pub servers: HashSet<String>,
}

impl ToolExclusions {
    /// No exclusions.
    pub fn none() -> Self {
        Self::default()
    }
}

/// The mutable per-exchange working set of tools offered to the model.
///
/// Names are unique; on conflict the first entry wins. Grows mid-loop when
/// the search meta-tool discovers additional tools.
#[derive(Debug, Default)]
pub struct CandidateSet {
    specs: Vec<ToolSpecification>,
    local: HashMap<String, Arc<ToolRegistration>>,
}

impl CandidateSet {
    /// Adds a locally-executable registration; false if the name is taken.
    pub fn add_local(&mut self, registration: Arc<ToolRegistration>) -> bool {
        if self.contains(registration.name()) {
            return false;
        }
        self.specs.push(registration.specification().clone());
        self.local
            .insert(registration.name().to_string(), registration);
        true
    }

    /// Adds a remote or synthetic specification; false if the name is taken.
    pub fn add_spec(&mut self, spec: ToolSpecification) -> bool {
        if self.contains(spec.name()) {
            return false;
        }
        self.specs.push(spec);
        true
    }

    /// Whether a tool name is already present.
    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name() == name)
    }

    /// The specifications offered to the model, in insertion order.
    pub fn specs(&self) -> &[ToolSpecification] {
        &self.specs
    }

    /// The local registration owning `name`, if any.
    pub fn local(&self, name: &str) -> Option<&Arc<ToolRegistration>> {
        self.local.get(name)
    }

    /// Number of candidate tools.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Computes the initial candidate set for one exchange.
pub struct CandidateResolver {
    registry: Arc<ToolRegistry>,
    index: Arc<SemanticToolIndex>,
    remotes: Arc<RemoteServerManager>,
}

impl CandidateResolver {
    /// Creates a resolver over the shared registry, index and remote manager.
    pub fn new(
        registry: Arc<ToolRegistry>,
        index: Arc<SemanticToolIndex>,
        remotes: Arc<RemoteServerManager>,
    ) -> Self {
        Self {
            registry,
            index,
            remotes,
        }
    }

    /// The positive tags minus the excluded ones, order preserved.
    pub fn effective_tags(tags: &[String], exclusions: &ToolExclusions) -> Vec<String> {
        tags.iter()
            .filter(|t| !exclusions.tags.contains(*t))
            .cloned()
            .collect()
    }

    /// Builds the candidate set, or fails with
    /// [`EnsembleError::NoToolsAvailable`] before any model call is made.
    pub async fn resolve(
        &self,
        tags: &[String],
        exclusions: &ToolExclusions,
    ) -> EnsembleResult<CandidateSet> {
        let effective = Self::effective_tags(tags, exclusions);
        let mut candidates = CandidateSet::default();

        // A registration is dropped only when every one of its tags is
        // excluded; partial overlap with the exclusion set keeps it.
        for registration in self.registry.lookup_exposed(tags) {
            if registration
                .tags()
                .iter()
                .all(|t| exclusions.tags.contains(t))
            {
                continue;
            }
            candidates.add_local(registration);
        }

        for spec in self.remotes.tool_specifications(&exclusions.servers).await {
            if !candidates.add_spec(spec) {
                debug!("Remote tool shadowed by an earlier candidate");
            }
        }

        if self.index.is_available(&effective) {
            candidates.add_spec(search_tool_specification());
        }

        if candidates.is_empty() {
            return Err(EnsembleError::NoToolsAvailable(tags.join(", ")));
        }

        debug!(tools = candidates.len(), tags = ?effective, "Resolved candidate set");
        Ok(candidates)
    }
}
