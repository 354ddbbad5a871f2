//! The process-wide tool registry: tag-indexed, visibility-aware, safe for
//! concurrent registration and lookup.

use ensemble_core::{EnsembleError, EnsembleResult, ToolCall, ToolResult, ToolSpecification};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// How a registered tool surfaces in an exchange's candidate set.
///
/// Fixed at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Always offered to the model when one of its tags matches.
    Exposed,
    /// Hidden until discovered through the semantic search meta-tool.
    Searchable,
}

/// Trait implemented by every locally-executable tool.
#[async_trait]
pub trait LocalTool: Send + Sync {
    /// The tool's advertised specification.
    fn specification(&self) -> &ToolSpecification;

    /// Executes one tool call. Arguments arrive as decoded JSON.
    async fn execute(&self, call: ToolCall) -> EnsembleResult<ToolResult>;
}

/// A [`LocalTool`] bound to its tags and visibility class.
///
/// Lives in the registry for the lifetime of whatever registered it and is
/// removed only by explicit unregistration at shutdown.
pub struct ToolRegistration {
    tool: Arc<dyn LocalTool>,
    tags: Vec<String>,
    visibility: Visibility,
}

impl ToolRegistration {
    /// Binds a tool to one or more tags with the given visibility.
    pub fn new(
        tool: Arc<dyn LocalTool>,
        tags: Vec<String>,
        visibility: Visibility,
    ) -> EnsembleResult<Self> {
        if tags.is_empty() {
            return Err(EnsembleError::Config(format!(
                "tool '{}' registered without tags",
                tool.specification().name()
            )));
        }
        Ok(Self {
            tool,
            tags,
            visibility,
        })
    }

    /// The registered tool's name.
    pub fn name(&self) -> &str {
        self.tool.specification().name()
    }

    /// The registered tool's specification.
    pub fn specification(&self) -> &ToolSpecification {
        self.tool.specification()
    }

    /// The tags this registration is indexed under.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The visibility class fixed at registration.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Executes the underlying tool.
    pub async fn execute(&self, call: ToolCall) -> EnsembleResult<ToolResult> {
        self.tool.execute(call).await
    }
}

impl std::fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("name", &self.name())
            .field("tags", &self.tags)
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// Tag-indexed store of tool registrations.
///
/// Written during route/server lifecycle transitions, read on every request;
/// a read-mostly lock keeps lookups cheap. Registration order is preserved
/// per tag so iteration is deterministic.
#[derive(Default)]
pub struct ToolRegistry {
    by_tag: RwLock<HashMap<String, Vec<Arc<ToolRegistration>>>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a registration under each of its tags.
    pub fn register(&self, registration: Arc<ToolRegistration>) {
        let mut by_tag = self.by_tag.write();
        for tag in registration.tags() {
            by_tag
                .entry(tag.clone())
                .or_default()
                .push(registration.clone());
        }
        info!(
            tool = %registration.name(),
            tags = ?registration.tags(),
            visibility = ?registration.visibility(),
            "Registered tool"
        );
    }

    /// Removes a registration (matched by name) from each of its tags.
    pub fn unregister(&self, registration: &ToolRegistration) {
        let mut by_tag = self.by_tag.write();
        for tag in registration.tags() {
            if let Some(entries) = by_tag.get_mut(tag) {
                entries.retain(|r| r.name() != registration.name());
                if entries.is_empty() {
                    by_tag.remove(tag);
                }
            }
        }
        debug!(tool = %registration.name(), "Unregistered tool");
    }

    /// Returns exposed registrations whose tag set intersects `tags`,
    /// deduplicated by name (first registration wins), in requested-tag then
    /// registration order.
    pub fn lookup_exposed(&self, tags: &[String]) -> Vec<Arc<ToolRegistration>> {
        self.lookup(tags, Visibility::Exposed)
    }

    /// Returns searchable registrations whose tag set intersects `tags`.
    pub fn lookup_searchable(&self, tags: &[String]) -> Vec<Arc<ToolRegistration>> {
        self.lookup(tags, Visibility::Searchable)
    }

    /// Whether any searchable registration matches one of `tags`.
    pub fn has_searchable(&self, tags: &[String]) -> bool {
        let by_tag = self.by_tag.read();
        tags.iter().any(|tag| {
            by_tag
                .get(tag)
                .is_some_and(|entries| entries.iter().any(|r| r.visibility() == Visibility::Searchable))
        })
    }

    fn lookup(&self, tags: &[String], visibility: Visibility) -> Vec<Arc<ToolRegistration>> {
        let by_tag = self.by_tag.read();
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for tag in tags {
            let Some(entries) = by_tag.get(tag) else {
                continue;
            };
            for registration in entries {
                if registration.visibility() != visibility {
                    continue;
                }
                if seen.insert(registration.name().to_string()) {
                    out.push(registration.clone());
                }
            }
        }

        out
    }

    /// Total number of distinct registrations.
    pub fn len(&self) -> usize {
        let by_tag = self.by_tag.read();
        let mut seen: HashSet<&str> = HashSet::new();
        for entries in by_tag.values() {
            for registration in entries {
                seen.insert(registration.name());
            }
        }
        seen.len()
    }

    /// Whether the registry holds no registrations.
    pub fn is_empty(&self) -> bool {
        self.by_tag.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_core::ToolSpecification;

    pub(crate) struct StaticTool {
        spec: ToolSpecification,
        reply: String,
    }

    impl StaticTool {
        pub(crate) fn new(name: &str, description: &str, reply: &str) -> Self {
            Self {
                spec: ToolSpecification::new(name, description),
                reply: reply.to_string(),
            }
        }
    }

    #[async_trait]
    impl LocalTool for StaticTool {
        fn specification(&self) -> &ToolSpecification {
            &self.spec
        }

        async fn execute(&self, call: ToolCall) -> EnsembleResult<ToolResult> {
            Ok(ToolResult::success(&call.id, &self.reply))
        }
    }

    fn register(
        registry: &ToolRegistry,
        name: &str,
        tags: &[&str],
        visibility: Visibility,
    ) -> Arc<ToolRegistration> {
        let tool = Arc::new(StaticTool::new(name, name, "ok"));
        let registration = Arc::new(
            ToolRegistration::new(
                tool,
                tags.iter().map(|t| t.to_string()).collect(),
                visibility,
            )
            .expect("tags"),
        );
        registry.register(registration.clone());
        registration
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn lookup_matches_any_requested_tag() {
        let registry = ToolRegistry::new();
        register(&registry, "add", &["math"], Visibility::Exposed);
        register(&registry, "lookup_user", &["users", "admin"], Visibility::Exposed);

        let found = registry.lookup_exposed(&tags(&["math", "users"]));
        let names: Vec<&str> = found.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["add", "lookup_user"]);

        assert!(registry.lookup_exposed(&tags(&["billing"])).is_empty());
    }

    #[test]
    fn exposed_lookup_never_returns_searchable() {
        let registry = ToolRegistry::new();
        register(&registry, "hidden", &["users"], Visibility::Searchable);
        register(&registry, "visible", &["users"], Visibility::Exposed);

        let found = registry.lookup_exposed(&tags(&["users"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "visible");

        assert!(registry.has_searchable(&tags(&["users"])));
        assert!(!registry.has_searchable(&tags(&["math"])));
    }

    #[test]
    fn duplicate_names_first_registration_wins() {
        let registry = ToolRegistry::new();
        register(&registry, "add", &["math"], Visibility::Exposed);
        register(&registry, "add", &["arithmetic"], Visibility::Exposed);

        let found = registry.lookup_exposed(&tags(&["math", "arithmetic"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tags(), &["math".to_string()]);
    }

    #[test]
    fn unregister_removes_from_all_tags() {
        let registry = ToolRegistry::new();
        let registration = register(&registry, "add", &["math", "basics"], Visibility::Exposed);
        assert_eq!(registry.len(), 1);

        registry.unregister(&registration);
        assert!(registry.lookup_exposed(&tags(&["math"])).is_empty());
        assert!(registry.lookup_exposed(&tags(&["basics"])).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn registration_requires_tags() {
        let tool = Arc::new(StaticTool::new("bare", "no tags", "ok"));
        let result = ToolRegistration::new(tool, vec![], Visibility::Exposed);
        assert!(matches!(result, Err(EnsembleError::Config(_))));
    }

    #[test]
    fn registration_order_is_preserved() {
        let registry = ToolRegistry::new();
        for name in ["first", "second", "third"] {
            register(&registry, name, &["seq"], Visibility::Exposed);
        }
        let names: Vec<String> = registry
            .lookup_exposed(&tags(&["seq"]))
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn concurrent_registration_and_lookup() {
        let registry = Arc::new(ToolRegistry::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                let tool = Arc::new(StaticTool::new(&format!("tool_{i}"), "t", "ok"));
                let registration = Arc::new(
                    ToolRegistration::new(tool, vec!["shared".into()], Visibility::Exposed)
                        .expect("tags"),
                );
                registry.register(registration);
                registry.lookup_exposed(&["shared".to_string()]).len()
            }));
        }

        for handle in handles {
            assert!(handle.join().expect("thread") >= 1);
        }
        assert_eq!(registry.len(), 8);
    }
}
