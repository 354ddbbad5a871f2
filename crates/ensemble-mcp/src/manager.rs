//! Connection manager for remote tool servers: one long-lived connection
//! per configured server, shared across exchanges, with single-shot
//! reconnect-and-retry on transport failure.

use crate::client::McpClient;
use crate::config::McpServerConfig;
use crate::protocol::McpToolDef;
use ensemble_core::{EnsembleError, EnsembleResult, ToolSpecification};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// The normalized outcome of one remote tool call.
#[derive(Debug, Clone)]
pub struct RemoteCallOutput {
    /// All textual content blocks, joined.
    pub content: String,
    /// Whether the server flagged the call as failed.
    pub is_error: bool,
}

struct ManagedServer {
    config: McpServerConfig,
    client: Arc<McpClient>,
    /// Specifications of the tools this server currently owns (duplicates
    /// lost to another server are not listed here).
    tools: Vec<ToolSpecification>,
    tool_names: Vec<String>,
    reconnect_count: usize,
}

/// Owns one connection per configured remote tool server.
///
/// The ownership and return-direct maps are process-wide shared state, read
/// on every request; per-server state sits behind its own async lock so one
/// server's reconnect never disturbs an in-flight call on another.
#[derive(Default)]
pub struct RemoteServerManager {
    servers: parking_lot::RwLock<BTreeMap<String, Arc<tokio::sync::RwLock<ManagedServer>>>>,
    tool_owner: parking_lot::RwLock<HashMap<String, String>>,
    return_direct: parking_lot::RwLock<HashSet<String>>,
}

impl RemoteServerManager {
    /// Creates a manager with no servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects every configured server. Any failure is fatal at setup
    /// time, reported as [`EnsembleError::ServerInit`].
    pub async fn initialize(
        &self,
        configs: &BTreeMap<String, McpServerConfig>,
    ) -> EnsembleResult<()> {
        for (name, config) in configs {
            self.connect_server(name, config).await?;
        }
        Ok(())
    }

    /// Connects a single server and adopts its tools.
    pub async fn connect_server(
        &self,
        name: &str,
        config: &McpServerConfig,
    ) -> EnsembleResult<()> {
        let (client, tools) =
            McpClient::connect(name, config)
                .await
                .map_err(|e| EnsembleError::ServerInit {
                    server: name.to_string(),
                    reason: e.to_string(),
                })?;

        let (specs, names) = {
            let mut owner = self.tool_owner.write();
            let mut direct = self.return_direct.write();
            adopt_tools(&mut owner, &mut direct, name, &[], &tools)
        };

        info!(server = %name, tools = names.len(), "Remote tool server connected");

        self.servers.write().insert(
            name.to_string(),
            Arc::new(tokio::sync::RwLock::new(ManagedServer {
                config: config.clone(),
                client: Arc::new(client),
                tools: specs,
                tool_names: names,
                reconnect_count: 0,
            })),
        );

        Ok(())
    }

    /// Whether a tool name is owned by one of the managed servers.
    pub fn owns_tool(&self, name: &str) -> bool {
        self.tool_owner.read().contains_key(name)
    }

    /// Whether a tool is annotated return-direct by its server.
    pub fn is_return_direct(&self, name: &str) -> bool {
        self.return_direct.read().contains(name)
    }

    /// Number of managed servers.
    pub fn server_count(&self) -> usize {
        self.servers.read().len()
    }

    /// Specifications of every tool owned by servers not in `excluded`,
    /// in server-name order.
    pub async fn tool_specifications(
        &self,
        excluded: &HashSet<String>,
    ) -> Vec<ToolSpecification> {
        let slots: Vec<Arc<tokio::sync::RwLock<ManagedServer>>> = {
            let servers = self.servers.read();
            servers
                .iter()
                .filter(|(name, _)| !excluded.contains(*name))
                .map(|(_, slot)| slot.clone())
                .collect()
        };

        let mut out = Vec::new();
        for slot in slots {
            out.extend(slot.read().await.tools.iter().cloned());
        }
        out
    }

    /// Forwards a tool call to its owning server.
    ///
    /// On a transport-level failure with reconnect enabled, the failed
    /// connection is replaced under that server's lock and the call retried
    /// exactly once against the new client. Tool-level errors and exhausted
    /// retries propagate to the caller, which folds them into an
    /// error-flagged tool result.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> EnsembleResult<RemoteCallOutput> {
        let server_name = self
            .tool_owner
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EnsembleError::Tool(format!("no server owns tool '{name}'")))?;

        let slot = self
            .servers
            .read()
            .get(&server_name)
            .cloned()
            .ok_or_else(|| EnsembleError::Tool(format!("server '{server_name}' is gone")))?;

        let (client, reconnect_enabled) = {
            let guard = slot.read().await;
            (guard.client.clone(), guard.config.reconnect)
        };

        match client.call_tool(name, arguments.clone()).await {
            Ok(result) => Ok(flatten(result)),
            Err(e) if e.is_transport() && reconnect_enabled => {
                warn!(
                    server = %server_name,
                    tool = %name,
                    error = %e,
                    "Transport failure, reconnecting server"
                );
                let client = self.reconnect_server(&server_name, &slot, &client).await?;
                let result = client.call_tool(name, arguments).await?;
                Ok(flatten(result))
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces one server's connection under its own lock. If a concurrent
    /// caller already swapped the client, the replacement is reused instead
    /// of opening a redundant one.
    async fn reconnect_server(
        &self,
        server_name: &str,
        slot: &Arc<tokio::sync::RwLock<ManagedServer>>,
        failed: &Arc<McpClient>,
    ) -> EnsembleResult<Arc<McpClient>> {
        let mut guard = slot.write().await;

        if !Arc::ptr_eq(&guard.client, failed) {
            return Ok(guard.client.clone());
        }

        let (client, tools) = McpClient::connect(server_name, &guard.config).await?;
        let client = Arc::new(client);

        {
            let mut owner = self.tool_owner.write();
            let mut direct = self.return_direct.write();
            let stale = guard.tool_names.clone();
            let (specs, names) = adopt_tools(&mut owner, &mut direct, server_name, &stale, &tools);
            guard.tools = specs;
            guard.tool_names = names;
        }

        guard.client = client.clone();
        guard.reconnect_count += 1;
        info!(
            server = %server_name,
            reconnects = guard.reconnect_count,
            tools = guard.tool_names.len(),
            "Remote tool server reconnected"
        );

        Ok(client)
    }
}

fn flatten(result: crate::protocol::McpToolResult) -> RemoteCallOutput {
    RemoteCallOutput {
        content: result.text(),
        is_error: result.is_error,
    }
}

/// Applies one server's (re)listed tools to the shared ownership maps.
///
/// Stale names previously owned by this server are dropped first, then new
/// names are claimed. A name already owned by another server stays with its
/// first owner; the collision is logged, not an error. Returns the
/// specifications and names this server ends up owning.
fn adopt_tools(
    owner: &mut HashMap<String, String>,
    return_direct: &mut HashSet<String>,
    server: &str,
    stale_names: &[String],
    tools: &[McpToolDef],
) -> (Vec<ToolSpecification>, Vec<String>) {
    for name in stale_names {
        if owner.get(name).is_some_and(|s| s == server) {
            owner.remove(name);
            return_direct.remove(name);
        }
    }

    let mut specs = Vec::new();
    let mut names = Vec::new();

    for tool in tools {
        if let Some(existing) = owner.get(&tool.name) {
            warn!(
                tool = %tool.name,
                server = %server,
                owned_by = %existing,
                "Duplicate tool name, first registration wins"
            );
            continue;
        }
        owner.insert(tool.name.clone(), server.to_string());
        if tool.is_return_direct() {
            return_direct.insert(tool.name.clone());
        }
        specs.push(ToolSpecification::from_remote(
            &tool.name,
            &tool.description,
            &tool.input_schema,
        ));
        names.push(tool.name.clone());
    }

    (specs, names)
}
