//! Client for one remote tool server: initialization handshake, tool
//! listing and tool invocation over whichever transport the server's
//! config declares.

use crate::config::McpServerConfig;
use crate::protocol::{InitializeResult, JsonRpcRequest, McpToolDef, McpToolResult};
use ensemble_core::{EnsembleError, EnsembleResult};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::transport::McpTransport;

/// A connected remote tool server.
pub struct McpClient {
    transport: McpTransport,
    server_name: String,
    next_id: AtomicU64,
    log_requests: bool,
    log_responses: bool,
}

impl McpClient {
    /// Opens a transport per the config, performs the initialization
    /// handshake and lists the server's tools. Every failure here is a
    /// setup failure — the manager reports it as fatal.
    pub async fn connect(
        server_name: &str,
        config: &McpServerConfig,
    ) -> EnsembleResult<(Self, Vec<McpToolDef>)> {
        let transport = McpTransport::connect(server_name, config).await?;

        let client = Self {
            transport,
            server_name: server_name.to_string(),
            next_id: AtomicU64::new(1),
            log_requests: config.log_requests,
            log_responses: config.log_responses,
        };

        let init = client.initialize(config).await?;
        if !config.accepts_protocol_version(&init.protocol_version) {
            return Err(EnsembleError::Config(format!(
                "server '{server_name}' speaks protocol version '{}', accepted: {:?}",
                init.protocol_version, config.protocol_versions
            )));
        }
        info!(
            server = %client.server_name,
            version = %init.protocol_version,
            "Remote tool server initialized"
        );

        client
            .transport
            .notify("notifications/initialized", None)
            .await?;

        let tools = client.list_tools().await?;
        info!(
            server = %client.server_name,
            tools = tools.len(),
            "Remote tools discovered"
        );

        Ok((client, tools))
    }

    /// Sends a request and unwraps the JSON-RPC result. A JSON-RPC error
    /// object is a tool-level failure, not a transport one.
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> EnsembleResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        if self.log_requests {
            debug!(server = %self.server_name, method = %method, request = %serde_json::to_string(&req)?, "-> request");
        }

        let resp = self.transport.request(&req).await?;

        if self.log_responses {
            debug!(server = %self.server_name, method = %method, result = ?resp.result, error = ?resp.error, "<- response");
        }

        if let Some(err) = &resp.error {
            return Err(EnsembleError::Tool(format!(
                "server '{}' returned error {}: {}",
                self.server_name, err.code, err.message
            )));
        }

        resp.result.ok_or_else(|| {
            EnsembleError::Tool(format!(
                "server '{}' returned an empty result for '{method}'",
                self.server_name
            ))
        })
    }

    async fn initialize(&self, config: &McpServerConfig) -> EnsembleResult<InitializeResult> {
        let params = serde_json::json!({
            "protocolVersion": config.offered_protocol_version(),
            "capabilities": {},
            "clientInfo": {
                "name": "ensemble",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = self.request("initialize", Some(params)).await?;
        serde_json::from_value(result).map_err(EnsembleError::from)
    }

    /// Lists the tools this server currently provides.
    pub async fn list_tools(&self) -> EnsembleResult<Vec<McpToolDef>> {
        let result = self.request("tools/list", None).await?;
        let tools = result
            .get("tools")
            .cloned()
            .unwrap_or(serde_json::json!([]));
        serde_json::from_value(tools).map_err(EnsembleError::from)
    }

    /// Invokes one tool on this server.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> EnsembleResult<McpToolResult> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let result = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(result).map_err(EnsembleError::from)
    }

    /// This server's configured name.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("server", &self.server_name)
            .finish_non_exhaustive()
    }
}
