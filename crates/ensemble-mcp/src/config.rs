//! Remote tool-server configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Protocol versions this client accepts, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 2] = ["2025-03-26", "2024-11-05"];

/// Transport kind for a remote tool server, selected per server by the
/// config's `transportType` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransportType {
    /// Local subprocess speaking newline-delimited JSON-RPC over stdio.
    #[default]
    Stdio,
    /// Streamable HTTP: every message POSTed to one endpoint.
    Http,
    /// HTTP server-sent events: long-lived GET stream plus POST endpoint.
    Sse,
}

/// Configuration for a single remote tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Transport kind (default: stdio).
    #[serde(default, rename = "transportType")]
    pub transport_type: McpTransportType,

    /// Command for the stdio transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments for the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables for the spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// URL for the HTTP and SSE transports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Extra HTTP headers for the HTTP and SSE transports.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout in seconds (default: 30). Also bounds the
    /// initialization handshake.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Protocol versions accepted from the server. Empty means accept any.
    #[serde(default = "default_protocol_versions", rename = "protocolVersions")]
    pub protocol_versions: Vec<String>,

    /// Reconnect once and retry when a call fails at the transport level
    /// (default: true).
    #[serde(default = "default_true")]
    pub reconnect: bool,

    /// Log outgoing requests at debug level.
    #[serde(default, rename = "logRequests")]
    pub log_requests: bool,

    /// Log incoming responses at debug level.
    #[serde(default, rename = "logResponses")]
    pub log_responses: bool,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_protocol_versions() -> Vec<String> {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .map(|v| (*v).to_string())
        .collect()
}

impl McpServerConfig {
    /// The newest protocol version this config accepts, offered in the
    /// `initialize` handshake.
    pub fn offered_protocol_version(&self) -> &str {
        self.protocol_versions
            .first()
            .map_or(SUPPORTED_PROTOCOL_VERSIONS[0], String::as_str)
    }

    /// Whether a server-advertised protocol version is acceptable.
    pub fn accepts_protocol_version(&self, version: &str) -> bool {
        self.protocol_versions.is_empty() || self.protocol_versions.iter().any(|v| v == version)
    }
}

/// Root structure of an `mcp.json`-style configuration file. A `BTreeMap`
/// keeps server initialization order deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServersFile {
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: McpServerConfig = serde_json::from_str(r#"{"command":"test"}"#).unwrap();
        assert_eq!(config.transport_type, McpTransportType::Stdio);
        assert!(config.reconnect);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.args.is_empty());
        assert!(config.env.is_empty());
        assert!(!config.log_requests);
        assert_eq!(config.offered_protocol_version(), "2025-03-26");
        assert!(config.accepts_protocol_version("2024-11-05"));
        assert!(!config.accepts_protocol_version("2019-01-01"));
    }

    #[test]
    fn test_http_config() {
        let config: McpServerConfig = serde_json::from_str(
            r#"{
                "transportType": "http",
                "url": "https://tools.example.com/mcp",
                "headers": {"Authorization": "Bearer abc"},
                "timeout_secs": 5,
                "reconnect": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.transport_type, McpTransportType::Http);
        assert_eq!(config.url.as_deref(), Some("https://tools.example.com/mcp"));
        assert!(!config.reconnect);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_empty_version_list_accepts_anything() {
        let config: McpServerConfig =
            serde_json::from_str(r#"{"command":"x","protocolVersions":[]}"#).unwrap();
        assert!(config.accepts_protocol_version("2099-01-01"));
    }

    #[test]
    fn test_servers_file_is_ordered() {
        let json = r#"{
            "mcpServers": {
                "zeta": {"command": "z"},
                "alpha": {"command": "a"}
            }
        }"#;
        let file: McpServersFile = serde_json::from_str(json).unwrap();
        let names: Vec<&String> = file.mcp_servers.keys().collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_transport_type_serde() {
        assert_eq!(
            serde_json::to_string(&McpTransportType::Stdio).unwrap(),
            "\"stdio\""
        );
        assert_eq!(
            serde_json::to_string(&McpTransportType::Sse).unwrap(),
            "\"sse\""
        );
    }
}
