//! Remote tool-server integration: JSON-RPC protocol types, stdio/HTTP/SSE
//! transports, a per-server client and the connection manager that shares
//! long-lived connections across exchanges.

pub mod client;
pub mod config;
pub mod manager;
pub mod protocol;
pub mod transport;

pub use client::McpClient;
pub use config::{McpServerConfig, McpServersFile, McpTransportType, SUPPORTED_PROTOCOL_VERSIONS};
pub use manager::{RemoteCallOutput, RemoteServerManager};
pub use protocol::{McpToolDef, McpToolResult, ToolAnnotations};
pub use transport::McpTransport;
