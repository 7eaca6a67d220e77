//! Transport Adapters
//!
//! - stdio.rs: newline-delimited JSON-RPC over stdin/stdout
//! - http.rs: streamable HTTP with Actix Web

pub mod http;
pub mod stdio;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::config::ServerConfig;
use crate::core::error::{ServerError, ServerResult};
use crate::core::server::McpServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    StreamableHttp,
}

impl FromStr for Transport {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" | "streamable-http" | "streamable_http" => Ok(Self::StreamableHttp),
            other => Err(ServerError::config(format!(
                "invalid transport '{other}', expected 'stdio', 'http' or 'streamable-http'"
            ))),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::StreamableHttp => f.write_str("streamable-http"),
        }
    }
}

/// Run `server` on the transport selected by `config` until it shuts down.
pub async fn serve(server: Arc<McpServer>, config: &ServerConfig) -> ServerResult<()> {
    match config.transport {
        Transport::Stdio => stdio::run_server_stdio(server).await?,
        Transport::StreamableHttp => http::run_server_http(server, config).await?,
    }
    Ok(())
}
