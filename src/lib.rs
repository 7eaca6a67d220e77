//! Deployable Model Context Protocol server.
//!
//! Startup runs in a fixed order: configuration, credentials (Azure only),
//! auth provider, server instance, tool registration, transport. See
//! [`build_server`] for everything up to the transport.

pub mod auth;
pub mod client;
pub mod core;
pub mod credentials;
pub mod logging;
pub mod tools;
pub mod transport;

use std::sync::Arc;

use crate::auth::{AuthProvider, AzureProvider, BearerTokenAuth};
use crate::core::config::{AuthConfig, ServerConfig};
use crate::core::error::ServerResult;
use crate::core::server::{McpServer, ServerInfo};
use crate::credentials::{AwsSecretsManager, CredentialResolver};

/// Build the auth provider selected by `config`.
///
/// For Azure this fetches credentials from Secrets Manager first; any
/// failure there aborts startup.
pub async fn build_auth(config: &AuthConfig) -> ServerResult<Option<Arc<dyn AuthProvider>>> {
    match config {
        AuthConfig::None => {
            tracing::warn!("authentication disabled, MCP endpoint is open");
            Ok(None)
        }
        AuthConfig::Bearer { token } => Ok(Some(Arc::new(BearerTokenAuth::new(token.clone())))),
        AuthConfig::Azure { secret_name, region } => {
            let store = AwsSecretsManager::connect(region).await;
            let credentials = CredentialResolver::new(Arc::new(store)).resolve(secret_name).await?;
            Ok(Some(Arc::new(AzureProvider::new(credentials))))
        }
    }
}

/// Construct the server instance with its tools attached.
pub fn build_server(config: &ServerConfig, auth: Option<Arc<dyn AuthProvider>>) -> ServerResult<Arc<McpServer>> {
    let mut server = McpServer::new(ServerInfo::new(config.name.clone()), auth);
    tools::register_all(&mut server)?;
    Ok(Arc::new(server))
}
