//! Configuration Loading
//!
//! All settings come from environment variables and are read once at startup
//! into an immutable `ServerConfig`. `from_lookup` takes the variable source as
//! a closure so tests never have to mutate the process environment.

use std::env;

use crate::core::error::{ServerError, ServerResult};
use crate::transport::Transport;

pub const DEFAULT_SERVER_NAME: &str = "Remote MCP Server";
pub const DEFAULT_MCP_PATH: &str = "/mcp/";
pub const DEFAULT_ENVIRONMENT: &str = "unknown";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// How callers of the MCP endpoint are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    None,
    /// A single shared bearer token.
    Bearer { token: String },
    /// Azure Entra ID, with app credentials held in AWS Secrets Manager.
    Azure { secret_name: String, region: String },
}

// Hand-written so the bearer token never shows up in logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
            Self::Azure { secret_name, region } => f
                .debug_struct("Azure")
                .field("secret_name", secret_name)
                .field("region", region)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub auth: AuthConfig,
    /// Mount path of the MCP endpoint, always starting with `/`.
    pub path: String,
    pub environment: String,
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub stateless_http: bool,
    pub workers: usize,
    /// Public base URL, used to advertise the protected resource.
    pub base_url: String,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let name = get("MCP_SERVER_NAME").unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());
        let path = normalize_path(&get("MCP_PATH").unwrap_or_else(|| DEFAULT_MCP_PATH.to_string()));
        let environment = get("ENVIRONMENT").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let transport = match get("MCP_TRANSPORT") {
            Some(value) => value.parse()?,
            None => Transport::StreamableHttp,
        };

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ServerError::config(format!("PORT must be a port number, got '{value}'")))?,
            None => DEFAULT_PORT,
        };

        let stateless_http = match get("MCP_STATELESS_HTTP") {
            Some(value) => parse_bool("MCP_STATELESS_HTTP", &value)?,
            None => false,
        };

        // Defaults to CPU count but capped at 16 to avoid excessive context switching
        let workers = match get("WORKER_THREADS") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ServerError::config(format!("WORKER_THREADS must be a positive integer, got '{value}'"))
                })?,
            None => num_cpus::get().clamp(1, 16),
        };

        let base_url = get("MCP_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let auth = load_auth(&get)?;

        Ok(Self {
            name,
            auth,
            path,
            environment,
            transport,
            host,
            port,
            stateless_http,
            workers,
            base_url,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public URL of the MCP endpoint.
    pub fn resource_url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

fn load_auth<F>(get: &F) -> ServerResult<AuthConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let token = get("MCP_AUTH_TOKEN");
    let provider = get("MCP_AUTH_PROVIDER").map(|p| p.trim().to_ascii_lowercase());

    let provider = match provider.as_deref() {
        Some(p) => p.to_string(),
        None if token.is_some() => "bearer".to_string(),
        None => "none".to_string(),
    };

    match provider.as_str() {
        "none" => Ok(AuthConfig::None),
        "bearer" => token
            .map(|token| AuthConfig::Bearer { token })
            .ok_or_else(|| ServerError::config("MCP_AUTH_PROVIDER=bearer requires MCP_AUTH_TOKEN")),
        "azure" => {
            let secret_name = get("SECRET_NAME")
                .ok_or_else(|| ServerError::config("MCP_AUTH_PROVIDER=azure requires SECRET_NAME"))?;
            let region = get("AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
            Ok(AuthConfig::Azure { secret_name, region })
        }
        other => Err(ServerError::config(format!(
            "unknown MCP_AUTH_PROVIDER '{other}', expected 'none', 'bearer' or 'azure'"
        ))),
    }
}

fn parse_bool(key: &str, value: &str) -> ServerResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ServerError::config(format!("{key} must be a boolean, got '{value}'"))),
    }
}

/// Ensure the path has a leading slash and a trailing one.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ServerResult<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = load(&[]).unwrap();
        assert_eq!(config.name, DEFAULT_SERVER_NAME);
        assert_eq!(config.path, "/mcp/");
        assert_eq!(config.environment, "unknown");
        assert_eq!(config.transport, Transport::StreamableHttp);
        assert_eq!(config.port, 8000);
        assert!(!config.stateless_http);
        assert_eq!(config.auth, AuthConfig::None);
        assert_eq!(config.resource_url(), "http://localhost:8000/mcp/");
        assert!(config.workers >= 1 && config.workers <= 16);
    }

    #[test]
    fn auth_token_implies_bearer_auth() {
        let config = load(&[("MCP_AUTH_TOKEN", "s3cret")]).unwrap();
        assert_eq!(config.auth, AuthConfig::Bearer { token: "s3cret".to_string() });
    }

    #[test]
    fn bearer_token_is_redacted_in_debug_output() {
        let config = load(&[("MCP_AUTH_TOKEN", "s3cret")]).unwrap();
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn explicit_bearer_without_token_is_a_configuration_error() {
        let err = load(&[("MCP_AUTH_PROVIDER", "bearer")]).unwrap_err();
        assert!(matches!(err, ServerError::Configuration(_)));
    }

    #[test]
    fn azure_requires_secret_name() {
        let err = load(&[("MCP_AUTH_PROVIDER", "azure")]).unwrap_err();
        assert!(matches!(err, ServerError::Configuration(msg) if msg.contains("SECRET_NAME")));
    }

    #[test]
    fn azure_region_defaults() {
        let config = load(&[("MCP_AUTH_PROVIDER", "Azure"), ("SECRET_NAME", "mcp/azure")]).unwrap();
        assert_eq!(
            config.auth,
            AuthConfig::Azure {
                secret_name: "mcp/azure".to_string(),
                region: DEFAULT_AWS_REGION.to_string(),
            }
        );
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = load(&[
            ("MCP_SERVER_NAME", "Demo"),
            ("MCP_PATH", "tools"),
            ("ENVIRONMENT", "staging"),
            ("MCP_TRANSPORT", "stdio"),
            ("PORT", "9100"),
            ("MCP_STATELESS_HTTP", "true"),
            ("WORKER_THREADS", "3"),
            ("MCP_BASE_URL", "https://mcp.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.name, "Demo");
        assert_eq!(config.path, "/tools/");
        assert_eq!(config.environment, "staging");
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.port, 9100);
        assert!(config.stateless_http);
        assert_eq!(config.workers, 3);
        assert_eq!(config.resource_url(), "https://mcp.example.com/tools/");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("MCP_TRANSPORT", "carrier-pigeon")]).is_err());
        assert!(load(&[("MCP_STATELESS_HTTP", "maybe")]).is_err());
        assert!(load(&[("WORKER_THREADS", "0")]).is_err());
        assert!(load(&[("MCP_AUTH_PROVIDER", "kerberos")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = load(&[("MCP_AUTH_TOKEN", "  "), ("PORT", "")]).unwrap();
        assert_eq!(config.auth, AuthConfig::None);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("/mcp"), "/mcp/");
        assert_eq!(normalize_path("mcp/"), "/mcp/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/a/b"), "/a/b/");
    }
}
