//! Credential resolution.
//!
//! OAuth app credentials live in a remote secret store as a JSON document.
//! They are fetched once at startup, strictly deserialized, and then held
//! read-only for the life of the process.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;

use crate::core::error::{ServerError, ServerResult};

/// Source of serialized secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the string payload of `secret_id`.
    ///
    /// Fails with `ServerError::CredentialFetch` on network or permission errors.
    async fn get_secret_string(&self, secret_id: &str) -> ServerResult<String>;
}

/// AWS Secrets Manager backed secret store.
pub struct AwsSecretsManager {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretsManager {
    /// Build a client for `region` using the default AWS credential chain.
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: aws_sdk_secretsmanager::Client::new(&config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn get_secret_string(&self, secret_id: &str) -> ServerResult<String> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|err| ServerError::CredentialFetch {
                secret_id: secret_id.to_string(),
                reason: aws_sdk_secretsmanager::error::DisplayErrorContext(&err).to_string(),
            })?;

        output
            .secret_string()
            .map(str::to_owned)
            .ok_or_else(|| ServerError::CredentialFetch {
                secret_id: secret_id.to_string(),
                reason: "secret has no string value".to_string(),
            })
    }
}

/// OAuth application credentials.
///
/// Resolved once at startup and then shared read-only by the auth provider.
/// `Debug` output never includes the client secret.
#[derive(Clone)]
pub struct Credentials {
    /// Application (client) id of the app registration
    pub client_id: String,
    /// Client secret of the app registration
    pub client_secret: SecretString,
    /// Directory (tenant) id; ASCII letters, digits, `-` and `.` only
    pub tenant_id: String,
    /// Scopes every access token must carry
    pub required_scopes: Vec<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("required_scopes", &self.required_scopes)
            .finish()
    }
}

impl Credentials {
    /// Parse a JSON credentials document.
    ///
    /// Both the snake_case keys and the `FASTMCP_SERVER_AUTH_AZURE_*` keys are
    /// accepted. Supplying one field under both names is an error.
    pub fn from_json(payload: &str) -> ServerResult<Self> {
        let raw: CredentialsPayload =
            serde_json::from_str(payload).map_err(|e| ServerError::CredentialParse(e.to_string()))?;

        let client_id = required("client_id", raw.client_id)?;
        let client_secret = required("client_secret", raw.client_secret)?;
        let tenant_id = required("tenant_id", raw.tenant_id)?;

        // The tenant id ends up in identity provider URLs.
        if !tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(ServerError::CredentialParse(
                "tenant_id contains invalid characters".to_string(),
            ));
        }

        let required_scopes = match raw.required_scopes {
            Some(Scopes::List(list)) => list,
            Some(Scopes::Joined(joined)) => joined
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(str::to_owned)
                .collect(),
            None => Vec::new(),
        }
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

        Ok(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
            tenant_id,
            required_scopes,
        })
    }
}

#[derive(Deserialize)]
struct CredentialsPayload {
    #[serde(alias = "FASTMCP_SERVER_AUTH_AZURE_CLIENT_ID")]
    client_id: String,
    #[serde(alias = "FASTMCP_SERVER_AUTH_AZURE_CLIENT_SECRET")]
    client_secret: String,
    #[serde(alias = "FASTMCP_SERVER_AUTH_AZURE_TENANT_ID")]
    tenant_id: String,
    #[serde(default, alias = "FASTMCP_SERVER_AUTH_AZURE_REQUIRED_SCOPES")]
    required_scopes: Option<Scopes>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scopes {
    List(Vec<String>),
    Joined(String),
}

fn required(field: &str, value: String) -> ServerResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        Err(ServerError::CredentialParse(format!("{field} must not be empty")))
    } else {
        Ok(value)
    }
}

/// Fetches and parses credentials from a `SecretStore`.
///
/// The store is injected so tests can supply a fake instead of AWS.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn SecretStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Fetch `secret_id` and parse it as `Credentials`.
    ///
    /// # Returns
    /// `CredentialFetch` when the store fails, `CredentialParse` when the
    /// payload is malformed.
    pub async fn resolve(&self, secret_id: &str) -> ServerResult<Credentials> {
        tracing::info!(secret_id, "fetching credentials");
        let payload = self.store.get_secret_string(secret_id).await?;
        let credentials = Credentials::from_json(&payload)?;
        tracing::info!(
            client_id = %credentials.client_id,
            scopes = credentials.required_scopes.len(),
            "credentials resolved"
        );
        Ok(credentials)
    }
}
