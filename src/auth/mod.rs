//! Caller authentication for the HTTP transport.
//!
//! An `AuthProvider` turns a bearer token into the caller's `Claims` or
//! rejects it. Providers are injected into the server at startup, so an
//! alternate identity provider (or a test fake) only needs this trait.

pub mod azure;
pub mod bearer;
pub mod middleware;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::ServerResult;

pub use azure::AzureProvider;
pub use bearer::BearerTokenAuth;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Validate a bearer token and return the claims it carries.
    ///
    /// Fails with `ServerError::Authentication` when the token is rejected.
    async fn validate_token(&self, token: &str) -> ServerResult<Claims>;

    /// RFC 9728 protected resource metadata for `resource`, if the provider
    /// delegates to an external authorization server.
    fn protected_resource_metadata(&self, _resource: &str) -> Option<Value> {
        None
    }
}

/// Key/value assertions about an authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns `None` unless `value` is a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Delegated scopes from the space-separated `scp` claim.
    pub fn scopes(&self) -> Vec<&str> {
        self.get_str("scp")
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}
