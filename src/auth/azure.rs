//! Azure Entra ID (OAuth 2.0 / OIDC) token validation.
//!
//! Access tokens are RS256 JWTs signed with the tenant's published keys. The
//! provider checks signature, issuer, audience, expiry and delegated scopes;
//! token issuance and the authorization-code flow stay with Entra ID.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use super::{AuthProvider, Claims};
use crate::core::error::{ServerError, ServerResult};
use crate::credentials::Credentials;

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Allowed clock skew when checking `exp`/`nbf`, in seconds.
const LEEWAY_SECS: u64 = 60;

/// How long a fetched key set is trusted before it is refetched.
const KEYS_TTL: Duration = Duration::from_secs(600);

/// Minimum time between two key set fetches. Unknown `kid`s inside this
/// window are rejected from the cache instead of hitting the network.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Cached tenant key set.
#[derive(Default)]
struct KeyCache {
    keys: Option<JwkSet>,
    fetched_at: Option<Instant>,
    /// Last fetch attempt, successful or not.
    attempted_at: Option<Instant>,
}

impl KeyCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < KEYS_TTL)
    }

    fn may_refresh(&self) -> bool {
        self.attempted_at
            .is_none_or(|at| at.elapsed() >= MIN_REFRESH_INTERVAL)
    }

    fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.as_ref().and_then(|set| set.find(kid))
    }
}

/// Validates Azure Entra ID access tokens for one app registration.
///
/// Built once at startup from the resolved `Credentials`. The tenant's
/// signing keys are fetched lazily on the first token and cached.
pub struct AzureProvider {
    credentials: Credentials,
    authority: String,
    jwks_url: String,
    issuers: Vec<String>,
    audiences: Vec<String>,
    http: reqwest::Client,
    keys: RwLock<KeyCache>,
}

impl std::fmt::Debug for AzureProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureProvider")
            .field("credentials", &self.credentials)
            .field("jwks_url", &self.jwks_url)
            .field("issuers", &self.issuers)
            .field("audiences", &self.audiences)
            .finish_non_exhaustive()
    }
}

impl AzureProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_authority(credentials, DEFAULT_AUTHORITY)
    }

    /// Use a different login authority (sovereign clouds, tests).
    pub fn with_authority(credentials: Credentials, authority: &str) -> Self {
        let authority = authority.trim_end_matches('/').to_string();
        let tenant = &credentials.tenant_id;
        let client_id = &credentials.client_id;

        let jwks_url = format!("{authority}/{tenant}/discovery/v2.0/keys");
        let issuers = vec![
            format!("{authority}/{tenant}/v2.0"),
            format!("https://sts.windows.net/{tenant}/"),
        ];
        let audiences = vec![client_id.clone(), format!("api://{client_id}")];

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            credentials,
            authority,
            jwks_url,
            issuers,
            audiences,
            http,
            keys: RwLock::new(KeyCache::default()),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn fetch_keys(&self) -> ServerResult<JwkSet> {
        tracing::debug!(url = %self.jwks_url, "fetching signing keys");
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ServerError::auth(format!("unable to fetch signing keys: {e}")))?;
        response
            .json::<JwkSet>()
            .await
            .map_err(|e| ServerError::auth(format!("invalid signing key set: {e}")))
    }

    /// Find the key for `kid`.
    ///
    /// The cached key set is refetched when it has expired or does not know
    /// `kid`, but never more often than `MIN_REFRESH_INTERVAL`.
    async fn decoding_key(&self, kid: &str) -> ServerResult<DecodingKey> {
        {
            let cache = self.keys.read().await;
            if cache.is_fresh() {
                if let Some(jwk) = cache.find(kid) {
                    return to_decoding_key(jwk);
                }
            }
        }

        let mut cache = self.keys.write().await;
        // Another request may have refreshed while we waited for the lock.
        if cache.may_refresh() {
            cache.attempted_at = Some(Instant::now());
            let fresh = self.fetch_keys().await?;
            cache.keys = Some(fresh);
            cache.fetched_at = Some(Instant::now());
        } else {
            tracing::debug!(kid, "signing key refresh rate limited");
        }

        match cache.find(kid) {
            Some(jwk) => to_decoding_key(jwk),
            None => Err(ServerError::auth(format!("unknown signing key '{kid}'"))),
        }
    }

    fn check_scopes(&self, claims: &Claims) -> ServerResult<()> {
        let granted = claims.scopes();
        for required in &self.credentials.required_scopes {
            // Required scopes may be given fully qualified (api://app/scope),
            // while `scp` carries the bare scope name.
            let short = required.rsplit('/').next().unwrap_or(required);
            if !granted.iter().any(|g| *g == required.as_str() || *g == short) {
                return Err(ServerError::auth(format!("token is missing required scope '{required}'")));
            }
        }
        Ok(())
    }
}

fn to_decoding_key(jwk: &Jwk) -> ServerResult<DecodingKey> {
    DecodingKey::from_jwk(jwk).map_err(|e| ServerError::auth(e.to_string()))
}

#[async_trait]
impl AuthProvider for AzureProvider {
    fn name(&self) -> &str {
        "azure"
    }

    async fn validate_token(&self, token: &str) -> ServerResult<Claims> {
        let header = decode_header(token).map_err(|e| ServerError::auth(format!("malformed token: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(ServerError::auth(format!("unsupported token algorithm {:?}", header.alg)));
        }
        let kid = header
            .kid
            .ok_or_else(|| ServerError::auth("token header has no key id"))?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(self.audiences.as_slice());
        validation.set_issuer(self.issuers.as_slice());
        validation.leeway = LEEWAY_SECS;

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| ServerError::auth(format!("token rejected: {e}")))?;
        self.check_scopes(&data.claims)?;
        Ok(data.claims)
    }

    fn protected_resource_metadata(&self, resource: &str) -> Option<Value> {
        Some(json!({
            "resource": resource,
            "authorization_servers": [format!("{}/{}/v2.0", self.authority, self.credentials.tenant_id)],
            "scopes_supported": self.credentials.required_scopes,
            "bearer_methods_supported": ["header"]
        }))
    }
}
