//! Static bearer token authentication.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

use super::{AuthProvider, Claims};
use crate::core::error::{ServerError, ServerResult};

/// Accepts exactly one shared token.
pub struct BearerTokenAuth {
    token: SecretString,
}

impl BearerTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

impl std::fmt::Debug for BearerTokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenAuth").field("token", &"<redacted>").finish()
    }
}

#[async_trait]
impl AuthProvider for BearerTokenAuth {
    fn name(&self) -> &str {
        "bearer"
    }

    async fn validate_token(&self, token: &str) -> ServerResult<Claims> {
        let expected = self.token.expose_secret().as_bytes();
        if bool::from(expected.ct_eq(token.as_bytes())) {
            let mut claims = Map::new();
            claims.insert("sub".to_string(), Value::String("bearer-client".to_string()));
            claims.insert("auth_method".to_string(), Value::String("static_bearer".to_string()));
            Ok(Claims::new(claims))
        } else {
            Err(ServerError::auth("invalid bearer token"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_only_the_configured_token() {
        let auth = BearerTokenAuth::new("open-sesame");

        let claims = auth.validate_token("open-sesame").await.unwrap();
        assert_eq!(claims.subject(), Some("bearer-client"));

        for wrong in ["", "open-sesam", "open-sesame!", "OPEN-SESAME"] {
            let err = auth.validate_token(wrong).await.unwrap_err();
            assert!(matches!(err, ServerError::Authentication(_)));
        }
    }

    #[test]
    fn debug_output_hides_the_token() {
        let auth = BearerTokenAuth::new("open-sesame");
        assert!(!format!("{auth:?}").contains("open-sesame"));
    }
}
