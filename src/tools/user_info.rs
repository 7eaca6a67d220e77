//! User Info Tool
//!
//! Reports who the authenticated caller is, from the claims the auth
//! provider validated.

use serde_json::{Map, Value, json};

use super::parse_args;
use crate::core::error::ToolError;
use crate::core::registry::{ToolContext, ToolDescriptor, object_schema};

/// Identity claims worth showing back to the caller.
const IDENTITY_CLAIMS: &[&str] = &["sub", "oid", "tid", "name", "preferred_username", "email", "upn"];

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

fn user_info(ctx: &ToolContext) -> Result<Value, ToolError> {
    let claims = ctx
        .claims()
        .ok_or_else(|| ToolError::Unauthenticated("no authenticated caller".to_string()))?;

    let mut info = Map::new();
    for key in IDENTITY_CLAIMS {
        if let Some(value) = claims.get(key) {
            info.insert((*key).to_string(), value.clone());
        }
    }
    // Entra ID puts the address in preferred_username when there is no email claim.
    if !info.contains_key("email") {
        if let Some(username) = claims.get_str("preferred_username").filter(|u| u.contains('@')) {
            info.insert("email".to_string(), Value::String(username.to_string()));
        }
    }
    info.insert("scopes".to_string(), json!(claims.scopes()));
    Ok(Value::Object(info))
}

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "get_user_info",
        "Get identity information about the authenticated caller",
        object_schema(json!({}), &[]),
        |ctx, args| {
            let NoArgs {} = parse_args(args)?;
            user_info(ctx)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;

    #[test]
    fn returns_identity_claims_only() {
        let claims = Claims::from_value(json!({
            "sub": "abc",
            "name": "Ada Lovelace",
            "preferred_username": "ada@example.com",
            "scp": "mcp.read",
            "aud": "client",
            "exp": 1
        }))
        .unwrap();
        let result = descriptor()
            .call(&ToolContext::authenticated(claims), json!({}))
            .unwrap();
        assert_eq!(
            result,
            json!({
                "sub": "abc",
                "name": "Ada Lovelace",
                "preferred_username": "ada@example.com",
                "email": "ada@example.com",
                "scopes": ["mcp.read"]
            })
        );
    }

    #[test]
    fn anonymous_callers_get_an_error() {
        let err = descriptor().call(&ToolContext::anonymous(), json!({})).unwrap_err();
        assert!(matches!(err, ToolError::Unauthenticated(_)));
    }
}
