//! Bearer token middleware for the MCP route scope.
//!
//! When the server has an auth provider, every request must carry
//! `Authorization: Bearer <token>`. Accepted tokens leave their `Claims` in
//! the request extensions for the handler; anything else gets a 401.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use actix_web::middleware::Next;
use actix_web::{Error, HttpMessage, web};

use crate::transport::http::{HttpState, unauthorized};

pub async fn require_bearer<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let Some(state) = req.app_data::<web::Data<HttpState>>().cloned() else {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    };
    let Some(auth) = state.server.auth().cloned() else {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    };

    let Some(token) = bearer_token(req.headers()).map(str::to_owned) else {
        tracing::debug!(path = %req.path(), "request without bearer token");
        let response = unauthorized(&state, "missing bearer token");
        return Ok(req.into_response(response).map_into_right_body());
    };

    match auth.validate_token(&token).await {
        Ok(claims) => {
            tracing::debug!(provider = auth.name(), subject = ?claims.subject(), "caller authenticated");
            req.extensions_mut().insert(claims);
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        Err(err) => {
            tracing::warn!(provider = auth.name(), error = %err, "bearer token rejected");
            let response = unauthorized(&state, "invalid or expired token");
            Ok(req.into_response(response).map_into_right_body())
        }
    }
}

/// Extract the token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn parses_bearer_scheme_case_insensitively() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
