//! Streamable HTTP transport.
//!
//! One JSON-RPC message per `POST` to the MCP path. Requests get a JSON
//! response, notifications get `202 Accepted`. In stateful mode `initialize`
//! opens a session whose id travels in the `Mcp-Session-Id` header; in
//! stateless mode every request stands alone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use actix_web::http::{StatusCode, header};
use actix_web::middleware::{Compress, DefaultHeaders, Logger, from_fn};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};

use crate::auth::Claims;
use crate::auth::middleware::require_bearer;
use crate::core::config::ServerConfig;
use crate::core::health::HealthStatus;
use crate::core::error::{ServerError, ServerResult};
use crate::core::protocol::{INTERNAL_ERROR, INVALID_REQUEST, JsonRpcResponse, parse_request};
use crate::core::registry::ToolContext;
use crate::core::server::McpServer;

pub const SESSION_HEADER: &str = "mcp-session-id";
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// Sessions idle for longer than this are dropped.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Upper bound on open sessions; the least recently used one is evicted.
pub const MAX_SESSIONS: usize = 10_000;

/// Open sessions and when each was last used.
///
/// Expired sessions are purged whenever a new one is opened, and the table
/// never holds more than `capacity` entries, so clients that never send
/// `DELETE` cannot grow it without bound.
#[derive(Debug)]
pub struct SessionStore {
    last_seen: Mutex<HashMap<String, Instant>>,
    idle_timeout: Duration,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_IDLE_TIMEOUT, MAX_SESSIONS)
    }
}

impl SessionStore {
    /// # Arguments
    /// * `idle_timeout` - How long an unused session stays valid
    /// * `capacity` - Maximum number of sessions kept at once (at least 1)
    pub fn new(idle_timeout: Duration, capacity: usize) -> Self {
        Self {
            last_seen: Mutex::new(HashMap::new()),
            idle_timeout,
            capacity: capacity.max(1),
        }
    }

    /// Open a new session and return its id.
    pub fn open(&self) -> ServerResult<String> {
        let mut sessions = self.lock()?;
        let now = Instant::now();
        sessions.retain(|_, seen| now.duration_since(*seen) < self.idle_timeout);

        while sessions.len() >= self.capacity {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, seen)| **seen)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            tracing::debug!(session = %oldest, "evicting least recently used session");
            sessions.remove(&oldest);
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        sessions.insert(id.clone(), now);
        Ok(id)
    }

    /// Check that `id` is open and mark it as used.
    ///
    /// # Returns
    /// `false` for unknown and expired ids; expired ones are removed.
    pub fn touch(&self, id: &str) -> ServerResult<bool> {
        let mut sessions = self.lock()?;
        let now = Instant::now();
        match sessions.get_mut(id) {
            Some(seen) if now.duration_since(*seen) < self.idle_timeout => {
                *seen = now;
                Ok(true)
            }
            Some(_) => {
                sessions.remove(id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    pub fn close(&self, id: &str) -> ServerResult<bool> {
        Ok(self.lock()?.remove(id).is_some())
    }

    /// Number of sessions held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> ServerResult<MutexGuard<'_, HashMap<String, Instant>>> {
        self.last_seen
            .lock()
            .map_err(|_| ServerError::Session("session lock poisoned".to_string()))
    }
}

/// Application state shared across all worker threads.
///
/// Created once per process and handed to every worker as `web::Data`.
pub struct HttpState {
    /// The server instance requests are dispatched to
    pub server: Arc<McpServer>,
    /// Deployment environment reported by `/health`
    pub environment: String,
    /// When true no sessions are issued or checked
    pub stateless: bool,
    /// Open sessions (unused in stateless mode)
    pub sessions: SessionStore,
    /// Public URL of the MCP endpoint.
    pub resource_url: String,
    /// Public URL of the protected resource metadata document.
    pub resource_metadata_url: String,
    path: String,
}

impl HttpState {
    /// # Arguments
    /// * `server` - Server instance with its tools registered
    /// * `config` - Source of the environment, mount path and public URLs
    pub fn new(server: Arc<McpServer>, config: &ServerConfig) -> Self {
        Self {
            server,
            environment: config.environment.clone(),
            stateless: config.stateless_http,
            sessions: SessionStore::default(),
            resource_url: config.resource_url(),
            resource_metadata_url: format!("{}{}", config.base_url, PROTECTED_RESOURCE_PATH),
            path: config.path.clone(),
        }
    }

    /// Mount path without the trailing slash, as used for the route scope.
    pub fn scope_path(&self) -> String {
        self.path.trim_end_matches('/').to_string()
    }
}

/// Register every route on an `App`.
///
/// The MCP scope is wrapped in the bearer middleware; `/health` and the
/// metadata document are always public.
pub fn routes(scope_path: String) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.route("/health", web::get().to(health))
            .route(PROTECTED_RESOURCE_PATH, web::get().to(protected_resource))
            .route(
                &format!("{PROTECTED_RESOURCE_PATH}{scope_path}"),
                web::get().to(protected_resource),
            )
            .service(
                web::scope(&scope_path)
                    .wrap(from_fn(require_bearer))
                    .route("", web::post().to(mcp_post))
                    .route("/", web::post().to(mcp_post))
                    .route("", web::get().to(mcp_get))
                    .route("/", web::get().to(mcp_get))
                    .route("", web::delete().to(mcp_delete))
                    .route("/", web::delete().to(mcp_delete)),
            );
    }
}

/// Health check endpoint handler.
///
/// Used by load balancers and orchestrators for liveness probing.
async fn health(state: web::Data<HttpState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthStatus::healthy(&state.environment))
}

async fn protected_resource(state: web::Data<HttpState>) -> HttpResponse {
    match state
        .server
        .auth()
        .and_then(|auth| auth.protected_resource_metadata(&state.resource_url))
    {
        Some(metadata) => HttpResponse::Ok().json(metadata),
        None => HttpResponse::NotFound().finish(),
    }
}

/// MCP JSON-RPC request handler.
///
/// # Returns
/// - 200 with the JSON-RPC response for requests
/// - 202 with no body for notifications
/// - 400 for unparseable bodies or a missing session id
/// - 404 for an unknown or expired session id
async fn mcp_post(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Bytes,
    claims: Option<web::ReqData<Claims>>,
) -> HttpResponse {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error_response) => {
            tracing::debug!("rejected malformed JSON-RPC body");
            return HttpResponse::BadRequest().json(error_response);
        }
    };

    let is_initialize = request.method == "initialize";
    if !state.stateless && !is_initialize {
        if let Err(response) = check_session(&state, &req, request.id.clone()) {
            return response;
        }
    }

    let ctx = match claims {
        Some(claims) => ToolContext::authenticated(claims.into_inner()),
        None => ToolContext::anonymous(),
    };

    let Some(response) = state.server.handle(request, &ctx) else {
        return HttpResponse::Accepted().finish();
    };

    let mut builder = HttpResponse::Ok();
    if is_initialize && !state.stateless && response.error.is_none() {
        match state.sessions.open() {
            Ok(session_id) => {
                tracing::info!(session = %session_id, "session opened");
                builder.insert_header((SESSION_HEADER, session_id));
            }
            Err(err) => return internal_error(response.id, &err),
        }
    }
    builder.json(response)
}

/// This server never pushes messages, so there is no stream to open.
async fn mcp_get() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, "POST, DELETE"))
        .finish()
}

async fn mcp_delete(state: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    if state.stateless {
        return HttpResponse::MethodNotAllowed()
            .insert_header((header::ALLOW, "POST"))
            .finish();
    }
    let Some(id) = session_id(&req) else {
        return HttpResponse::BadRequest().finish();
    };
    match state.sessions.close(id) {
        Ok(true) => {
            tracing::info!(session = %id, "session closed");
            HttpResponse::Ok().finish()
        }
        Ok(false) => HttpResponse::NotFound().finish(),
        Err(err) => internal_error(None, &err),
    }
}

fn session_id(req: &HttpRequest) -> Option<&str> {
    req.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

fn check_session(
    state: &HttpState,
    req: &HttpRequest,
    id: Option<serde_json::Value>,
) -> Result<(), HttpResponse> {
    match session_id(req).map(|session| state.sessions.touch(session)) {
        Some(Ok(true)) => Ok(()),
        Some(Ok(false)) => Err(HttpResponse::NotFound().json(JsonRpcResponse::failure(
            id,
            INVALID_REQUEST,
            "Session not found",
        ))),
        Some(Err(err)) => Err(internal_error(id, &err)),
        None => Err(HttpResponse::BadRequest().json(JsonRpcResponse::failure(
            id,
            INVALID_REQUEST,
            "Bad Request: missing Mcp-Session-Id header",
        ))),
    }
}

fn internal_error(id: Option<serde_json::Value>, err: &ServerError) -> HttpResponse {
    tracing::error!(error = %err, "request failed");
    HttpResponse::InternalServerError().json(JsonRpcResponse::failure(id, INTERNAL_ERROR, "Internal error"))
}

/// Build the JSON response for an authentication failure.
pub fn unauthorized(state: &HttpState, description: &str) -> HttpResponse {
    let mut challenge = format!(
        "Bearer error=\"invalid_token\", error_description=\"{}\"",
        description.replace('"', "'")
    );
    let advertises_metadata = state
        .server
        .auth()
        .is_some_and(|auth| auth.protected_resource_metadata(&state.resource_url).is_some());
    if advertises_metadata {
        challenge.push_str(&format!(", resource_metadata=\"{}\"", state.resource_metadata_url));
    }

    HttpResponse::build(StatusCode::UNAUTHORIZED)
        .insert_header((header::WWW_AUTHENTICATE, challenge))
        .json(serde_json::json!({
            "error": "invalid_token",
            "error_description": description
        }))
}

/// Run the MCP server in HTTP mode.
///
/// The server is configured with:
/// - Worker threads: from config (CPU count capped at 16 by default)
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive and request timeout: 30 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(server: Arc<McpServer>, config: &ServerConfig) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let state = web::Data::new(HttpState::new(server, config));

    tracing::info!(
        name = %state.server.name(),
        version = %state.server.info().version,
        bind = %bind_addr,
        path = %config.path,
        workers = config.workers,
        stateless = config.stateless_http,
        auth = state.server.auth().map(|a| a.name()).unwrap_or("none"),
        tools = state.server.tools().len(),
        "MCP server starting (streamable-http)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            // Enable compression for JSON responses (gzip/brotli)
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(routes(state.scope_path()))
    })
    .workers(config.workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_open_and_close() {
        let store = SessionStore::default();
        let id = store.open().unwrap();
        assert_eq!(id.len(), 32);
        assert!(store.touch(&id).unwrap());
        assert!(store.close(&id).unwrap());
        assert!(!store.touch(&id).unwrap());
        assert!(!store.close(&id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn idle_sessions_expire_and_are_purged() {
        let store = SessionStore::new(Duration::from_millis(20), MAX_SESSIONS);
        let stale = store.open().unwrap();
        let other = store.open().unwrap();
        std::thread::sleep(Duration::from_millis(40));

        assert!(!store.touch(&stale).unwrap());
        assert_eq!(store.len(), 1);

        // Opening a session purges whatever else has expired.
        let fresh = store.open().unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.touch(&other).unwrap());
        assert!(store.touch(&fresh).unwrap());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = SessionStore::new(SESSION_IDLE_TIMEOUT, 2);
        let first = store.open().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let second = store.open().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        // Using the first session makes the second the oldest.
        assert!(store.touch(&first).unwrap());
        std::thread::sleep(Duration::from_millis(2));

        let third = store.open().unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.touch(&first).unwrap());
        assert!(!store.touch(&second).unwrap());
        assert!(store.touch(&third).unwrap());
    }
}
