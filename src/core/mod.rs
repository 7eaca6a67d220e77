//! Core Server Framework Module
//!
//! - config.rs: environment-driven server configuration
//! - error.rs: startup and tool error types
//! - health.rs: liveness document
//! - protocol.rs: JSON-RPC 2.0 message types
//! - registry.rs: tool registry
//! - server.rs: the server instance and MCP method dispatch

pub mod config;
pub mod error;
pub mod health;
pub mod protocol;
pub mod registry;
pub mod server;
