//! Health status document served on `GET /health`.
//!
//! Liveness only: no dependency is probed, so building one never fails.

use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "mcp-server";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Unhealthy,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: Status,
    pub service: String,
    pub version: String,
    pub environment: String,
}

impl HealthStatus {
    pub fn healthy(environment: &str) -> Self {
        Self {
            status: Status::Healthy,
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: environment.to_string(),
        }
    }
}
