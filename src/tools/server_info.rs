//! Server Info Tool

use serde_json::{Value, json};

use super::parse_args;
use crate::core::registry::{ToolDescriptor, object_schema};
use crate::core::server::ServerInfo;

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

pub fn descriptor(info: ServerInfo) -> ToolDescriptor {
    let output_schema = object_schema(
        json!({
            "name": { "type": "string" },
            "version": { "type": "string" },
            "status": { "type": "string" }
        }),
        &["name", "version", "status"],
    );

    ToolDescriptor::new(
        "get_server_info",
        "Get information about the server",
        object_schema(json!({}), &[]),
        move |_, args: Value| {
            let NoArgs {} = parse_args(args)?;
            Ok(json!({
                "name": info.name,
                "version": info.version,
                "status": "running"
            }))
        },
    )
    .with_output_schema(output_schema)
}
