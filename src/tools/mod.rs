//! Tools Module
//!
//! Each tool lives in its own module exporting a `descriptor` function. Add
//! new tools to `register_all`.

pub mod analyze_text;
pub mod process_data;
pub mod server_info;
pub mod user_info;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::error::{ServerResult, ToolError};
use crate::core::server::McpServer;

/// Register every built-in tool on `server`.
///
/// `get_user_info` is only registered when callers are authenticated, since
/// it has nothing to report otherwise.
pub fn register_all(server: &mut McpServer) -> ServerResult<()> {
    let info = server.info().clone();

    server.register_tool(process_data::descriptor())?;
    server.register_tool(analyze_text::descriptor())?;
    server.register_tool(server_info::descriptor(info))?;
    if server.auth().is_some() {
        server.register_tool(user_info::descriptor())?;
    }

    tracing::info!(count = server.tools().len(), "tools registered");
    Ok(())
}

/// Decode tool arguments into their typed form.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    // Tools without parameters may be called with no arguments at all.
    let args = if args.is_null() { Value::Object(Default::default()) } else { args };
    Ok(serde_json::from_value(args)?)
}
