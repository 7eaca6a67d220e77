//! Process Data Tool
//!
//! Prefixes its input with `"Processed: "`.

use serde::Deserialize;
use serde_json::{Value, json};

use super::parse_args;
use crate::core::registry::{ToolDescriptor, object_schema};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    input: String,
}

pub fn process(input: &str) -> String {
    format!("Processed: {input}")
}

pub fn descriptor() -> ToolDescriptor {
    let input_schema = object_schema(
        json!({
            "input": {
                "type": "string",
                "description": "The data to process"
            }
        }),
        &["input"],
    );

    ToolDescriptor::new("process_data", "Process data on the server", input_schema, |_, args| {
        let args: Args = parse_args(args)?;
        Ok(Value::String(process(&args.input)))
    })
}
