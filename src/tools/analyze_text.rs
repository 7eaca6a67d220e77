//! Analyze Text Tool
//!
//! Counts words and characters. `mode` is echoed back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::parse_args;
use crate::core::error::ToolError;
use crate::core::registry::{ToolDescriptor, object_schema};

pub const DEFAULT_MODE: &str = "summary";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    text: String,
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TextAnalysis {
    pub text: String,
    pub mode: String,
    pub word_count: usize,
    pub character_count: usize,
}

/// Words are runs of non-separator characters; characters are Unicode
/// scalar values.
///
/// # Arguments
/// * `text` - Input text
/// * `mode` - Analysis mode, reported back unchanged
pub fn analyze(text: &str, mode: &str) -> TextAnalysis {
    TextAnalysis {
        text: text.to_string(),
        mode: mode.to_string(),
        word_count: text.split(is_separator).filter(|w| !w.is_empty()).count(),
        character_count: text.chars().count(),
    }
}

/// Unicode whitespace plus the ASCII information separators (U+001C..U+001F),
/// which also delimit words.
fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

pub fn descriptor() -> ToolDescriptor {
    let input_schema = object_schema(
        json!({
            "text": { "type": "string", "description": "Text to analyze" },
            "mode": { "type": "string", "description": "Analysis mode", "default": DEFAULT_MODE }
        }),
        &["text"],
    );
    let output_schema = object_schema(
        json!({
            "text": { "type": "string" },
            "mode": { "type": "string" },
            "word_count": { "type": "integer" },
            "character_count": { "type": "integer" }
        }),
        &["text", "mode", "word_count", "character_count"],
    );

    ToolDescriptor::new("analyze_text", "Analyze text with different modes", input_schema, |_, args| {
        let args: Args = parse_args(args)?;
        serde_json::to_value(analyze(&args.text, &args.mode)).map_err(|e| ToolError::Failed(e.to_string()))
    })
    .with_output_schema(output_schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::ToolContext;

    #[test]
    fn hello_world_summary() {
        let tool = descriptor();
        let result = tool
            .call(&ToolContext::anonymous(), json!({"text": "hello world", "mode": "summary"}))
            .unwrap();
        assert_eq!(
            result,
            json!({"text": "hello world", "mode": "summary", "word_count": 2, "character_count": 11})
        );
    }

    #[test]
    fn mode_defaults_to_summary() {
        let result = descriptor()
            .call(&ToolContext::anonymous(), json!({"text": "one"}))
            .unwrap();
        assert_eq!(result["mode"], "summary");
    }

    #[test]
    fn whitespace_runs_and_edges_do_not_create_words() {
        let a = analyze("  many\t\tspaces \n and\r\nlines  ", "detail");
        assert_eq!(a.word_count, 4);
        assert_eq!(a.character_count, 29);
        assert_eq!(a.mode, "detail");

        let empty = analyze("", DEFAULT_MODE);
        assert_eq!((empty.word_count, empty.character_count), (0, 0));

        let blank = analyze(" \t\n", DEFAULT_MODE);
        assert_eq!((blank.word_count, blank.character_count), (0, 3));

        let separators = analyze("a\u{1c}b\u{1f}c\u{1d}\u{1e}", DEFAULT_MODE);
        assert_eq!((separators.word_count, separators.character_count), (3, 7));

        let unicode_spaces = analyze("one\u{a0}two\u{3000}three\u{2028}", DEFAULT_MODE);
        assert_eq!(unicode_spaces.word_count, 3);
    }

    #[test]
    fn characters_are_counted_not_bytes() {
        let a = analyze("héllo wörld ✓", DEFAULT_MODE);
        assert_eq!(a.word_count, 3);
        assert_eq!(a.character_count, 13);
    }

    #[test]
    fn text_is_required() {
        let err = descriptor()
            .call(&ToolContext::anonymous(), json!({"mode": "summary"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
