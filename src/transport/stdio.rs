//! STDIO transport.
//!
//! Reads JSON-RPC messages line-by-line from stdin and writes one response
//! line per request to stdout. Logging must go to stderr so it never mixes
//! with the protocol stream. The loop ends at EOF.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::core::protocol::{JsonRpcResponse, parse_request};
use crate::core::registry::ToolContext;
use crate::core::server::McpServer;

pub async fn run_server_stdio(server: Arc<McpServer>) -> std::io::Result<()> {
    tracing::info!(
        name = %server.name(),
        version = %server.info().version,
        tools = server.tools().len(),
        "MCP server starting (stdio)"
    );

    // 8KB buffers balance memory usage with I/O efficiency
    let stdin = BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = BufWriter::with_capacity(8192, tokio::io::stdout());
    serve_lines(&server, stdin, stdout).await?;

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

/// Serve newline-delimited JSON-RPC from `reader` to `writer` until EOF.
///
/// There is no caller identity on stdio; tools see an anonymous context.
pub async fn serve_lines<R, W>(server: &McpServer, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let ctx = ToolContext::anonymous();
    // Raw bytes: a line that is not UTF-8 is a parse error, not the end of input.
    let mut line = Vec::with_capacity(1024);

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.trim_ascii().is_empty() {
            continue;
        }

        let response = match parse_request(&line) {
            Ok(req) => server.handle(req, &ctx),
            Err(error_response) => {
                tracing::warn!("rejected malformed message on stdin");
                Some(error_response)
            }
        };

        if let Some(response) = response {
            write_message(&mut writer, &response).await?;
        }
    }

    writer.flush().await
}

async fn write_message<W>(writer: &mut W, response: &JsonRpcResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    // Flush after each response so clients are not left waiting on a full buffer
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::server::ServerInfo;
    use crate::tools;
    use serde_json::{Value, json};

    async fn run(input: &str) -> Vec<Value> {
        let mut server = McpServer::new(ServerInfo::new("Local test"), None);
        tools::register_all(&mut server).unwrap();

        let mut out = Vec::new();
        serve_lines(&server, input.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn session_over_stdio() {
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"process_data","arguments":{"input":"abc"}}}"#,
        ]
        .join("\n");

        let responses = run(&input).await;
        assert_eq!(responses.len(), 3, "notifications and blank lines get no reply");

        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "Local test");
        assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");

        let names: Vec<&str> = responses[1]["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"process_data"));
        assert!(names.contains(&"analyze_text"));

        assert_eq!(responses[2]["result"]["content"][0]["text"], "Processed: abc");
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_a_parse_error() {
        let mut input = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"ping\"}\n");

        let server = McpServer::new(ServerInfo::new("Local test"), None);
        let mut out = Vec::new();
        serve_lines(&server, input.as_slice(), &mut out).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1], json!({"jsonrpc": "2.0", "id": 5, "result": {}}));
    }

    #[tokio::test]
    async fn malformed_lines_get_error_responses_and_the_loop_continues() {
        let input = "this is not json\n{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"ping\"}\n";
        let responses = run(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[1], json!({"jsonrpc": "2.0", "id": 5, "result": {}}));
    }
}
