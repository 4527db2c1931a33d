//! stdio transport: one JSON-RPC message per line.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

use super::server::ToolServer;

/// Serve on the process's stdin/stdout until stdin closes
pub async fn serve(server: &ToolServer) -> Result<()> {
    info!("stdio transport ready");
    serve_lines(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve newline-delimited messages from `reader`, replying on `writer`
pub async fn serve_lines<R, W>(server: &ToolServer, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read message")? {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = server.handle_message(&line).await {
            let mut json = serde_json::to_string(&response).context("Failed to encode response")?;
            json.push('\n');
            writer
                .write_all(json.as_bytes())
                .await
                .context("Failed to write response")?;
            writer.flush().await.context("Failed to flush response")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SafetyLimits;
    use crate::mcp::protocol::JsonRpcResponse;
    use crate::tools::ToolRegistry;

    #[tokio::test]
    async fn test_replies_per_line_and_skips_notifications() {
        let server = ToolServer::new(ToolRegistry::new(), SafetyLimits::default());
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );

        let mut output = Vec::new();
        serve_lines(&server, input.as_bytes(), &mut output).await.unwrap();

        let replies: Vec<JsonRpcResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].id, serde_json::json!(1));
        assert_eq!(replies[1].result.as_ref().unwrap()["tools"], serde_json::json!([]));
    }
}
