//! Model Context Protocol server.
//!
//! [`ToolServer`] turns JSON-RPC messages into tool calls; the transports
//! move messages in and out:
//! - `sse`: HTTP with server-sent events
//! - `stdio`: newline-delimited JSON on stdin/stdout

pub mod protocol;
pub mod server;
pub mod sse;
pub mod stdio;

pub use protocol::{CallToolResult, Content, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolDefinition};
pub use server::{ToolServer, SERVER_NAME};
pub use sse::SseState;
