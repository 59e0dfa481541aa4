pub mod config;
pub mod error;
pub mod mcp_server;
pub mod openai;
pub mod output;
pub mod tools;

pub use error::{ImageToolError, ToolResult};
pub use mcp_server::ImageToolServer;
pub use openai::{ImageBackend, OpenAiImageClient};
