use std::path::PathBuf;

use rmcp::ErrorData as McpError;
use serde_json::{Value, json};
use thiserror::Error;

/// Failure of a single tool invocation.
#[derive(Debug, Error)]
pub enum ImageToolError {
    /// A parameter was well-formed but not acceptable (size token, format mismatch, path rules).
    #[error("{0}")]
    InvalidParameter(String),

    /// An `image`/`mask` string was neither an absolute path nor encoded image data.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// The upstream image API rejected or failed the call.
    #[error("upstream image request failed: {message}")]
    Upstream { message: String, code: Option<String> },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some images reached their final path before a later one failed.
    #[error("saved images {written:?} before image {failed_index} failed at {}: {source}", path.display())]
    PartialWrite {
        written: Vec<usize>,
        failed_index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ImageToolError {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn upstream(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            code,
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<ImageToolError> for McpError {
    fn from(err: ImageToolError) -> Self {
        let message = err.to_string();
        match err {
            ImageToolError::InvalidParameter(_) => McpError::invalid_params(message, None),
            ImageToolError::InvalidInput { field, .. } => {
                McpError::invalid_params(message, Some(json!({ "field": field })))
            }
            ImageToolError::Upstream { code, .. } => McpError::internal_error(
                message,
                code.map(|code| json!({ "code": code })),
            ),
            ImageToolError::Filesystem { path, .. } => McpError::internal_error(
                message,
                Some(Value::String(path.display().to_string())),
            ),
            ImageToolError::PartialWrite { written, .. } => {
                McpError::internal_error(message, Some(json!({ "written": written })))
            }
        }
    }
}

pub type ToolResult<T> = std::result::Result<T, ImageToolError>;
