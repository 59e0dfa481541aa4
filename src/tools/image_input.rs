use std::path::Path;
use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use tokio::fs;
use tracing::debug;

use crate::{
    error::{ImageToolError, ToolResult},
    output::extension_for_mime,
};

static DRIVE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:[\\/]").expect("static regex"));
static BASE64_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/=\s]+$").expect("static regex"));
static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:image/([A-Za-z0-9.+-]+);base64,(.+)$").expect("static regex")
});

/// How an `image`/`mask` argument is to be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource<'a> {
    File(&'a Path),
    Encoded(&'a str),
}

/// Bytes ready to upload as one multipart file.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

pub fn is_absolute_path(raw: &str) -> bool {
    raw.starts_with('/') || DRIVE_PATH.is_match(raw)
}

fn is_encoded_image(raw: &str) -> bool {
    raw.starts_with("data:image/") || BASE64_TEXT.is_match(raw)
}

/// Decides whether `raw` names a file or carries the image itself.
pub fn classify<'a>(field: &'static str, raw: &'a str) -> ToolResult<ImageSource<'a>> {
    if is_absolute_path(raw) {
        Ok(ImageSource::File(Path::new(raw)))
    } else if is_encoded_image(raw) {
        Ok(ImageSource::Encoded(raw))
    } else {
        Err(ImageToolError::invalid_input(
            field,
            "must be an absolute file path or base64-encoded image data",
        ))
    }
}

/// Reads or decodes an edit input. `index` is 0 for the primary image and 1 for the mask.
pub async fn resolve_image_input(
    field: &'static str,
    raw: &str,
    index: usize,
) -> ToolResult<ImageInput> {
    match classify(field, raw)? {
        ImageSource::File(path) => {
            let bytes = fs::read(path)
                .await
                .map_err(|err| ImageToolError::filesystem(path, err))?;
            let mime_type = mime_for_path(path).to_string();
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| synthetic_name(index, &mime_type));
            debug!(field, path = %path.display(), mime_type = %mime_type, "read edit input from file");
            Ok(ImageInput {
                bytes,
                mime_type,
                file_name,
            })
        }
        ImageSource::Encoded(text) => {
            let (mime_type, payload) = split_data_url(text);
            let bytes = decode_base64(payload)
                .map_err(|reason| ImageToolError::invalid_input(field, reason))?;
            let file_name = synthetic_name(index, &mime_type);
            debug!(field, mime_type = %mime_type, len = bytes.len(), "decoded inline edit input");
            Ok(ImageInput {
                bytes,
                mime_type,
                file_name,
            })
        }
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Returns the declared MIME type and base64 body, or treats the whole string as PNG base64.
fn split_data_url(text: &str) -> (String, &str) {
    match DATA_URL.captures(text) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(subtype), Some(payload)) => {
                (format!("image/{}", subtype.as_str()), payload.as_str())
            }
            _ => ("image/png".to_string(), text),
        },
        None => ("image/png".to_string(), text),
    }
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, String> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|err| format!("base64 decode failed: {err}"))?;
    if bytes.is_empty() {
        return Err("image data is empty".to_string());
    }
    Ok(bytes)
}

fn synthetic_name(index: usize, mime_type: &str) -> String {
    format!("image_{index}.{}", extension_for_mime(mime_type))
}
