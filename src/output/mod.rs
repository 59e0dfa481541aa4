//! Delivery of generated images: inline content or files on disk.

pub mod filename;
pub mod storage;

use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::Utc;
use rmcp::{
    model::{CallToolResult, Content},
    schemars::JsonSchema,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ImageToolError, ToolResult};

pub use filename::sanitize_filename;
pub use storage::{OutputDirs, write_images};

/// Largest aggregate decoded size that may be returned inline.
pub const INLINE_LIMIT_BYTES: usize = 1_048_576;

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Return image data in the tool response.
    #[default]
    Base64,
    /// Save images to disk and return their paths.
    FileOutput,
}

/// One image returned by the upstream API.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub encoded: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: &'static str,
}

impl ImagePayload {
    pub fn from_base64(encoded: String, mime_type: &str) -> ToolResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|err| {
                ImageToolError::upstream(format!("image data is not valid base64: {err}"), None)
            })?;
        Ok(Self {
            encoded,
            bytes,
            mime_type: mime_type.to_string(),
            extension: extension_for_mime(mime_type),
        })
    }
}

/// Delivery preferences of one invocation.
#[derive(Debug, Clone, Copy)]
pub struct OutputRequest<'a> {
    pub mode: OutputMode,
    pub file_output: Option<&'a Path>,
    pub filename: Option<&'a str>,
    /// Prefix of the timestamped default basename, e.g. `create_image`.
    pub operation: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Inline(Vec<InlineImage>),
    Files(Vec<PathBuf>),
}

impl Delivery {
    pub fn into_call_result(self) -> CallToolResult {
        let content = match self {
            Delivery::Inline(images) => images
                .into_iter()
                .map(|image| Content::image(image.data, image.mime_type))
                .collect(),
            Delivery::Files(paths) => paths
                .iter()
                .map(|path| Content::text(format!("Image saved to: file://{}", path.display())))
                .collect(),
        };
        CallToolResult::success(content)
    }
}

pub fn aggregate_size(payloads: &[ImagePayload]) -> usize {
    payloads.iter().map(|payload| payload.bytes.len()).sum()
}

/// Inline requests over the transport ceiling are written to disk instead.
pub fn effective_mode(requested: OutputMode, aggregate: usize) -> OutputMode {
    if requested == OutputMode::Base64 && aggregate > INLINE_LIMIT_BYTES {
        OutputMode::FileOutput
    } else {
        requested
    }
}

/// Expands a base path into one destination per image.
///
/// A single image keeps the base name; several get `_<n>` suffixes counted
/// from 1. A missing extension is taken from the image's type.
pub fn destination_paths(base: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let base_ext = base
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());
    if let [extension] = extensions {
        let path = match base_ext {
            Some(_) => base.to_path_buf(),
            None => base.with_extension(extension),
        };
        return vec![path];
    }
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let parent = base.parent().unwrap_or_else(|| Path::new(""));
    extensions
        .iter()
        .copied()
        .enumerate()
        .map(|(index, extension)| {
            let ext = base_ext.as_deref().unwrap_or(extension);
            parent.join(format!("{stem}_{}.{ext}", index + 1))
        })
        .collect()
}

pub fn default_basename(filename: Option<&str>, operation: &str) -> String {
    match filename {
        Some(name) => sanitize_filename(name),
        None => format!("{operation}_{}", Utc::now().timestamp_millis()),
    }
}

/// Routes upstream images to the caller, inline or on disk.
pub async fn deliver(
    payloads: Vec<ImagePayload>,
    request: OutputRequest<'_>,
    dirs: &OutputDirs,
) -> ToolResult<Delivery> {
    let aggregate = aggregate_size(&payloads);
    let mode = effective_mode(request.mode, aggregate);
    if mode != request.mode {
        warn!(
            aggregate,
            limit = INLINE_LIMIT_BYTES,
            "images too large for inline response, saving to disk"
        );
    }

    if mode == OutputMode::Base64 {
        let images = payloads
            .into_iter()
            .map(|payload| InlineImage {
                data: payload.encoded,
                mime_type: payload.mime_type,
            })
            .collect();
        return Ok(Delivery::Inline(images));
    }

    let Some(first) = payloads.first() else {
        return Ok(Delivery::Files(Vec::new()));
    };
    let base = match request.file_output {
        Some(path) => path.to_path_buf(),
        None => {
            let dir = dirs.resolve_default_dir().await;
            let name = default_basename(request.filename, request.operation);
            dir.join(format!("{name}.{}", first.extension))
        }
    };
    let extensions: Vec<&str> = payloads.iter().map(|payload| payload.extension).collect();
    let paths = destination_paths(&base, &extensions);
    debug!(base = %base.display(), count = paths.len(), "writing images");

    let files: Vec<(PathBuf, &[u8])> = paths
        .iter()
        .cloned()
        .zip(payloads.iter().map(|payload| payload.bytes.as_slice()))
        .collect();
    write_images(&files).await?;
    Ok(Delivery::Files(paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::RawContent;

    fn payload(len: usize) -> ImagePayload {
        let bytes = vec![0xAB; len];
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        ImagePayload::from_base64(encoded, "image/png").unwrap()
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(
            effective_mode(OutputMode::Base64, INLINE_LIMIT_BYTES),
            OutputMode::Base64
        );
        assert_eq!(
            effective_mode(OutputMode::Base64, INLINE_LIMIT_BYTES + 1),
            OutputMode::FileOutput
        );
        assert_eq!(
            effective_mode(OutputMode::FileOutput, 10),
            OutputMode::FileOutput
        );
    }

    #[test]
    fn aggregate_sums_decoded_lengths() {
        assert_eq!(aggregate_size(&[payload(10), payload(32)]), 42);
    }

    #[test]
    fn multiple_images_get_indexed_names() {
        let paths = destination_paths(Path::new("/tmp/x.png"), &["png", "png", "png"]);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/tmp/x_1.png"),
                PathBuf::from("/tmp/x_2.png"),
                PathBuf::from("/tmp/x_3.png"),
            ]
        );
    }

    #[test]
    fn single_image_keeps_or_gains_extension() {
        assert_eq!(
            destination_paths(Path::new("/out/cat.jpeg"), &["png"]),
            vec![PathBuf::from("/out/cat.jpeg")]
        );
        assert_eq!(
            destination_paths(Path::new("/out/cat"), &["webp"]),
            vec![PathBuf::from("/out/cat.webp")]
        );
        assert_eq!(
            destination_paths(Path::new("/out/cat"), &["jpg", "jpg"]),
            vec![PathBuf::from("/out/cat_1.jpg"), PathBuf::from("/out/cat_2.jpg")]
        );
    }

    #[test]
    fn default_basename_prefers_sanitized_label() {
        assert_eq!(default_basename(Some("my/cat"), "create_image"), "my-cat");
        assert!(default_basename(None, "edit_image").starts_with("edit_image_"));
    }

    #[tokio::test]
    async fn small_inline_request_stays_inline() {
        let dirs = OutputDirs::new(None, std::env::temp_dir());
        let request = OutputRequest {
            mode: OutputMode::Base64,
            file_output: None,
            filename: None,
            operation: "create_image",
        };
        let delivery = deliver(vec![payload(10)], request, &dirs).await.unwrap();
        match delivery {
            Delivery::Inline(images) => {
                assert_eq!(images.len(), 1);
                assert_eq!(images[0].mime_type, "image/png");
            }
            other => panic!("expected inline delivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_inline_request_is_saved() {
        let home = tempfile::tempdir().unwrap();
        let dirs = OutputDirs::new(Some(home.path().to_path_buf()), std::env::temp_dir());
        let request = OutputRequest {
            mode: OutputMode::Base64,
            file_output: None,
            filename: Some("big one"),
            operation: "create_image",
        };
        let delivery = deliver(vec![payload(INLINE_LIMIT_BYTES / 2 + 1); 2], request, &dirs)
            .await
            .unwrap();
        let expected_dir = home.path().join(storage::DEFAULT_IMAGE_SUBDIR);
        assert_eq!(
            delivery,
            Delivery::Files(vec![
                expected_dir.join("big one_1.png"),
                expected_dir.join("big one_2.png"),
            ])
        );
        assert_eq!(
            std::fs::read(expected_dir.join("big one_2.png")).unwrap().len(),
            INLINE_LIMIT_BYTES / 2 + 1
        );
    }

    #[tokio::test]
    async fn explicit_destination_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shot.png");
        let dirs = OutputDirs::new(None, std::env::temp_dir());
        let request = OutputRequest {
            mode: OutputMode::FileOutput,
            file_output: Some(&target),
            filename: None,
            operation: "edit_image",
        };
        let delivery = deliver(vec![payload(4)], request, &dirs).await.unwrap();
        assert_eq!(delivery, Delivery::Files(vec![target.clone()]));
        assert_eq!(std::fs::read(&target).unwrap(), vec![0xAB; 4]);
    }

    #[test]
    fn file_delivery_renders_uri_text() {
        let result = Delivery::Files(vec![PathBuf::from("/tmp/x.png")]).into_call_result();
        match &result.content[0].raw {
            RawContent::Text(text) => assert_eq!(text.text, "Image saved to: file:///tmp/x.png"),
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[test]
    fn inline_delivery_renders_image_content() {
        let result = Delivery::Inline(vec![InlineImage {
            data: "AAAA".into(),
            mime_type: "image/webp".into(),
        }])
        .into_call_result();
        match &result.content[0].raw {
            RawContent::Image(image) => {
                assert_eq!(image.data, "AAAA");
                assert_eq!(image.mime_type, "image/webp");
            }
            other => panic!("expected image content, got {other:?}"),
        }
    }
}
