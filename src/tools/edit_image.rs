use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{ImageToolError, ToolResult},
    openai::{EditParams, ImageBackend, Quality},
    output::{self, Delivery, ImagePayload, OutputDirs, OutputMode, OutputRequest},
    tools::{
        ImageSize, image_input, parse_size, resolve_image_input, validate_count,
        validate_file_output, validate_prompt,
    },
};

/// Edited images always come back as PNG.
const EDIT_MIME_TYPE: &str = "image/png";

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct EditImageRequest {
    #[schemars(
        description = "Image to edit: an absolute file path, base64 data, or a data:image/...;base64, URL"
    )]
    pub image: String,
    #[schemars(description = "Description of the desired edit (max 32000 characters)")]
    pub prompt: String,
    #[schemars(
        description = "Optional mask whose transparent areas mark where to edit: absolute path or base64"
    )]
    pub mask: Option<String>,
    #[schemars(description = "Number of images to generate, 1-10")]
    pub n: Option<u8>,
    #[schemars(description = "Quality: auto, high, medium or low")]
    pub quality: Option<Quality>,
    #[schemars(
        description = "Size: 1024x1024, 1536x1024, 1024x1536, auto, or an aspect ratio such as 1:1, 16:9, 9:16, square, landscape, portrait"
    )]
    pub size: Option<String>,
    #[schemars(description = "End-user identifier for abuse monitoring")]
    pub user: Option<String>,
    #[serde(default)]
    #[schemars(
        description = "base64 returns the image inline, file_output saves it to file_output. Responses over 1MB are always saved to disk"
    )]
    pub output: OutputMode,
    #[schemars(description = "Absolute path for the saved image, required when output is file_output")]
    pub file_output: Option<String>,
    #[schemars(description = "Descriptive file name (without extension) for images saved to the default directory")]
    pub filename: Option<String>,
}

impl EditImageRequest {
    /// Re-checks every argument, including rules the schema cannot express.
    pub fn validate(&self) -> ToolResult<Option<ImageSize>> {
        validate_prompt(&self.prompt)?;
        validate_count(self.n)?;
        if self.output == OutputMode::FileOutput && self.file_output.is_none() {
            return Err(ImageToolError::invalid_parameter(
                "file_output is required when output is file_output",
            ));
        }
        validate_file_output(self.file_output.as_deref())?;
        image_input::classify("image", &self.image)?;
        if let Some(mask) = self.mask.as_deref() {
            image_input::classify("mask", mask)?;
        }
        parse_size(self.size.as_deref())
    }
}

pub async fn edit_image(
    backend: &dyn ImageBackend,
    dirs: &OutputDirs,
    request: EditImageRequest,
) -> ToolResult<Delivery> {
    let size = request.validate()?;
    let image = resolve_image_input("image", &request.image, 0).await?;
    let mask = match request.mask.as_deref() {
        Some(mask) => Some(resolve_image_input("mask", mask, 1).await?),
        None => None,
    };
    info!(
        n = ?request.n,
        size = ?size,
        mask = mask.is_some(),
        output = ?request.output,
        "edit-image"
    );
    let params = EditParams {
        image,
        mask,
        prompt: request.prompt.clone(),
        n: request.n,
        quality: request.quality,
        size,
        user: request.user.clone(),
    };
    let encoded = backend.edit(params).await?;
    let payloads = encoded
        .into_iter()
        .map(|image| ImagePayload::from_base64(image, EDIT_MIME_TYPE))
        .collect::<ToolResult<Vec<_>>>()?;
    let output_request = OutputRequest {
        mode: request.output,
        file_output: validate_file_output(request.file_output.as_deref())?,
        filename: request.filename.as_deref(),
        operation: "edit_image",
    };
    output::deliver(payloads, output_request, dirs).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(image: &str) -> EditImageRequest {
        EditImageRequest {
            image: image.into(),
            prompt: "add a hat".into(),
            ..Default::default()
        }
    }

    #[test]
    fn file_mode_requires_destination() {
        let err = EditImageRequest {
            output: OutputMode::FileOutput,
            ..request("/tmp/in.png")
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("file_output is required"));
    }

    #[test]
    fn file_mode_destination_must_be_absolute() {
        let err = EditImageRequest {
            output: OutputMode::FileOutput,
            file_output: Some("edits/out.png".into()),
            ..request("/tmp/in.png")
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ImageToolError::InvalidParameter(_)));
    }

    #[test]
    fn bad_mask_names_mask_field() {
        let err = EditImageRequest {
            mask: Some("mask.png?".into()),
            ..request("/tmp/in.png")
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ImageToolError::InvalidInput { field: "mask", .. }));
    }

    #[test]
    fn size_is_normalized() {
        let size = EditImageRequest {
            size: Some("portrait".into()),
            ..request("aGVsbG8=")
        }
        .validate()
        .unwrap();
        assert_eq!(size, Some(ImageSize::Portrait));
    }
}
