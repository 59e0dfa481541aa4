use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{ImageToolError, ToolResult},
    openai::{Background, GenerateParams, ImageBackend, Moderation, OutputFormat, Quality},
    output::{self, Delivery, ImagePayload, OutputDirs, OutputMode, OutputRequest},
    tools::{parse_size, validate_count, validate_file_output, validate_prompt},
};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct CreateImageRequest {
    #[schemars(description = "Text description of the desired image (max 32000 characters)")]
    pub prompt: String,
    #[schemars(description = "Background: transparent (png/webp only), opaque or auto")]
    pub background: Option<Background>,
    #[schemars(description = "Content moderation level: auto or low")]
    pub moderation: Option<Moderation>,
    #[schemars(description = "Number of images to generate, 1-10")]
    pub n: Option<u8>,
    #[schemars(description = "Compression level 0-100, used for webp and jpeg output")]
    pub output_compression: Option<u8>,
    #[schemars(description = "Image format: png, jpeg or webp")]
    pub output_format: Option<OutputFormat>,
    #[schemars(description = "Quality: auto, high, medium or low")]
    pub quality: Option<Quality>,
    #[schemars(
        description = "Size: 1024x1024, 1536x1024, 1024x1536, auto, or an aspect ratio such as 1:1, 16:9, 9:16, 3:2, 2:3, square, landscape, portrait"
    )]
    pub size: Option<String>,
    #[schemars(description = "End-user identifier for abuse monitoring")]
    pub user: Option<String>,
    #[serde(default)]
    #[schemars(
        description = "base64 returns the image inline, file_output saves it to disk. Responses over 1MB are always saved to disk"
    )]
    pub output: OutputMode,
    #[schemars(description = "Absolute path for the saved image")]
    pub file_output: Option<String>,
    #[schemars(description = "Descriptive file name (without extension) for images saved to the default directory")]
    pub filename: Option<String>,
}

impl CreateImageRequest {
    /// Checks cross-field rules and builds the upstream request body.
    pub fn to_params(&self) -> ToolResult<GenerateParams> {
        validate_prompt(&self.prompt)?;
        validate_count(self.n)?;
        validate_file_output(self.file_output.as_deref())?;
        let size = parse_size(self.size.as_deref())?;
        if let Some(compression) = self.output_compression {
            if compression > 100 {
                return Err(ImageToolError::invalid_parameter(format!(
                    "output_compression must be between 0 and 100, got {compression}"
                )));
            }
        }
        if self.background == Some(Background::Transparent)
            && !matches!(
                self.output_format,
                Some(OutputFormat::Png) | Some(OutputFormat::Webp)
            )
        {
            return Err(ImageToolError::invalid_parameter(
                "a transparent background requires output_format png or webp",
            ));
        }
        let output_compression = match self.output_format {
            Some(OutputFormat::Webp) | Some(OutputFormat::Jpeg) => self.output_compression,
            _ => None,
        };
        Ok(GenerateParams {
            prompt: self.prompt.clone(),
            background: self.background,
            moderation: self.moderation,
            n: self.n,
            output_compression,
            output_format: self.output_format,
            quality: self.quality,
            size,
            user: self.user.clone(),
        })
    }
}

pub async fn create_image(
    backend: &dyn ImageBackend,
    dirs: &OutputDirs,
    request: CreateImageRequest,
) -> ToolResult<Delivery> {
    let params = request.to_params()?;
    info!(
        n = ?params.n,
        size = ?params.size,
        format = ?params.output_format,
        output = ?request.output,
        "create-image"
    );
    let mime_type = request.output_format.unwrap_or(OutputFormat::Png).mime_type();
    let encoded = backend.generate(params).await?;
    let payloads = encoded
        .into_iter()
        .map(|image| ImagePayload::from_base64(image, mime_type))
        .collect::<ToolResult<Vec<_>>>()?;
    let output_request = OutputRequest {
        mode: request.output,
        file_output: validate_file_output(request.file_output.as_deref())?,
        filename: request.filename.as_deref(),
        operation: "create_image",
    };
    output::deliver(payloads, output_request, dirs).await
}
