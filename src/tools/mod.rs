pub mod create_image;
pub mod edit_image;
pub mod image_input;
pub mod size;

use std::path::Path;

use crate::error::{ImageToolError, ToolResult};

pub use create_image::{CreateImageRequest, create_image};
pub use edit_image::{EditImageRequest, edit_image};
pub use image_input::{ImageInput, ImageSource, resolve_image_input};
pub use size::{ImageSize, normalize_size, parse_size};

pub const MAX_PROMPT_CHARS: usize = 32_000;
pub const MAX_IMAGES: u8 = 10;

pub(crate) fn validate_prompt(prompt: &str) -> ToolResult<()> {
    if prompt.trim().is_empty() {
        return Err(ImageToolError::invalid_parameter("prompt must not be empty"));
    }
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(ImageToolError::invalid_parameter(format!(
            "prompt is {chars} characters, the limit is {MAX_PROMPT_CHARS}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_count(n: Option<u8>) -> ToolResult<()> {
    match n {
        Some(n) if !(1..=MAX_IMAGES).contains(&n) => Err(ImageToolError::invalid_parameter(
            format!("n must be between 1 and {MAX_IMAGES}, got {n}"),
        )),
        _ => Ok(()),
    }
}

/// An explicit output file must be absolute.
pub(crate) fn validate_file_output(file_output: Option<&str>) -> ToolResult<Option<&Path>> {
    match file_output {
        None => Ok(None),
        Some(raw) if image_input::is_absolute_path(raw) => Ok(Some(Path::new(raw))),
        Some(raw) => Err(ImageToolError::invalid_parameter(format!(
            "file_output must be an absolute path, got '{raw}'"
        ))),
    }
}
