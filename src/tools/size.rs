use std::fmt;
use std::str::FromStr;

use crate::error::ImageToolError;

/// Dimensions accepted by the images API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Auto,
    Square,
    Landscape,
    Portrait,
}

impl ImageSize {
    pub const ALL: [ImageSize; 4] = [
        ImageSize::Square,
        ImageSize::Landscape,
        ImageSize::Portrait,
        ImageSize::Auto,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::Auto => "auto",
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1536x1024",
            ImageSize::Portrait => "1024x1536",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = ImageToolError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ImageSize::ALL
            .into_iter()
            .find(|size| size.as_str() == raw)
            .ok_or_else(|| {
                ImageToolError::invalid_parameter(format!(
                    "invalid size '{raw}': expected one of 1024x1024, 1536x1024, 1024x1536, auto \
                     or an aspect ratio such as 1:1, 16:9, 9:16, square, landscape, portrait"
                ))
            })
    }
}

/// Maps shorthand aspect ratios to a canonical size string.
///
/// Canonical values and unknown tokens come back untouched, so that
/// [`parse_size`] can report the caller's own spelling when rejecting it.
pub fn normalize_size(raw: &str) -> String {
    if ImageSize::ALL.iter().any(|size| size.as_str() == raw) {
        return raw.to_string();
    }
    let key: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    let mapped = match key.as_str() {
        "1:1" | "square" | "4:3" | "3:4" => ImageSize::Square,
        "16:9" | "landscape" | "3:2" => ImageSize::Landscape,
        "9:16" | "portrait" | "2:3" => ImageSize::Portrait,
        _ => return raw.to_string(),
    };
    mapped.as_str().to_string()
}

/// Normalizes then validates an optional size argument.
pub fn parse_size(raw: Option<&str>) -> Result<Option<ImageSize>, ImageToolError> {
    match raw {
        None => Ok(None),
        Some(raw) => normalize_size(raw).parse().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_tokens_map_to_canonical_sizes() {
        let cases = [
            ("1:1", "1024x1024"),
            ("square", "1024x1024"),
            ("4:3", "1024x1024"),
            ("3:4", "1024x1024"),
            ("16:9", "1536x1024"),
            ("landscape", "1536x1024"),
            ("3:2", "1536x1024"),
            ("9:16", "1024x1536"),
            ("portrait", "1024x1536"),
            ("2:3", "1024x1536"),
        ];
        for (token, expected) in cases {
            assert_eq!(normalize_size(token), expected, "token {token}");
        }
    }

    #[test]
    fn shorthand_is_case_and_space_insensitive() {
        assert_eq!(normalize_size(" Landscape "), "1536x1024");
        assert_eq!(normalize_size("16 : 9"), "1536x1024");
        assert_eq!(normalize_size("SQUARE"), "1024x1024");
    }

    #[test]
    fn canonical_values_are_identity() {
        for size in ImageSize::ALL {
            assert_eq!(normalize_size(size.as_str()), size.as_str());
        }
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(normalize_size("21:9"), "21:9");
        assert_eq!(normalize_size("Huge Image"), "Huge Image");
    }

    #[test]
    fn parse_rejects_with_original_token() {
        let err = parse_size(Some("Huge Image")).unwrap_err();
        assert!(matches!(err, ImageToolError::InvalidParameter(_)));
        assert!(err.to_string().contains("'Huge Image'"));
    }

    #[test]
    fn parse_accepts_shorthand() {
        assert_eq!(parse_size(Some("16:9")).unwrap(), Some(ImageSize::Landscape));
        assert_eq!(parse_size(Some("auto")).unwrap(), Some(ImageSize::Auto));
        assert_eq!(parse_size(None).unwrap(), None);
    }
}
