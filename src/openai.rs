//! Client for the OpenAI (or Azure OpenAI) images API.

use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder,
    multipart::{Form, Part},
};
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::UpstreamConfig,
    error::{ImageToolError, ToolResult},
    tools::{image_input::ImageInput, size::ImageSize},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    Transparent,
    Opaque,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Moderation {
    Auto,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Auto,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }
}

impl Serialize for ImageSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Body of `POST /images/generations`; unset fields are left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation: Option<Moderation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_compression: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Fields of the multipart `POST /images/edits` request.
#[derive(Debug, Clone)]
pub struct EditParams {
    pub image: ImageInput,
    pub mask: Option<ImageInput>,
    pub prompt: String,
    pub n: Option<u8>,
    pub quality: Option<Quality>,
    pub size: Option<ImageSize>,
    pub user: Option<String>,
}

impl EditParams {
    fn into_form(self, model: Option<&str>) -> ToolResult<Form> {
        let mut form = Form::new().text("prompt", self.prompt);
        if let Some(model) = model {
            form = form.text("model", model.to_string());
        }
        form = form.part("image", file_part("image", self.image)?);
        if let Some(mask) = self.mask {
            form = form.part("mask", file_part("mask", mask)?);
        }
        if let Some(n) = self.n {
            form = form.text("n", n.to_string());
        }
        if let Some(quality) = self.quality {
            form = form.text("quality", enum_text(&quality));
        }
        if let Some(size) = self.size {
            form = form.text("size", size.as_str());
        }
        if let Some(user) = self.user {
            form = form.text("user", user);
        }
        Ok(form)
    }
}

fn file_part(field: &'static str, input: ImageInput) -> ToolResult<Part> {
    Part::bytes(input.bytes)
        .file_name(input.file_name)
        .mime_str(&input.mime_type)
        .map_err(|err| ImageToolError::invalid_input(field, err.to_string()))
}

fn enum_text<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(text)) => text,
        _ => String::new(),
    }
}

/// The remote image capability. Both calls return base64 image data in order.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, params: GenerateParams) -> ToolResult<Vec<String>>;

    async fn edit(&self, params: EditParams) -> ToolResult<Vec<String>>;
}

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(flatten)]
    params: &'a GenerateParams,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct OpenAiImageClient {
    client: Client,
    config: UpstreamConfig,
}

impl OpenAiImageClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self, operation: &str) -> String {
        match &self.config {
            UpstreamConfig::OpenAi { base_url, .. } => format!("{base_url}/images/{operation}"),
            UpstreamConfig::Azure {
                endpoint,
                deployment,
                api_version,
                ..
            } => format!(
                "{endpoint}/openai/deployments/{deployment}/images/{operation}?api-version={api_version}"
            ),
        }
    }

    fn model(&self) -> Option<&str> {
        match &self.config {
            UpstreamConfig::OpenAi { model, .. } => Some(model.as_str()),
            UpstreamConfig::Azure { .. } => None,
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config {
            UpstreamConfig::OpenAi { api_key, .. } => builder.bearer_auth(api_key),
            UpstreamConfig::Azure { api_key, .. } => builder.header("api-key", api_key),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ToolResult<Vec<String>> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|err| ImageToolError::upstream(err.to_string(), None))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ImageToolError::upstream(err.to_string(), None))?;
        debug!(%status, len = body.len(), "images API responded");
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        extract_images(&body)
    }
}

#[async_trait]
impl ImageBackend for OpenAiImageClient {
    async fn generate(&self, params: GenerateParams) -> ToolResult<Vec<String>> {
        let body = GenerationBody {
            model: self.model(),
            params: &params,
        };
        debug!(n = ?params.n, size = ?params.size, format = ?params.output_format, "requesting image generation");
        let builder = self.client.post(self.endpoint("generations")).json(&body);
        self.send(builder).await
    }

    async fn edit(&self, params: EditParams) -> ToolResult<Vec<String>> {
        debug!(
            n = ?params.n,
            size = ?params.size,
            mask = params.mask.is_some(),
            "requesting image edit"
        );
        let form = params.into_form(self.model())?;
        let builder = self.client.post(self.endpoint("edits")).multipart(form);
        self.send(builder).await
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> ImageToolError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);
    match parsed {
        Some(error) => {
            let code = error.code.and_then(|code| match code {
                Value::String(code) => Some(code),
                Value::Null => None,
                other => Some(other.to_string()),
            });
            let message = error.message.unwrap_or_else(|| status.to_string());
            ImageToolError::upstream(format!("{status}: {message}"), code)
        }
        None => ImageToolError::upstream(format!("{status}: {body}"), None),
    }
}

fn extract_images(body: &str) -> ToolResult<Vec<String>> {
    let payload: ImagesResponse = serde_json::from_str(body).map_err(|err| {
        ImageToolError::upstream(format!("unreadable images response: {err}"), None)
    })?;
    let images = payload
        .data
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            item.b64_json.ok_or_else(|| {
                ImageToolError::upstream(format!("image {} has no b64_json data", index + 1), None)
            })
        })
        .collect::<ToolResult<Vec<String>>>()?;
    if images.is_empty() {
        return Err(ImageToolError::upstream("no images returned", None));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_fields_are_omitted() {
        let params = GenerateParams {
            prompt: "a red cat".into(),
            size: Some(ImageSize::Landscape),
            ..Default::default()
        };
        let body = GenerationBody {
            model: Some("gpt-image-1"),
            params: &params,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "model": "gpt-image-1", "prompt": "a red cat", "size": "1536x1024" })
        );
    }

    #[test]
    fn enums_serialize_lowercase() {
        let params = GenerateParams {
            prompt: "p".into(),
            background: Some(Background::Transparent),
            output_format: Some(OutputFormat::Webp),
            quality: Some(Quality::High),
            moderation: Some(Moderation::Low),
            ..Default::default()
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["background"], "transparent");
        assert_eq!(value["output_format"], "webp");
        assert_eq!(value["quality"], "high");
        assert_eq!(value["moderation"], "low");
        assert_eq!(enum_text(&Quality::Medium), "medium");
    }

    #[test]
    fn azure_endpoint_uses_deployment() {
        let client = OpenAiImageClient::new(UpstreamConfig::Azure {
            api_key: "k".into(),
            endpoint: "https://res.openai.azure.com".into(),
            deployment: "gpt-image-1".into(),
            api_version: "2025-04-01-preview".into(),
        });
        assert_eq!(
            client.endpoint("edits"),
            "https://res.openai.azure.com/openai/deployments/gpt-image-1/images/edits?api-version=2025-04-01-preview"
        );
        assert_eq!(client.model(), None);
    }

    #[test]
    fn api_errors_keep_code() {
        let body = r#"{"error":{"message":"Billing hard limit reached","code":"billing_hard_limit_reached"}}"#;
        match api_error(reqwest::StatusCode::BAD_REQUEST, body) {
            ImageToolError::Upstream { message, code } => {
                assert!(message.contains("Billing hard limit reached"));
                assert_eq!(code.as_deref(), Some("billing_hard_limit_reached"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn images_are_extracted_in_order() {
        let body = r#"{"created":1,"data":[{"b64_json":"AAA="},{"b64_json":"BBB="}]}"#;
        assert_eq!(extract_images(body).unwrap(), vec!["AAA=", "BBB="]);
        assert!(extract_images(r#"{"data":[]}"#).is_err());
        assert!(extract_images(r#"{"data":[{"url":"https://x"}]}"#).is_err());
    }

    #[test]
    fn bad_mask_mime_is_reported_against_mask() {
        let params = EditParams {
            image: ImageInput {
                bytes: b"png".to_vec(),
                mime_type: "image/png".into(),
                file_name: "image_0.png".into(),
            },
            mask: Some(ImageInput {
                bytes: b"mask".to_vec(),
                mime_type: "not a mime".into(),
                file_name: "image_1.png".into(),
            }),
            prompt: "add a hat".into(),
            n: None,
            quality: None,
            size: None,
            user: None,
        };
        match params.into_form(None) {
            Err(ImageToolError::InvalidInput { field, .. }) => assert_eq!(field, "mask"),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("invalid mask MIME type was accepted"),
        }
    }
}
