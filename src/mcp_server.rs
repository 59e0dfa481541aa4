use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use tracing::{error, info};

use crate::openai::ImageBackend;
use crate::output::OutputDirs;
use crate::tools::{CreateImageRequest, EditImageRequest};

#[derive(Clone)]
pub struct ImageToolServer {
    tool_router: ToolRouter<Self>,
    backend: Arc<dyn ImageBackend>,
    output_dirs: OutputDirs,
}

impl ImageToolServer {
    pub fn new(backend: Arc<dyn ImageBackend>, output_dirs: OutputDirs) -> Self {
        Self {
            tool_router: Self::tool_router(),
            backend,
            output_dirs,
        }
    }

    /// Serves tool calls over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let service = self.serve(rmcp::transport::stdio()).await?;
        info!("image MCP server listening on stdio");
        service.waiting().await?;
        Ok(())
    }
}

#[tool_router]
impl ImageToolServer {
    #[tool(
        name = "create-image",
        description = "Generate images from a text prompt with the OpenAI image model. Images are returned inline as base64, or saved to disk when output is file_output or the result exceeds 1MB."
    )]
    async fn create_image(
        &self,
        Parameters(request): Parameters<CreateImageRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::create_image(&*self.backend, &self.output_dirs, request)
            .await
            .map(|delivery| delivery.into_call_result())
            .map_err(|err| {
                error!(error = %err, "create-image failed");
                McpError::from(err)
            })
    }

    #[tool(
        name = "edit-image",
        description = "Edit an image, given as an absolute file path or base64 data, from a text prompt with an optional mask. Images are returned inline as base64, or saved to disk when output is file_output or the result exceeds 1MB."
    )]
    async fn edit_image(
        &self,
        Parameters(request): Parameters<EditImageRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::edit_image(&*self.backend, &self.output_dirs, request)
            .await
            .map(|delivery| delivery.into_call_result())
            .map_err(|err| {
                error!(error = %err, "edit-image failed");
                McpError::from(err)
            })
    }
}

#[tool_handler]
impl ServerHandler for ImageToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use create-image to generate images and edit-image to modify an existing one. \
                 Sizes accept 1024x1024, 1536x1024, 1024x1536, auto or aspect ratios like 16:9."
                    .into(),
            ),
            ..Default::default()
        }
    }
}
