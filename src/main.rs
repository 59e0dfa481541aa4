use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gpt_image_rmcp::{
    ImageToolServer, OpenAiImageClient,
    config::{ServerConfig, TransportConfig},
    openai::ImageBackend,
    output::OutputDirs,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let backend: Arc<dyn ImageBackend> = Arc::new(OpenAiImageClient::new(config.upstream));
    info!(work_dir = %config.output_dirs.work_dir().display(), "configuration loaded");

    match config.transport {
        TransportConfig::Stdio => {
            ImageToolServer::new(backend, config.output_dirs)
                .serve_stdio()
                .await
        }
        TransportConfig::Http { port, secret_key } => {
            serve_http(backend, config.output_dirs, port, secret_key.as_deref()).await
        }
    }
}

// stdout belongs to the stdio transport
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

async fn serve_http(
    backend: Arc<dyn ImageBackend>,
    output_dirs: OutputDirs,
    port: u16,
    secret_key: Option<&str>,
) -> Result<()> {
    let bind_address = format!("0.0.0.0:{port}");
    let mcp_path = match secret_key {
        Some(value) => format!("/{value}/mcp"),
        None => "/mcp".to_string(),
    };
    let service = StreamableHttpService::new(
        move || Ok(ImageToolServer::new(backend.clone(), output_dirs.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service(&mcp_path, service);
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("cannot bind {bind_address}"))?;

    info!("image MCP HTTP server started at http://{bind_address}{mcp_path}");

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
