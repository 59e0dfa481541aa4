use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::output::OutputDirs;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";
pub const DEFAULT_AZURE_API_VERSION: &str = "2025-04-01-preview";
pub const DEFAULT_WORK_DIR: &str = "/tmp";
const DEFAULT_PORT: u16 = 3000;

/// Credentials and addressing for the images API.
#[derive(Clone, Debug)]
pub enum UpstreamConfig {
    OpenAi {
        api_key: String,
        base_url: String,
        model: String,
    },
    Azure {
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportConfig {
    Stdio,
    Http { port: u16, secret_key: Option<String> },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub upstream: UpstreamConfig,
    pub transport: TransportConfig,
    pub output_dirs: OutputDirs,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            upstream: UpstreamConfig::from_env()?,
            transport: TransportConfig::from_env()?,
            output_dirs: output_dirs_from_env()?,
        })
    }
}

impl UpstreamConfig {
    pub fn from_env() -> Result<Self> {
        if let (Some(api_key), Some(endpoint)) =
            (env_value("AZURE_OPENAI_API_KEY"), env_value("AZURE_OPENAI_ENDPOINT"))
        {
            return Ok(UpstreamConfig::Azure {
                api_key,
                endpoint: endpoint.trim_end_matches('/').to_string(),
                deployment: env_value("AZURE_OPENAI_DEPLOYMENT")
                    .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
                api_version: env_value("OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            });
        }
        let Some(api_key) = env_value("OPENAI_API_KEY") else {
            bail!("missing OPENAI_API_KEY (or AZURE_OPENAI_API_KEY with AZURE_OPENAI_ENDPOINT)");
        };
        Ok(UpstreamConfig::OpenAi {
            api_key,
            base_url: env_value("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: env_value("OPENAI_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
        })
    }
}

impl TransportConfig {
    pub fn from_env() -> Result<Self> {
        let transport = env_value("IMAGE_MCP_TRANSPORT").unwrap_or_else(|| "stdio".to_string());
        match transport.to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportConfig::Stdio),
            "http" => {
                let port = match env_value("MCP_PORT") {
                    Some(raw) => raw
                        .parse::<u16>()
                        .with_context(|| format!("invalid MCP_PORT '{raw}'"))?,
                    None => DEFAULT_PORT,
                };
                Ok(TransportConfig::Http {
                    port,
                    secret_key: env_value("SECRET_KEY"),
                })
            }
            other => bail!("unknown IMAGE_MCP_TRANSPORT '{other}', expected stdio or http"),
        }
    }
}

fn output_dirs_from_env() -> Result<OutputDirs> {
    let work_dir = env_value("IMAGE_MCP_WORK_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR));
    let work_dir = std::path::absolute(&work_dir)
        .with_context(|| format!("cannot resolve work directory {}", work_dir.display()))?;
    Ok(OutputDirs::new(dirs::home_dir(), work_dir))
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
