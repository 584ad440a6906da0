//! Luma generation service HTTP client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use quiz_models::GenerationRequest;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::api::GenerationApi;
use crate::error::{GenResult, GenerationError};
use crate::types::{CreateGenerationBody, GenerationResponse, JobStatus};

/// Configuration for the generation client.
#[derive(Debug, Clone)]
pub struct LumaClientConfig {
    /// Base URL of the API (without `/generations`)
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Optional model name sent with each request
    pub model: Option<String>,
    /// Timeout for create and status calls
    pub request_timeout: Duration,
    /// Timeout for a whole clip download
    pub download_timeout: Duration,
}

impl Default for LumaClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.lumalabs.ai/v1".to_string(),
            api_key: String::new(),
            model: None,
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(120),
        }
    }
}

impl LumaClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> GenResult<Self> {
        let api_key = std::env::var("LUMAAI_API_KEY")
            .map_err(|_| GenerationError::Config("LUMAAI_API_KEY not set".to_string()))?;

        Ok(Self {
            base_url: std::env::var("LUMAAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.lumalabs.ai/v1".to_string()),
            api_key,
            model: std::env::var("LUMAAI_MODEL").ok().filter(|m| !m.is_empty()),
            request_timeout: Duration::from_secs(
                std::env::var("LUMAAI_REQUEST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            download_timeout: Duration::from_secs(
                std::env::var("LUMAAI_DOWNLOAD_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }
}

/// Client for the Luma generations API.
pub struct LumaClient {
    http: Client,
    config: LumaClientConfig,
}

impl LumaClient {
    pub fn new(config: LumaClientConfig) -> GenResult<Self> {
        if config.api_key.is_empty() {
            return Err(GenerationError::Config("API key is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(GenerationError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> GenResult<Self> {
        Self::new(LumaClientConfig::from_env()?)
    }

    fn generations_url(&self) -> String {
        format!("{}/generations", self.config.base_url.trim_end_matches('/'))
    }

    /// Stream the response body of `url` into `path`.
    async fn stream_to_file(&self, url: &str, path: &Path) -> GenResult<u64> {
        let mut response = self
            .http
            .get(url)
            .timeout(self.config.download_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::download_failed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(GenerationError::download_failed("empty response body"));
        }
        Ok(written)
    }
}

/// Sibling path used while a download is in flight.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

#[async_trait]
impl GenerationApi for LumaClient {
    async fn submit(&self, request: &GenerationRequest, aspect_ratio: &str) -> GenResult<String> {
        let body = CreateGenerationBody {
            prompt: &request.prompt,
            aspect_ratio,
            duration: Some(format!("{}s", request.target_duration_secs)),
            model: self.config.model.as_deref(),
        };

        debug!(slot = request.slot_index, "Submitting generation request");

        let response = self
            .http
            .post(self.generations_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::SubmitFailed {
                status: status.as_u16(),
                body,
            });
        }

        let created: GenerationResponse = response.json().await?;
        let id = created.into_job_id()?;
        info!(slot = request.slot_index, remote_job_id = %id, "Generation accepted");
        Ok(id)
    }

    async fn poll(&self, remote_job_id: &str) -> GenResult<JobStatus> {
        let url = format!("{}/{}", self.generations_url(), remote_job_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(GenerationError::PollFailed {
                status: response.status().as_u16(),
            });
        }

        let generation: GenerationResponse = response.json().await?;
        generation.into_status()
    }

    async fn download(&self, clip_url: &str, dest: &Path) -> GenResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = partial_path(dest);
        let result = match self.stream_to_file(clip_url, &part).await {
            Ok(bytes) => tokio::fs::rename(&part, dest)
                .await
                .map(|_| bytes)
                .map_err(GenerationError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                debug!(dest = %dest.display(), bytes, "Clip downloaded");
                Ok(())
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %part.display(), error = %rm, "Failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }
}
