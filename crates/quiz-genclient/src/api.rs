//! Interface to a long-running clip generation service.

use std::path::Path;

use async_trait::async_trait;
use quiz_models::GenerationRequest;

use crate::error::GenResult;
use crate::types::JobStatus;

/// Create, check and fetch one generated clip.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Start a generation job and return its remote id.
    async fn submit(&self, request: &GenerationRequest, aspect_ratio: &str) -> GenResult<String>;

    /// Current status of a remote job.
    async fn poll(&self, remote_job_id: &str) -> GenResult<JobStatus>;

    /// Fetch a finished clip to `dest`. Leaves nothing at `dest` on failure.
    async fn download(&self, clip_url: &str, dest: &Path) -> GenResult<()>;
}
