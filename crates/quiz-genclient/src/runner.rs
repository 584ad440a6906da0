//! Per-job retry, poll and timeout loop.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use quiz_models::{ClipReference, GenerationJob, GenerationRequest, JobState, SlotOutcome};
use tracing::{debug, info, warn};

use crate::api::GenerationApi;
use crate::error::{GenResult, GenerationError};
use crate::types::JobStatus;

/// Metric names emitted by the runner.
pub mod names {
    pub const GENERATION_ATTEMPTS_TOTAL: &str = "quiz_generation_attempts_total";
    pub const GENERATION_RESULTS_TOTAL: &str = "quiz_generation_results_total";
}

/// Retry and polling limits for one generation job.
#[derive(Debug, Clone)]
pub struct GenerationPolicy {
    /// Attempts per job, including the first
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one
    pub retry_delay: Duration,
    /// Pause between status checks
    pub poll_interval: Duration,
    /// Wall-clock limit per attempt, measured from its submit
    pub generation_timeout: Duration,
    /// Aspect ratio sent with every request
    pub aspect_ratio: String,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
            generation_timeout: Duration::from_secs(300),
            aspect_ratio: "9:16".to_string(),
        }
    }
}

impl GenerationPolicy {
    /// Load overrides from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            max_attempts: std::env::var("GENERATION_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_attempts),
            retry_delay: secs("GENERATION_RETRY_DELAY_SECS", defaults.retry_delay),
            poll_interval: secs("GENERATION_POLL_INTERVAL_SECS", defaults.poll_interval),
            generation_timeout: secs("GENERATION_TIMEOUT_SECS", defaults.generation_timeout),
            aspect_ratio: std::env::var("GENERATION_ASPECT_RATIO")
                .unwrap_or(defaults.aspect_ratio),
        }
    }
}

/// Terminal result of running one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub slot: u32,
    /// Downloaded clip, `None` once every attempt failed
    pub clip: Option<ClipReference>,
    pub attempts: u32,
    pub final_state: JobState,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.clip.is_some()
    }

    pub fn into_outcome(self) -> SlotOutcome {
        SlotOutcome {
            clip: self.clip,
            attempts: self.attempts,
            final_state: self.final_state,
        }
    }
}

/// Drives a single request through submit, poll and download.
#[derive(Clone)]
pub struct JobRunner {
    api: Arc<dyn GenerationApi>,
    policy: GenerationPolicy,
}

impl JobRunner {
    pub fn new(api: Arc<dyn GenerationApi>, policy: GenerationPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    /// Run a request until it produces a clip at `dest` or exhausts its attempts.
    ///
    /// Never fails: exhaustion is reported as a report without a clip.
    pub async fn run_to_completion(&self, request: GenerationRequest, dest: &Path) -> JobReport {
        let mut job = GenerationJob::new(request);
        let max_attempts = self.policy.max_attempts.max(1);

        while job.attempt < max_attempts {
            job.begin_attempt();
            counter!(names::GENERATION_ATTEMPTS_TOTAL).increment(1);
            debug!(slot = job.slot(), attempt = job.attempt, "Starting generation attempt");

            match self.run_attempt(&mut job, dest).await {
                Ok(()) => {
                    job.state = JobState::Completed;
                    info!(
                        slot = job.slot(),
                        attempt = job.attempt,
                        remote_job_id = job.remote_job_id.as_deref().unwrap_or_default(),
                        "Clip generated"
                    );
                    counter!(names::GENERATION_RESULTS_TOTAL, "outcome" => "success").increment(1);
                    return JobReport {
                        slot: job.slot(),
                        clip: Some(ClipReference::new(dest, job.slot())),
                        attempts: job.attempt,
                        final_state: job.state,
                    };
                }
                Err(e) => {
                    if job.state != JobState::TimedOut {
                        job.state = JobState::Failed;
                    }
                    warn!(
                        slot = job.slot(),
                        attempt = job.attempt,
                        max_attempts,
                        kind = e.kind(),
                        error = %e,
                        "Generation attempt failed"
                    );

                    if !e.is_retryable() {
                        break;
                    }
                    if job.attempt < max_attempts {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        warn!(slot = job.slot(), attempts = job.attempt, "Giving up on slot");
        counter!(names::GENERATION_RESULTS_TOTAL, "outcome" => "failed").increment(1);
        JobReport {
            slot: job.slot(),
            clip: None,
            attempts: job.attempt,
            final_state: job.state,
        }
    }

    async fn run_attempt(&self, job: &mut GenerationJob, dest: &Path) -> GenResult<()> {
        let started = Instant::now();
        let timeout = self.policy.generation_timeout;

        let remote_id = self
            .api
            .submit(&job.request, &self.policy.aspect_ratio)
            .await?;
        job.remote_job_id = Some(remote_id.clone());
        job.state = JobState::Polling;

        let clip_url = loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                job.state = JobState::TimedOut;
                return Err(GenerationError::Timeout(timeout.as_secs()));
            }

            match tokio::time::timeout(remaining, self.api.poll(&remote_id)).await {
                Err(_) => {
                    job.state = JobState::TimedOut;
                    return Err(GenerationError::Timeout(timeout.as_secs()));
                }
                Ok(Ok(JobStatus::Completed { clip_url })) => break clip_url,
                Ok(Ok(JobStatus::Failed { reason })) => {
                    return Err(GenerationError::JobFailed(reason));
                }
                Ok(Ok(JobStatus::Pending { state })) => {
                    debug!(slot = job.slot(), remote_job_id = %remote_id, state = %state, "Still generating");
                }
                Ok(Err(e)) => {
                    debug!(slot = job.slot(), remote_job_id = %remote_id, error = %e, "Status check failed, will retry");
                }
            }

            let remaining = timeout.saturating_sub(started.elapsed());
            tokio::time::sleep(self.policy.poll_interval.min(remaining)).await;
        };

        job.result_clip_url = Some(clip_url.clone());
        self.api.download(&clip_url, dest).await
    }
}
