//! Bounded-parallel batch of generation jobs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use quiz_genclient::{JobReport, JobRunner};
use quiz_models::{BatchResult, GenerationRequest};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::SchedulerError;

/// Metric name for batch wall-clock time.
pub const BATCH_DURATION_SECONDS: &str = "quiz_batch_duration_seconds";

/// Runs a batch of requests with at most `max_workers` in flight.
#[derive(Clone)]
pub struct BatchScheduler {
    runner: JobRunner,
    max_workers: usize,
    deadline: Option<Duration>,
}

impl BatchScheduler {
    pub fn new(runner: JobRunner, max_workers: usize) -> Self {
        Self {
            runner,
            max_workers: max_workers.max(1),
            deadline: None,
        }
    }

    /// Abort jobs still running once the whole batch has taken this long.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every request and collect one outcome per slot.
    ///
    /// Only invalid input is an error. Slots whose job failed, panicked or
    /// was cut off by the deadline stay in the result without a clip.
    pub async fn run_batch(
        &self,
        requests: Vec<GenerationRequest>,
        out_dir: &Path,
    ) -> Result<BatchResult, SchedulerError> {
        validate(&requests)?;

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| SchedulerError::OutputDir(format!("{}: {}", out_dir.display(), e)))?;

        let started = Instant::now();
        let total = requests.len();
        let mut batch = BatchResult::seeded(requests.iter().map(|r| r.slot_index));

        info!(total, max_workers = self.max_workers, "Starting generation batch");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks: JoinSet<(u32, JobReport)> = JoinSet::new();

        for request in requests {
            let runner = self.runner.clone();
            let semaphore = semaphore.clone();
            let slot = request.slot_index;
            let dest = clip_path(out_dir, slot);

            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let report = runner.run_to_completion(request, &dest).await;
                (slot, report)
            });
        }

        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((slot, report)) => {
                        if report.is_success() {
                            info!(slot, attempts = report.attempts, "Slot generated");
                        } else {
                            warn!(
                                slot,
                                attempts = report.attempts,
                                state = %report.final_state,
                                "Slot failed"
                            );
                        }
                        batch.record(slot, report.into_outcome());
                    }
                    Err(e) if e.is_panic() => {
                        error!(error = %e, "Generation worker panicked");
                    }
                    Err(e) => {
                        warn!(error = %e, "Generation worker cancelled");
                    }
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                if tokio::time::timeout(deadline, collect).await.is_err() {
                    warn!(
                        deadline_secs = deadline.as_secs_f64(),
                        "Batch deadline reached, aborting remaining jobs"
                    );
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                }
            }
            None => collect.await,
        }

        let elapsed = started.elapsed();
        histogram!(BATCH_DURATION_SECONDS).record(elapsed.as_secs_f64());
        info!(
            generated = batch.success_count(),
            total,
            elapsed_secs = elapsed.as_secs_f64(),
            "{}/{} clips generated",
            batch.success_count(),
            total
        );

        Ok(batch)
    }
}

/// Download target for a slot inside the staging directory.
pub fn clip_path(out_dir: &Path, slot: u32) -> PathBuf {
    out_dir.join(format!("choice_{}.mp4", slot))
}

fn validate(requests: &[GenerationRequest]) -> Result<(), SchedulerError> {
    if requests.is_empty() {
        return Err(SchedulerError::EmptyBatch);
    }

    let mut seen = BTreeSet::new();
    for request in requests {
        if request.slot_index == 0 {
            return Err(SchedulerError::InvalidSlot(0));
        }
        if !seen.insert(request.slot_index) {
            return Err(SchedulerError::DuplicateSlot(request.slot_index));
        }
    }
    Ok(())
}
