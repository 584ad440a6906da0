//! One quiz run, end to end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use metrics::counter;
use serde::Serialize;
use tracing::{error, Instrument};
use uuid::Uuid;

use quiz_genclient::{GenerationApi, JobRunner};
use quiz_media::{
    probe_durations, AssetResolver, RenderRequest, ResolvedAssets, TimelineAssembler, VideoEncoder,
};
use quiz_models::{GenerationRequest, QuizScript};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, ENCODER_STDERR_LINES};
use crate::logging::RunLogger;
use crate::scheduler::BatchScheduler;
use crate::translate::{translate_or_fallback, Translator};

/// Metric name for finished runs, labelled by outcome.
pub const RUNS_TOTAL: &str = "quiz_runs_total";

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub clips_generated: usize,
    pub clips_total: usize,
    pub degraded_segments: usize,
    pub total_duration: f64,
    pub video_path: PathBuf,
}

/// Drives validation, generation, assembly and encoding for one quiz.
pub struct QuizPipeline {
    config: PipelineConfig,
    generator: Option<Arc<dyn GenerationApi>>,
    translator: Option<Arc<dyn Translator>>,
    encoder: Arc<dyn VideoEncoder>,
}

impl QuizPipeline {
    /// Without a generator every slot uses its placeholder.
    pub fn new(
        config: PipelineConfig,
        generator: Option<Arc<dyn GenerationApi>>,
        translator: Option<Arc<dyn Translator>>,
        encoder: Arc<dyn VideoEncoder>,
    ) -> Self {
        Self {
            config,
            generator,
            translator,
            encoder,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Produce one video for `script`.
    ///
    /// Generation failures never fail the run; they show up in
    /// `clips_generated`. Invalid input and encoder failure do.
    pub async fn run(&self, script: &QuizScript) -> PipelineResult<PipelineReport> {
        let run_id = Uuid::new_v4().to_string();
        let logger = RunLogger::new(&run_id, "quiz_video");
        let span = logger.create_span();

        let result = self.run_inner(script, &logger).instrument(span).await;
        match &result {
            Ok(report) => {
                counter!(RUNS_TOTAL, "outcome" => "success").increment(1);
                logger.log_completion(&format!(
                    "{} ({}/{} clips generated, {:.1}s)",
                    report.video_path.display(),
                    report.clips_generated,
                    report.clips_total,
                    report.total_duration
                ));
            }
            Err(e) => {
                counter!(RUNS_TOTAL, "outcome" => "failed").increment(1);
                logger.log_error(&e.to_string());
            }
        }
        result
    }

    async fn run_inner(
        &self,
        script: &QuizScript,
        logger: &RunLogger,
    ) -> PipelineResult<PipelineReport> {
        let config = &self.config;
        script.validate(config.choice_count)?;
        logger.log_start(&script.question);

        let requests: Vec<GenerationRequest> = script
            .choices_in_order()
            .into_iter()
            .map(|c| {
                GenerationRequest::new(c.number, c.video_prompt.clone(), config.target_duration_secs)
            })
            .collect();
        let slots: Vec<u32> = requests.iter().map(|r| r.slot_index).collect();
        let total = slots.len();

        tokio::fs::create_dir_all(&config.output_dir).await?;
        let resolver = AssetResolver::new(&config.render_root, &config.placeholder_dir);

        let assets = self.generate(requests, &slots, &resolver, logger).await?;
        logger.log_generation_summary(assets.generated_count(), total);

        let durations = probe_durations(
            assets
                .iter()
                .filter(|a| a.clip.exists())
                .map(|a| &a.clip),
        )
        .await;

        let translation = if config.timeline.bilingual.is_enabled() {
            logger.log_progress("Translating quiz text");
            Some(translate_or_fallback(self.translator.as_deref(), script).await)
        } else {
            None
        };

        let assembly = TimelineAssembler::new(config.timeline.clone())
            .with_clip_durations(durations)
            .assemble(script, &assets, translation.as_ref())?;
        for degraded in &assembly.degraded_segments {
            logger.log_warning(&format!(
                "{} rendered as plain card: {}",
                degraded.kind, degraded.reason
            ));
        }

        let total_duration = assembly.timeline.total_duration();
        let video_path = output_path(&config.output_dir, Local::now());
        logger.log_progress(&format!(
            "Encoding {:.1}s video with {}",
            total_duration,
            self.encoder.name()
        ));

        let request = RenderRequest {
            timeline: assembly.timeline,
            payload: assembly.payload,
            output: video_path.clone(),
        };
        self.encoder
            .encode(&request)
            .await
            .map_err(|source| {
                if let Some(stderr) = source.stderr_tail(ENCODER_STDERR_LINES) {
                    error!(
                        run_id = logger.run_id(),
                        encoder = self.encoder.name(),
                        stderr = %stderr,
                        "Encoder output"
                    );
                }
                PipelineError::EncodeFailed {
                    generated: assets.generated_count(),
                    total,
                    source,
                }
            })?;

        Ok(PipelineReport {
            run_id: logger.run_id().to_string(),
            clips_generated: assets.generated_count(),
            clips_total: total,
            degraded_segments: assembly.degraded_segments.len(),
            total_duration,
            video_path,
        })
    }

    /// Generate clips and place one asset per slot in the render tree.
    async fn generate(
        &self,
        requests: Vec<GenerationRequest>,
        slots: &[u32],
        resolver: &AssetResolver,
        logger: &RunLogger,
    ) -> PipelineResult<ResolvedAssets> {
        let generator = match (&self.generator, self.config.skip_generation) {
            (Some(generator), false) => generator.clone(),
            (_, true) => {
                logger.log_progress("Generation skipped, using placeholders");
                return Ok(resolver.placeholders(slots.iter().copied()).await);
            }
            (None, false) => {
                logger.log_warning("No generation client configured, using placeholders");
                return Ok(resolver.placeholders(slots.iter().copied()).await);
            }
        };

        let staging = self.config.staging_dir(logger.run_id());
        let scheduler = BatchScheduler::new(
            JobRunner::new(generator, self.config.generation.clone()),
            self.config.max_workers,
        )
        .with_deadline(self.config.batch_deadline);

        logger.log_progress(&format!("Generating {} clips", requests.len()));
        let batch = scheduler.run_batch(requests, &staging).await?;
        let assets = resolver.resolve(&batch, slots.iter().copied()).await;

        if let Err(e) = resolver.clear_staging(&staging).await {
            logger.log_warning(&format!("Failed to remove staging directory: {}", e));
        }
        Ok(assets)
    }
}

/// Timestamped output file inside `output_dir`.
pub fn output_path(output_dir: &Path, now: DateTime<Local>) -> PathBuf {
    output_dir.join(format!("quiz_{}.mp4", now.format("%Y%m%d_%H%M%S")))
}
