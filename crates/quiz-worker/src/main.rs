//! Quiz video worker binary.
//!
//! Reads a quiz script (JSON) from `QUIZ_QUESTION_FILE` or the first argument
//! and renders one video.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quiz_genclient::{GenerationApi, LumaClient};
use quiz_media::{FfmpegEncoder, RemotionRenderer, VideoEncoder};
use quiz_models::QuizScript;
use quiz_worker::{EncoderKind, GeminiTranslator, PipelineConfig, QuizPipeline, Translator};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("quiz=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting quiz-worker");

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let script_path = match std::env::var("QUIZ_QUESTION_FILE")
        .ok()
        .or_else(|| std::env::args().nth(1))
    {
        Some(path) => PathBuf::from(path),
        None => {
            error!("No quiz script given: set QUIZ_QUESTION_FILE or pass a path");
            std::process::exit(2);
        }
    };

    let script = match load_script(&script_path).await {
        Ok(script) => script,
        Err(e) => {
            error!("Failed to load quiz script {}: {}", script_path.display(), e);
            std::process::exit(1);
        }
    };

    let generator: Option<Arc<dyn GenerationApi>> = if config.skip_generation {
        None
    } else {
        match LumaClient::from_env() {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Generation client unavailable, placeholders will be used: {}", e);
                None
            }
        }
    };

    let translator: Option<Arc<dyn Translator>> = if config.timeline.bilingual.is_enabled() {
        match GeminiTranslator::from_env() {
            Ok(translator) => Some(Arc::new(translator)),
            Err(e) => {
                warn!("Translator unavailable, source text will be reused: {}", e);
                None
            }
        }
    } else {
        None
    };

    let encoder: Arc<dyn VideoEncoder> = match config.encoder {
        EncoderKind::Ffmpeg => Arc::new(
            FfmpegEncoder::new(config.encoding.clone())
                .with_font(config.timeline.font_path.clone())
                .with_timeout(config.encode_timeout_secs),
        ),
        EncoderKind::Remotion => Arc::new(
            RemotionRenderer::new(config.remotion_dir.clone())
                .with_timeout(Duration::from_secs(config.encode_timeout_secs)),
        ),
    };

    let pipeline = QuizPipeline::new(config, generator, translator, encoder);

    match pipeline.run(&script).await {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                clips_generated = report.clips_generated,
                clips_total = report.clips_total,
                degraded_segments = report.degraded_segments,
                "Video written to {}",
                report.video_path.display()
            );
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn load_script(path: &Path) -> Result<QuizScript, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}
