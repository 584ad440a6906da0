//! Whole runs against in-memory collaborators.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_test::assert_ok;

use quiz_genclient::{GenResult, GenerationApi, GenerationPolicy, JobStatus};
use quiz_media::{BilingualMode, MediaError, MediaResult, RenderRequest, VideoEncoder};
use quiz_models::{ChoiceScript, GenerationRequest, QuizScript, SegmentKind, Translation, TranslationRequest};
use quiz_worker::{PipelineConfig, PipelineError, QuizPipeline, TranslateError, Translator};

/// Fails remotely for the listed slots.
struct FakeGenerator {
    failing: Vec<u32>,
    submits: AtomicU32,
}

impl FakeGenerator {
    fn failing(slots: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            failing: slots.to_vec(),
            submits: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl GenerationApi for FakeGenerator {
    async fn submit(&self, request: &GenerationRequest, _aspect: &str) -> GenResult<String> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(format!("gen-{}", request.slot_index))
    }

    async fn poll(&self, id: &str) -> GenResult<JobStatus> {
        let slot: u32 = id.trim_start_matches("gen-").parse().unwrap_or(0);
        if self.failing.contains(&slot) {
            Ok(JobStatus::Failed {
                reason: "content filter".into(),
            })
        } else {
            Ok(JobStatus::Completed {
                clip_url: format!("https://cdn.example/{}.mp4", slot),
            })
        }
    }

    async fn download(&self, _url: &str, dest: &Path) -> GenResult<()> {
        tokio::fs::write(dest, b"generated clip").await?;
        Ok(())
    }
}

/// Records requests; optionally fails.
#[derive(Default)]
struct RecordingEncoder {
    fail: bool,
    requests: Mutex<Vec<RenderRequest>>,
}

#[async_trait]
impl VideoEncoder for RecordingEncoder {
    async fn encode(&self, request: &RenderRequest) -> MediaResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            Err(MediaError::Timeout(600))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Fails the way a crashed Remotion render does.
struct CrashingRenderer;

#[async_trait]
impl VideoEncoder for CrashingRenderer {
    async fn encode(&self, _request: &RenderRequest) -> MediaResult<()> {
        Err(MediaError::render_failed(
            "Remotion exited with non-zero status",
            Some("Bundled in 2.1s\nError: Cannot find module './QuizWithVideos'".into()),
            Some(1),
        ))
    }

    fn name(&self) -> &'static str {
        "remotion"
    }
}

struct DownTranslator;

#[async_trait]
impl Translator for DownTranslator {
    async fn translate(&self, _request: &TranslationRequest) -> Result<Translation, TranslateError> {
        Err(TranslateError::Status {
            status: 500,
            body: "internal".into(),
        })
    }
}

fn script() -> QuizScript {
    QuizScript {
        category: Some("究極の選択".into()),
        question: "一週間過ごすなら？".into(),
        context: None,
        choices: ["氷の部屋", "溶岩の中", "無重力の宇宙", "深海"]
            .iter()
            .enumerate()
            .map(|(i, title)| ChoiceScript {
                number: i as u32 + 1,
                title: title.to_string(),
                description: None,
                video_prompt: format!("cinematic shot of {}", title),
            })
            .collect(),
        end_message: None,
    }
}

fn config(dir: &TempDir) -> PipelineConfig {
    let placeholders = dir.path().join("placeholders");
    std::fs::create_dir_all(&placeholders).unwrap();
    for slot in 1..=4 {
        std::fs::write(placeholders.join(format!("placeholder_{}.mp4", slot)), b"ph").unwrap();
    }

    PipelineConfig {
        work_dir: dir.path().join("work"),
        output_dir: dir.path().join("output"),
        render_root: dir.path().join("public"),
        placeholder_dir: placeholders,
        generation: GenerationPolicy {
            retry_delay: Duration::from_millis(1),
            poll_interval: Duration::from_millis(1),
            generation_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn partial_generation_still_renders_full_video() {
    let dir = TempDir::new().unwrap();
    let encoder = Arc::new(RecordingEncoder::default());
    let pipeline = QuizPipeline::new(
        config(&dir),
        Some(FakeGenerator::failing(&[2, 4])),
        None,
        encoder.clone(),
    );

    let report = assert_ok!(pipeline.run(&script()).await);

    assert_eq!(report.clips_generated, 2);
    assert_eq!(report.clips_total, 4);
    assert_eq!(report.degraded_segments, 0);
    assert!((report.total_duration - 43.0).abs() < 1e-9);
    assert!(report.video_path.starts_with(dir.path().join("output")));
    assert!(!dir.path().join("work/staging").join(&report.run_id).exists());

    let requests = encoder.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.output, report.video_path);

    let paths: Vec<&str> = request
        .payload
        .choices
        .iter()
        .map(|c| c.video_path.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(
        paths,
        vec![
            "videos/choice_1.mp4",
            "videos/placeholder_2.mp4",
            "videos/choice_3.mp4",
            "videos/placeholder_4.mp4",
        ]
    );

    let kinds: Vec<SegmentKind> = request.timeline.segments().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SegmentKind::Opening,
            SegmentKind::Choice(1),
            SegmentKind::Choice(2),
            SegmentKind::Choice(3),
            SegmentKind::Choice(4),
            SegmentKind::Ending,
        ]
    );
}

#[tokio::test]
async fn skip_mode_never_calls_generator() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::failing(&[]);
    let config = PipelineConfig {
        skip_generation: true,
        ..config(&dir)
    };
    let pipeline = QuizPipeline::new(
        config,
        Some(generator.clone()),
        None,
        Arc::new(RecordingEncoder::default()),
    );

    let report = pipeline.run(&script()).await.unwrap();

    assert_eq!(generator.submits.load(Ordering::SeqCst), 0);
    assert_eq!(report.clips_generated, 0);
    assert_eq!(report.clips_total, 4);
    assert!(dir.path().join("public/videos/placeholder_3.mp4").exists());
}

#[tokio::test]
async fn encoder_failure_reports_generation_counts() {
    let dir = TempDir::new().unwrap();
    let encoder = Arc::new(RecordingEncoder {
        fail: true,
        ..Default::default()
    });
    let pipeline = QuizPipeline::new(
        config(&dir),
        Some(FakeGenerator::failing(&[1, 2])),
        None,
        encoder,
    );

    let err = pipeline.run(&script()).await.unwrap_err();

    match err {
        PipelineError::EncodeFailed {
            generated, total, ..
        } => {
            assert_eq!(generated, 2);
            assert_eq!(total, 4);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn renderer_stderr_reaches_the_error_message() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        skip_generation: true,
        ..config(&dir)
    };
    let pipeline = QuizPipeline::new(config, None, None, Arc::new(CrashingRenderer));

    let err = pipeline.run(&script()).await.unwrap_err();

    assert!(matches!(err, PipelineError::EncodeFailed { generated: 0, total: 4, .. }));
    let message = err.to_string();
    assert!(message.contains("Remotion exited with non-zero status"));
    assert!(message.contains("Error: Cannot find module './QuizWithVideos'"));
}

#[tokio::test]
async fn invalid_script_is_rejected_before_any_work() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::failing(&[]);
    let encoder = Arc::new(RecordingEncoder::default());
    let pipeline = QuizPipeline::new(config(&dir), Some(generator.clone()), None, encoder.clone());

    let mut script = script();
    script.choices.pop();
    let err = pipeline.run(&script).await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert_eq!(generator.submits.load(Ordering::SeqCst), 0);
    assert!(encoder.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn translation_outage_falls_back_to_source_text() {
    let dir = TempDir::new().unwrap();
    let mut config = PipelineConfig {
        skip_generation: true,
        ..config(&dir)
    };
    config.timeline.bilingual = BilingualMode::SecondaryLine;
    let encoder = Arc::new(RecordingEncoder::default());
    let pipeline = QuizPipeline::new(config, None, Some(Arc::new(DownTranslator)), encoder.clone());

    let report = pipeline.run(&script()).await.unwrap();
    assert_eq!(report.degraded_segments, 0);

    let requests = encoder.requests.lock().unwrap();
    let payload = &requests[0].payload;
    assert_eq!(payload.question_translated.as_deref(), Some(payload.question.as_str()));
    for choice in &payload.choices {
        assert_eq!(choice.text_translated.as_deref(), Some(choice.text.as_str()));
    }
}
