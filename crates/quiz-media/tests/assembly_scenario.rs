//! Partial batch through resolution and assembly.

use std::path::Path;

use quiz_media::{AssetResolver, FfmpegEncoder, TimelineAssembler, TimelineConfig};
use quiz_models::{
    BatchResult, ChoiceScript, ClipReference, JobState, QuizScript, SegmentKind, SlotOutcome,
    VisualSource,
};
use tempfile::TempDir;

fn script() -> QuizScript {
    QuizScript {
        category: None,
        question: "Which door do you open?".to_string(),
        context: Some("Only one leads home".to_string()),
        choices: (1..=4)
            .map(|n| ChoiceScript {
                number: n,
                title: format!("Door {}", n),
                description: None,
                video_prompt: format!("door number {}", n),
            })
            .collect(),
        end_message: None,
    }
}

fn write(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn partial_batch_yields_full_timeline() {
    let dir = TempDir::new().unwrap();
    let staging = dir.path().join("staging");
    let placeholders = dir.path().join("placeholders");
    for slot in 1..=4 {
        write(&placeholders.join(format!("placeholder_{}.mp4", slot)), b"ph");
    }

    let mut batch = BatchResult::seeded(1..=4);
    for slot in [1, 3] {
        let path = staging.join(format!("choice_{}.mp4", slot));
        write(&path, b"generated");
        batch.record(
            slot,
            SlotOutcome {
                clip: Some(ClipReference::new(&path, slot)),
                attempts: 1,
                final_state: JobState::Completed,
            },
        );
    }

    let resolver = AssetResolver::new(dir.path().join("public"), &placeholders);
    let assets = resolver.resolve(&batch, 1..=4).await;
    resolver.clear_staging(&staging).await.unwrap();

    let paths: Vec<String> = assets.iter().map(|a| a.relative_path()).collect();
    assert_eq!(
        paths,
        vec![
            "videos/choice_1.mp4",
            "videos/placeholder_2.mp4",
            "videos/choice_3.mp4",
            "videos/placeholder_4.mp4",
        ]
    );
    assert!(!staging.exists());

    let config = TimelineConfig::default();
    let expected = config.expected_total(4);
    let assembly = TimelineAssembler::new(config)
        .assemble(&script(), &assets, None)
        .unwrap();

    let segments = assembly.timeline.segments();
    assert_eq!(segments.len(), 6);
    assert_eq!(segments[0].kind, SegmentKind::Opening);
    assert_eq!(segments[5].kind, SegmentKind::Ending);
    for (i, slot) in (1..=4).enumerate() {
        let segment = &segments[i + 1];
        assert_eq!(segment.kind, SegmentKind::Choice(slot));
        match &segment.visual {
            VisualSource::Clip { clip, .. } => assert_eq!(clip.slot_index, slot),
            VisualSource::Color { .. } => panic!("slot {} should show a clip", slot),
        }
    }
    assert!((assembly.timeline.total_duration() - expected).abs() < 1e-9);
    assert!(!assembly.degraded);

    let cmd = FfmpegEncoder::default()
        .build_command(&assembly.timeline, &dir.path().join("out.mp4"))
        .unwrap();
    assert_eq!(cmd.input_count(), 6);
}

#[tokio::test]
async fn all_failed_batch_still_has_exact_duration() {
    let dir = TempDir::new().unwrap();
    let resolver = AssetResolver::new(dir.path().join("public"), dir.path().join("missing"));

    let assets = resolver.resolve(&BatchResult::seeded(1..=4), 1..=4).await;
    assert_eq!(assets.placeholder_count(), 4);

    let assembly = TimelineAssembler::default()
        .assemble(&script(), &assets, None)
        .unwrap();

    // No placeholder sources exist, so every choice degrades to a card.
    assert_eq!(assembly.degraded_segments.len(), 4);
    assert!((assembly.timeline.total_duration() - 43.0).abs() < 1e-9);
}
