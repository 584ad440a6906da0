//! Timeline assembly: opening, one segment per choice, ending.
//!
//! Segment lengths come from [`TimelineConfig`] only. A segment that cannot
//! be built is replaced by a plain theme card and the run carries on; only
//! invalid input is an error.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use metrics::counter;
use quiz_models::{
    Anchor, ClipFit, DailyTheme, FrameGeometry, Position, QuizScript, RenderChoice, RenderPayload,
    Rgba, SegmentKind, TextOverlay, Timeline, TimelineSegment, Translation, VisualSource,
    DEFAULT_END_MESSAGE_EN,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SegmentFault, TimelineError, TimelineResult};
use crate::resolver::ResolvedAssets;

/// Metric name for segments replaced by plain cards.
pub const DEGRADED_SEGMENTS_TOTAL: &str = "quiz_degraded_segments_total";

/// How translated text is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BilingualMode {
    /// Source language only
    #[default]
    Off,
    /// Translation as a smaller line under the source text
    SecondaryLine,
    /// Translation replaces the source text
    Substitute,
}

impl BilingualMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, BilingualMode::Off)
    }
}

impl FromStr for BilingualMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "off" | "false" | "0" | "none" => Ok(BilingualMode::Off),
            "secondary" | "secondary_line" | "on" | "true" | "1" => Ok(BilingualMode::SecondaryLine),
            "substitute" | "replace" => Ok(BilingualMode::Substitute),
            other => Err(format!("unknown bilingual mode: {}", other)),
        }
    }
}

/// Segment lengths, geometry and styling for assembly.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    pub opening_secs: f64,
    pub choice_secs: f64,
    pub ending_secs: f64,
    /// Fade-in on the opening and fade-out on the ending
    pub fade_secs: f64,
    pub geometry: FrameGeometry,
    /// Font used for every overlay; `None` lets the encoder pick its default
    pub font_path: Option<PathBuf>,
    pub bilingual: BilingualMode,
    pub theme: DailyTheme,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            opening_secs: 6.0,
            choice_secs: 8.0,
            ending_secs: 5.0,
            fade_secs: 0.5,
            geometry: FrameGeometry::default(),
            font_path: None,
            bilingual: BilingualMode::Off,
            theme: DailyTheme::default(),
        }
    }
}

impl TimelineConfig {
    /// Load overrides from environment variables; the theme follows today's weekday.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: f64| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(default)
        };

        Self {
            opening_secs: secs("TIMELINE_OPENING_SECS", defaults.opening_secs),
            choice_secs: secs("TIMELINE_CHOICE_SECS", defaults.choice_secs),
            ending_secs: secs("TIMELINE_ENDING_SECS", defaults.ending_secs),
            fade_secs: secs("TIMELINE_FADE_SECS", defaults.fade_secs),
            geometry: FrameGeometry {
                width: env_u32("VIDEO_WIDTH").unwrap_or(defaults.geometry.width),
                height: env_u32("VIDEO_HEIGHT").unwrap_or(defaults.geometry.height),
                fps: env_u32("VIDEO_FPS").unwrap_or(defaults.geometry.fps),
            },
            font_path: std::env::var("QUIZ_FONT_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            bilingual: std::env::var("QUIZ_BILINGUAL_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bilingual),
            theme: DailyTheme::today(),
        }
    }

    /// Exact length of a timeline with `choices` choice segments.
    pub fn expected_total(&self, choices: usize) -> f64 {
        self.opening_secs + choices as f64 * self.choice_secs + self.ending_secs
    }

    fn validate(&self) -> TimelineResult<()> {
        for (segment, value) in [
            ("opening", self.opening_secs),
            ("choice", self.choice_secs),
            ("ending", self.ending_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TimelineError::InvalidDuration { segment, value });
            }
        }
        if self.fade_secs < 0.0 || !self.fade_secs.is_finite() {
            return Err(TimelineError::InvalidDuration {
                segment: "fade",
                value: self.fade_secs,
            });
        }
        let g = &self.geometry;
        if g.width == 0 || g.height == 0 || g.fps == 0 {
            return Err(TimelineError::InvalidGeometry(format!(
                "{}x{}@{}",
                g.width, g.height, g.fps
            )));
        }
        Ok(())
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// A segment that fell back to a plain card, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradedSegment {
    pub kind: SegmentKind,
    pub reason: SegmentFault,
}

/// Output of a successful assembly.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub timeline: Timeline,
    /// Structured form of the same content for template renderers
    pub payload: RenderPayload,
    /// Whether any segment was replaced by a plain card
    pub degraded: bool,
    pub degraded_segments: Vec<DegradedSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Opening,
    Choice(usize),
    Ending,
    Done,
}

/// Builds a [`Timeline`] from a quiz script and resolved assets.
#[derive(Debug, Clone, Default)]
pub struct TimelineAssembler {
    config: TimelineConfig,
    clip_durations: BTreeMap<u32, f64>,
}

impl TimelineAssembler {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            config,
            clip_durations: BTreeMap::new(),
        }
    }

    /// Probed source lengths by slot, used to pick loop or trim.
    pub fn with_clip_durations(mut self, durations: BTreeMap<u32, f64>) -> Self {
        self.clip_durations = durations;
        self
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Assemble the timeline.
    ///
    /// Fails only when the choice numbers differ from the resolved slots or
    /// the configured durations are not positive.
    pub fn assemble(
        &self,
        script: &QuizScript,
        assets: &ResolvedAssets,
        translation: Option<&Translation>,
    ) -> TimelineResult<Assembly> {
        self.config.validate()?;

        let mut choices: Vec<u32> = script.choices.iter().map(|c| c.number).collect();
        choices.sort_unstable();
        let slots = assets.slots();
        if choices != slots {
            return Err(TimelineError::SlotMismatch { choices, slots });
        }

        let translation = translation.filter(|_| self.config.bilingual.is_enabled());
        let mut timeline = Timeline::new(self.config.geometry);
        let mut degraded_segments = Vec::new();
        let mut stage = Stage::Opening;

        loop {
            let (built, kind, next) = match stage {
                Stage::Opening => (
                    self.opening(script, translation),
                    SegmentKind::Opening,
                    if slots.is_empty() {
                        Stage::Ending
                    } else {
                        Stage::Choice(0)
                    },
                ),
                Stage::Choice(i) => {
                    let slot = slots[i];
                    (
                        self.choice(script, assets, translation, slot),
                        SegmentKind::Choice(slot),
                        if i + 1 < slots.len() {
                            Stage::Choice(i + 1)
                        } else {
                            Stage::Ending
                        },
                    )
                }
                Stage::Ending => (
                    self.ending(script, translation),
                    SegmentKind::Ending,
                    Stage::Done,
                ),
                Stage::Done => break,
            };

            let segment = match built.and_then(|s| self.check_segment(s)) {
                Ok(segment) => segment,
                Err(reason) => {
                    warn!(segment = %kind, reason = %reason, "Segment degraded to plain card");
                    counter!(DEGRADED_SEGMENTS_TOTAL).increment(1);
                    degraded_segments.push(DegradedSegment { kind, reason });
                    self.plain_card(kind)
                }
            };
            debug!(segment = %kind, duration = segment.duration_secs, "Segment appended");
            timeline.push(segment);
            stage = next;
        }

        info!(
            segments = timeline.len(),
            total_duration = timeline.total_duration(),
            degraded = degraded_segments.len(),
            "Timeline assembled"
        );

        Ok(Assembly {
            payload: build_payload(script, assets, translation),
            degraded: !degraded_segments.is_empty(),
            degraded_segments,
            timeline,
        })
    }

    fn opening(
        &self,
        script: &QuizScript,
        translation: Option<&Translation>,
    ) -> Result<TimelineSegment, SegmentFault> {
        let theme = &self.config.theme;
        let secs = self.config.opening_secs;
        let mut segment =
            TimelineSegment::color_card(SegmentKind::Opening, secs, theme.background);
        segment.fade_in_secs = self.fade_for(secs);

        let question = Position::new(Anchor::Center, 0, -120);
        let secondary = Position::new(Anchor::Center, 0, 60);
        segment.overlays.extend(self.bilingual_lines(
            &script.question,
            translation.map(|t| t.question.as_str()),
            (72, 44),
            theme.text,
            (question, secondary),
            secs,
        ));

        if let Some(context) = script.context.as_deref().filter(|c| !c.trim().is_empty()) {
            segment.overlays.push(TextOverlay::full_span(
                context,
                36,
                theme.text,
                Position::new(Anchor::LowerThird, 0, 80),
                secs,
            ));
        }
        if let Some(category) = script.category.as_deref().filter(|c| !c.trim().is_empty()) {
            segment.overlays.push(
                TextOverlay::full_span(
                    category,
                    40,
                    theme.on_primary(),
                    Position::new(Anchor::TopCenter, 0, 160),
                    secs,
                )
                .with_box(theme.primary),
            );
        }
        Ok(segment)
    }

    fn choice(
        &self,
        script: &QuizScript,
        assets: &ResolvedAssets,
        translation: Option<&Translation>,
        slot: u32,
    ) -> Result<TimelineSegment, SegmentFault> {
        let theme = &self.config.theme;
        let secs = self.config.choice_secs;
        let (Some(choice), Some(asset)) = (script.choice(slot), assets.get(slot)) else {
            return Err(SegmentFault::EmptyText);
        };
        if !asset.clip.exists() {
            return Err(SegmentFault::MissingVisual(asset.clip.source_path.clone()));
        }

        let fit = ClipFit::compute(self.clip_durations.get(&slot).copied(), secs);
        let mut segment = TimelineSegment {
            kind: SegmentKind::Choice(slot),
            duration_secs: fit.output_duration(secs),
            visual: VisualSource::Clip {
                clip: asset.clip.clone(),
                fit,
            },
            overlays: Vec::new(),
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            degraded: false,
        };

        segment.overlays.push(
            TextOverlay::full_span(
                slot.to_string(),
                96,
                theme.on_primary(),
                Position::new(Anchor::TopLeft, 60, 140),
                secs,
            )
            .with_box(theme.primary),
        );

        let title = Position::new(Anchor::LowerThird, 0, 0);
        let secondary = Position::new(Anchor::LowerThird, 0, 90);
        let lines = self.bilingual_lines(
            &choice.title,
            translation.and_then(|t| t.choice(slot)),
            (64, 40),
            Rgba::WHITE,
            (title, secondary),
            secs,
        );
        let description_offset = if lines.len() > 1 { 170 } else { 90 };
        segment.overlays.extend(
            lines
                .into_iter()
                .map(|o| o.with_box(Rgba::BLACK.with_alpha(0.5))),
        );

        if let Some(description) = choice
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            segment.overlays.push(
                TextOverlay::full_span(
                    description,
                    36,
                    Rgba::WHITE,
                    Position::new(Anchor::LowerThird, 0, description_offset),
                    secs,
                )
                .with_box(Rgba::BLACK.with_alpha(0.4)),
            );
        }
        Ok(segment)
    }

    fn ending(
        &self,
        script: &QuizScript,
        translation: Option<&Translation>,
    ) -> Result<TimelineSegment, SegmentFault> {
        let theme = &self.config.theme;
        let secs = self.config.ending_secs;
        let mut segment = TimelineSegment::color_card(SegmentKind::Ending, secs, theme.background);
        segment.fade_out_secs = self.fade_for(secs);

        let translated = translation.map(|t| translated_end_message(script, t));
        segment.overlays.extend(self.bilingual_lines(
            script.end_message_or_default(),
            translated.as_deref(),
            (64, 40),
            theme.text,
            (
                Position::new(Anchor::Center, 0, -60),
                Position::new(Anchor::Center, 0, 140),
            ),
            secs,
        ));
        Ok(segment)
    }

    /// Source line plus translation, arranged for the bilingual mode.
    fn bilingual_lines(
        &self,
        source: &str,
        translated: Option<&str>,
        (primary_pt, secondary_pt): (u32, u32),
        color: Rgba,
        (primary_pos, secondary_pos): (Position, Position),
        secs: f64,
    ) -> Vec<TextOverlay> {
        let translated = translated.filter(|t| !t.trim().is_empty() && *t != source);
        match (self.config.bilingual, translated) {
            (BilingualMode::SecondaryLine, Some(t)) => vec![
                TextOverlay::full_span(source, primary_pt, color, primary_pos, secs),
                TextOverlay::full_span(t, secondary_pt, color, secondary_pos, secs),
            ],
            (BilingualMode::Substitute, Some(t)) => {
                vec![TextOverlay::full_span(t, primary_pt, color, primary_pos, secs)]
            }
            _ => vec![TextOverlay::full_span(source, primary_pt, color, primary_pos, secs)],
        }
    }

    fn check_segment(&self, mut segment: TimelineSegment) -> Result<TimelineSegment, SegmentFault> {
        if !segment.overlays.is_empty() {
            if let Some(font) = &self.config.font_path {
                if !font.is_file() {
                    return Err(SegmentFault::MissingFont(font.clone()));
                }
            }
        }
        for overlay in &mut segment.overlays {
            overlay.text = normalize_whitespace(&overlay.text);
            check_text(&overlay.text)?;
            if !overlay.fits_within(segment.duration_secs) {
                return Err(SegmentFault::OverlayOutOfBounds(overlay.text.clone()));
            }
        }
        Ok(segment)
    }

    fn plain_card(&self, kind: SegmentKind) -> TimelineSegment {
        let secs = match kind {
            SegmentKind::Opening => self.config.opening_secs,
            SegmentKind::Choice(_) => self.config.choice_secs,
            SegmentKind::Ending => self.config.ending_secs,
        };
        let mut card = TimelineSegment::color_card(kind, secs, self.config.theme.background);
        match kind {
            SegmentKind::Opening => card.fade_in_secs = self.fade_for(secs),
            SegmentKind::Ending => card.fade_out_secs = self.fade_for(secs),
            SegmentKind::Choice(_) => {}
        }
        card.degraded = true;
        card
    }

    fn fade_for(&self, segment_secs: f64) -> f64 {
        self.config.fade_secs.min(segment_secs / 2.0)
    }
}

/// CRLF becomes a line break; tabs and stray carriage returns become spaces.
fn normalize_whitespace(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .map(|c| if c == '\t' || c == '\r' { ' ' } else { c })
        .collect()
}

fn check_text(text: &str) -> Result<(), SegmentFault> {
    if text.trim().is_empty() {
        return Err(SegmentFault::EmptyText);
    }
    if text.chars().any(|c| c.is_control() && c != '\n') {
        return Err(SegmentFault::ControlCharacters);
    }
    Ok(())
}

fn translated_end_message(script: &QuizScript, translation: &Translation) -> String {
    match (&translation.end_message, &script.end_message) {
        (Some(message), _) if !message.trim().is_empty() => message.clone(),
        (_, None) if !translation.is_fallback => DEFAULT_END_MESSAGE_EN.to_string(),
        _ => script.end_message_or_default().to_string(),
    }
}

/// Structured render input for template renderers.
pub fn build_payload(
    script: &QuizScript,
    assets: &ResolvedAssets,
    translation: Option<&Translation>,
) -> RenderPayload {
    RenderPayload {
        question: script.question.clone(),
        question_translated: translation.map(|t| t.question.clone()),
        choices: script
            .choices_in_order()
            .into_iter()
            .map(|choice| RenderChoice {
                number: choice.number,
                text: choice.title.clone(),
                text_translated: translation
                    .and_then(|t| t.choice(choice.number))
                    .map(str::to_string),
                video_path: assets
                    .get(choice.number)
                    .filter(|a| a.clip.exists())
                    .map(|a| a.relative_path()),
            })
            .collect(),
        end_message: script.end_message_or_default().to_string(),
        end_message_translated: translation.map(|t| translated_end_message(script, t)),
    }
}
