//! Timeline, segment and overlay definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ClipReference;

/// Tolerance used when comparing accumulated durations.
pub const DURATION_EPSILON: f64 = 1e-6;

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Opacity, 0.0 to 1.0
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Rgba = Rgba::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(mut self, a: f32) -> Self {
        self.a = a.clamp(0.0, 1.0);
        self
    }

    /// Parse `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Hex form without alpha (`0xRRGGBB`), as FFmpeg color syntax expects.
    pub fn to_hex(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// FFmpeg color with alpha suffix (`0xRRGGBB@0.80`).
    pub fn to_ffmpeg(&self) -> String {
        format!("{}@{:.2}", self.to_hex(), self.a)
    }
}

/// Output frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        // Vertical 9:16 short
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }
}

/// Screen anchor an overlay is positioned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    Center,
    /// Horizontally centered, top edge at two thirds of the frame height
    LowerThird,
}

/// Anchor plus pixel offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub anchor: Anchor,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Position {
    pub fn new(anchor: Anchor, offset_x: i32, offset_y: i32) -> Self {
        Self {
            anchor,
            offset_x,
            offset_y,
        }
    }

    pub fn at(anchor: Anchor) -> Self {
        Self::new(anchor, 0, 0)
    }
}

/// A line of text drawn over a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub font_size_pt: u32,
    pub color: Rgba,
    /// Offset from the start of the owning segment
    pub start_offset_secs: f64,
    pub duration_secs: f64,
    pub position: Position,
    /// Background box color, if the text sits on a box
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_color: Option<Rgba>,
}

impl TextOverlay {
    /// Overlay visible for the whole of a segment.
    pub fn full_span(
        text: impl Into<String>,
        font_size_pt: u32,
        color: Rgba,
        position: Position,
        segment_secs: f64,
    ) -> Self {
        Self {
            text: text.into(),
            font_size_pt,
            color,
            start_offset_secs: 0.0,
            duration_secs: segment_secs,
            position,
            box_color: None,
        }
    }

    pub fn with_box(mut self, color: Rgba) -> Self {
        self.box_color = Some(color);
        self
    }

    pub fn end_offset_secs(&self) -> f64 {
        self.start_offset_secs + self.duration_secs
    }

    /// Whether the overlay lies inside a segment of the given length.
    pub fn fits_within(&self, segment_secs: f64) -> bool {
        self.start_offset_secs >= 0.0
            && self.duration_secs > 0.0
            && self.end_offset_secs() <= segment_secs + DURATION_EPSILON
    }
}

/// How a source clip is stretched in time to fill a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClipFit {
    /// Source length matches the segment
    Exact,
    /// Source is shorter: played `plays` times, last play cut at the segment end
    Loop { plays: u32 },
    /// Source is longer: only the first segment-length seconds are used
    Trim,
    /// Source length was not probed; the encoder loops and cuts as needed
    Unknown,
}

impl ClipFit {
    /// Decide the fit for a source of `source_secs` in a segment of `segment_secs`.
    pub fn compute(source_secs: Option<f64>, segment_secs: f64) -> Self {
        match source_secs {
            Some(src) if src > DURATION_EPSILON => {
                if (src - segment_secs).abs() <= DURATION_EPSILON {
                    ClipFit::Exact
                } else if src < segment_secs {
                    ClipFit::Loop {
                        plays: (segment_secs / src).ceil() as u32,
                    }
                } else {
                    ClipFit::Trim
                }
            }
            _ => ClipFit::Unknown,
        }
    }

    /// Duration the fitted clip occupies: always the segment length.
    pub fn output_duration(&self, segment_secs: f64) -> f64 {
        segment_secs
    }
}

/// What a segment shows underneath its overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualSource {
    Clip { clip: ClipReference, fit: ClipFit },
    Color { color: Rgba },
}

impl VisualSource {
    pub fn is_clip(&self) -> bool {
        matches!(self, VisualSource::Clip { .. })
    }
}

/// Role of a segment in the fixed timeline structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "slot", rename_all = "snake_case")]
pub enum SegmentKind {
    Opening,
    Choice(u32),
    Ending,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Opening => f.write_str("opening"),
            SegmentKind::Choice(slot) => write!(f, "choice_{}", slot),
            SegmentKind::Ending => f.write_str("ending"),
        }
    }
}

/// One fixed-duration section of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    pub kind: SegmentKind,
    pub duration_secs: f64,
    pub visual: VisualSource,
    pub overlays: Vec<TextOverlay>,
    /// Leading fade from black, in seconds
    #[serde(default)]
    pub fade_in_secs: f64,
    /// Trailing fade to black, in seconds
    #[serde(default)]
    pub fade_out_secs: f64,
    /// Segment fell back to a bare color card
    #[serde(default)]
    pub degraded: bool,
}

impl TimelineSegment {
    /// Bare color card with no overlays.
    pub fn color_card(kind: SegmentKind, duration_secs: f64, color: Rgba) -> Self {
        Self {
            kind,
            duration_secs,
            visual: VisualSource::Color { color },
            overlays: Vec::new(),
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            degraded: false,
        }
    }
}

/// Ordered, back-to-back sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub geometry: FrameGeometry,
    segments: Vec<TimelineSegment>,
}

impl Timeline {
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            segments: Vec::new(),
        }
    }

    /// Append a segment at the end. Segments are never reordered.
    pub fn push(&mut self, segment: TimelineSegment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of segment durations; segments are joined without gaps or overlap.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_secs).sum()
    }

    /// Start time of each segment on the joined timeline.
    pub fn segment_starts(&self) -> Vec<f64> {
        let mut starts = Vec::with_capacity(self.segments.len());
        let mut t = 0.0;
        for segment in &self.segments {
            starts.push(t);
            t += segment.duration_secs;
        }
        starts
    }

    pub fn degraded_count(&self) -> usize {
        self.segments.iter().filter(|s| s.degraded).count()
    }
}
