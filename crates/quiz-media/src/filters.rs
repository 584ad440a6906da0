//! FFmpeg filter graph construction for timelines.

use std::path::Path;

use quiz_models::{Anchor, FrameGeometry, TextOverlay, Timeline, TimelineSegment, VisualSource};

/// Line height as a multiple of font size.
const LINE_SPACING: f64 = 1.3;

/// Label of the joined output stream.
pub const OUTPUT_LABEL: &str = "[outv]";

/// Escape text for a quoted `drawtext` value inside `-filter_complex`.
///
/// Straight quotes cannot survive both escaping levels and become `’`.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '\'' => out.push('\u{2019}'),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\\\%"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a file path for a single-quoted filter option.
///
/// Quoting cannot contain `'`, so each one closes the quote, is emitted
/// escaped for the option parser, then reopens it.
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '\'' => out.push_str("\\'\\''"),
            _ => out.push(c),
        }
    }
    out
}

/// Chain that brings a clip to the frame: fill the height, center-crop
/// when wider, pad when narrower.
pub fn frame_fit_chain(geometry: &FrameGeometry) -> String {
    format!(
        "scale=-2:{h},crop=min(iw\\,{w}):{h},pad={w}:{h}:(ow-iw)/2:0:color=black,setsar=1,fps={fps},format=yuv420p",
        w = geometry.width,
        h = geometry.height,
        fps = geometry.fps,
    )
}

/// `drawtext` filters for one overlay, one per line, active only in its window.
pub fn drawtext_filters(
    overlay: &TextOverlay,
    geometry: &FrameGeometry,
    font_path: Option<&Path>,
) -> Vec<String> {
    let lines: Vec<&str> = overlay.text.lines().filter(|l| !l.trim().is_empty()).collect();
    let line_height = (overlay.font_size_pt as f64 * LINE_SPACING).round() as i64;
    let block_height = line_height * lines.len() as i64;
    let top = block_top(overlay, geometry, block_height);

    let x = match overlay.position.anchor {
        Anchor::TopLeft => overlay.position.offset_x.to_string(),
        _ => format!("(w-text_w)/2{:+}", overlay.position.offset_x),
    };

    let font = font_path
        .map(|p| format!(":fontfile='{}'", escape_filter_path(p)))
        .unwrap_or_default();
    let boxed = overlay
        .box_color
        .map(|c| format!(":box=1:boxcolor={}:boxborderw=16", c.to_ffmpeg()))
        .unwrap_or_default();

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "drawtext=text='{text}'{font}:fontsize={size}:fontcolor={color}:x={x}:y={y}{boxed}:enable='between(t,{start:.3},{end:.3})'",
                text = escape_drawtext(line),
                size = overlay.font_size_pt,
                color = overlay.color.to_ffmpeg(),
                y = top + i as i64 * line_height,
                start = overlay.start_offset_secs,
                end = overlay.end_offset_secs(),
            )
        })
        .collect()
}

fn block_top(overlay: &TextOverlay, geometry: &FrameGeometry, block_height: i64) -> i64 {
    let h = geometry.height as i64;
    let dy = overlay.position.offset_y as i64;
    match overlay.position.anchor {
        Anchor::TopLeft | Anchor::TopCenter => dy,
        Anchor::Center => (h - block_height) / 2 + dy,
        Anchor::LowerThird => h * 2 / 3 + dy,
    }
}

/// Full per-segment chain for input `index`, ending in label `[v{index}]`.
pub fn segment_chain(
    index: usize,
    segment: &TimelineSegment,
    geometry: &FrameGeometry,
    font_path: Option<&Path>,
) -> String {
    let d = segment.duration_secs;
    let mut filters: Vec<String> = Vec::new();

    match &segment.visual {
        VisualSource::Clip { .. } => filters.push(frame_fit_chain(geometry)),
        VisualSource::Color { .. } => {
            filters.push("setsar=1".to_string());
            filters.push("format=yuv420p".to_string());
        }
    }
    filters.push(format!("trim=duration={:.3}", d));
    filters.push("setpts=PTS-STARTPTS".to_string());

    for overlay in &segment.overlays {
        filters.extend(drawtext_filters(overlay, geometry, font_path));
    }

    if segment.fade_in_secs > 0.0 {
        filters.push(format!("fade=t=in:st=0:d={:.3}", segment.fade_in_secs));
    }
    if segment.fade_out_secs > 0.0 {
        filters.push(format!(
            "fade=t=out:st={:.3}:d={:.3}",
            (d - segment.fade_out_secs).max(0.0),
            segment.fade_out_secs
        ));
    }

    format!("[{}:v]{}[v{}]", index, filters.join(","), index)
}

/// lavfi source for a color card segment.
pub fn color_source(segment: &TimelineSegment, geometry: &FrameGeometry) -> Option<String> {
    match &segment.visual {
        VisualSource::Color { color } => Some(format!(
            "color=c={}:s={}x{}:r={}",
            color.to_hex(),
            geometry.width,
            geometry.height,
            geometry.fps
        )),
        VisualSource::Clip { .. } => None,
    }
}

/// Complete `-filter_complex` graph: every segment chain, then a concat.
pub fn timeline_graph(timeline: &Timeline, font_path: Option<&Path>) -> String {
    let mut parts: Vec<String> = timeline
        .segments()
        .iter()
        .enumerate()
        .map(|(i, segment)| segment_chain(i, segment, &timeline.geometry, font_path))
        .collect();

    let labels: String = (0..timeline.len()).map(|i| format!("[v{}]", i)).collect();
    parts.push(format!(
        "{}concat=n={}:v=1:a=0{}",
        labels,
        timeline.len(),
        OUTPUT_LABEL
    ));
    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_models::{ClipFit, ClipReference, Position, Rgba, SegmentKind};

    fn geometry() -> FrameGeometry {
        FrameGeometry {
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("A: 50%"), "A\\: 50\\\\%");
        assert_eq!(escape_drawtext("it's"), "it\u{2019}s");
        assert_eq!(escape_drawtext("a\\b"), "a\\\\\\\\b");
    }

    #[test]
    fn test_escape_filter_path_reopens_quotes() {
        let path = Path::new("/fonts/it's:bold.ttf");
        assert_eq!(escape_filter_path(path), "/fonts/it\\'\\''s\\:bold.ttf");

        assert_eq!(
            escape_filter_path(Path::new("/usr/share/fonts/NotoSansCJK-Bold.ttc")),
            "/usr/share/fonts/NotoSansCJK-Bold.ttc"
        );
    }

    #[test]
    fn test_multiline_overlay_splits_into_lines() {
        let overlay = TextOverlay::full_span(
            "line one\nline two",
            40,
            Rgba::WHITE,
            Position::at(Anchor::Center),
            5.0,
        );
        let filters = drawtext_filters(&overlay, &geometry(), None);

        assert_eq!(filters.len(), 2);
        assert!(filters[0].contains("text='line one'"));
        assert!(filters[0].contains("y=908"));
        assert!(filters[1].contains("y=960"));
        assert!(filters[1].contains("enable='between(t,0.000,5.000)'"));
    }

    #[test]
    fn test_badge_overlay_position_and_box() {
        let overlay = TextOverlay::full_span(
            "3",
            96,
            Rgba::BLACK,
            Position::new(Anchor::TopLeft, 60, 140),
            8.0,
        )
        .with_box(Rgba::rgb(0xFF, 0x6B, 0x9D));
        let filter = &drawtext_filters(&overlay, &geometry(), Some(Path::new("/fonts/a.ttf")))[0];

        assert!(filter.contains(":x=60:y=140"));
        assert!(filter.contains("boxcolor=0xFF6B9D@1.00"));
        assert!(filter.contains("fontfile='/fonts/a.ttf'"));
    }

    #[test]
    fn test_graph_concatenates_all_segments() {
        let mut timeline = Timeline::new(geometry());
        let mut opening = TimelineSegment::color_card(SegmentKind::Opening, 6.0, Rgba::BLACK);
        opening.fade_in_secs = 0.5;
        timeline.push(opening);
        timeline.push(TimelineSegment {
            kind: SegmentKind::Choice(1),
            duration_secs: 8.0,
            visual: VisualSource::Clip {
                clip: ClipReference::new("/tmp/choice_1.mp4", 1),
                fit: ClipFit::Loop { plays: 2 },
            },
            overlays: Vec::new(),
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            degraded: false,
        });
        let mut ending = TimelineSegment::color_card(SegmentKind::Ending, 5.0, Rgba::BLACK);
        ending.fade_out_secs = 0.5;
        timeline.push(ending);

        let graph = timeline_graph(&timeline, None);

        assert!(graph.starts_with("[0:v]setsar=1"));
        assert!(graph.contains("[1:v]scale=-2:1920,crop=min(iw\\,1080):1920"));
        assert!(graph.contains("fade=t=in:st=0:d=0.500"));
        assert!(graph.contains("fade=t=out:st=4.500:d=0.500[v2]"));
        assert!(graph.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[outv]"));
    }

    #[test]
    fn test_color_source() {
        let card = TimelineSegment::color_card(SegmentKind::Ending, 5.0, Rgba::rgb(1, 2, 3));
        assert_eq!(
            color_source(&card, &geometry()).unwrap(),
            "color=c=0x010203:s=1080x1920:r=30"
        );
    }
}
