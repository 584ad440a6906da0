//! FFmpeg `-progress` output parsing.

use serde::Serialize;

/// Progress snapshot reported by FFmpeg.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FfmpegProgress {
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (1.5 = 1.5x realtime)
    pub speed: f64,
    pub is_complete: bool,
}

/// Keys FFmpeg writes to `-progress` output.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "stream_0_0_q",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

impl FfmpegProgress {
    /// Fold one line into the current snapshot.
    ///
    /// Returns a complete snapshot at each `progress=` marker.
    pub fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                self.is_complete = value == "end";
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Share of `total_secs` already written, in `0.0..=1.0`.
    pub fn fraction_of(&self, total_secs: f64) -> f64 {
        if total_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / 1000.0 / total_secs).clamp(0.0, 1.0)
    }
}

/// Whether a stderr line belongs to `-progress` output rather than diagnostics.
pub fn is_progress_line(line: &str) -> bool {
    line.split_once('=')
        .map(|(key, _)| PROGRESS_KEYS.contains(&key.trim()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_lines() {
        let mut progress = FfmpegProgress::default();
        assert!(progress.apply_line("frame=120").is_none());
        assert!(progress.apply_line("out_time_us=4000000").is_none());
        assert!(progress.apply_line("speed=2.5x").is_none());

        let snapshot = progress.apply_line("progress=continue").unwrap();
        assert_eq!(snapshot.frame, 120);
        assert_eq!(snapshot.out_time_ms, 4000);
        assert!((snapshot.speed - 2.5).abs() < 1e-9);
        assert!(!snapshot.is_complete);

        assert!(progress.apply_line("progress=end").unwrap().is_complete);
    }

    #[test]
    fn test_speed_not_available() {
        let mut progress = FfmpegProgress::default();
        progress.apply_line("speed=N/A");
        assert_eq!(progress.speed, 0.0);
    }

    #[test]
    fn test_fraction_of() {
        let progress = FfmpegProgress {
            out_time_ms: 22_500,
            ..Default::default()
        };
        assert!((progress.fraction_of(45.0) - 0.5).abs() < 1e-9);
        assert_eq!(progress.fraction_of(0.0), 0.0);
        assert_eq!(progress.fraction_of(10.0), 1.0);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("out_time_us=1000"));
        assert!(is_progress_line("progress=end"));
        assert!(!is_progress_line("[Parsed_drawtext_3] Cannot find a valid font"));
        assert!(!is_progress_line("Error opening filters!"));
    }
}
