//! Generation job and batch definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// One clip generation request for a single quiz slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Slot (1..N) this clip belongs to
    pub slot_index: u32,
    /// Prompt sent to the video model
    pub prompt: String,
    /// Requested clip length in seconds
    pub target_duration_secs: u32,
}

impl GenerationRequest {
    pub fn new(slot_index: u32, prompt: impl Into<String>, target_duration_secs: u32) -> Self {
        Self {
            slot_index,
            prompt: prompt.into(),
            target_duration_secs,
        }
    }
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Not yet accepted by the remote service
    #[default]
    Pending,
    /// Accepted, waiting for the render to finish
    Polling,
    /// Clip downloaded
    Completed,
    /// Remote render or download failed
    Failed,
    /// Attempt exceeded the generation timeout
    TimedOut,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Polling => "polling",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable tracking record for one request, owned by a single worker.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub request: GenerationRequest,
    pub remote_job_id: Option<String>,
    pub state: JobState,
    /// Current attempt, starting at 1
    pub attempt: u32,
    pub result_clip_url: Option<String>,
}

impl GenerationJob {
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            request,
            remote_job_id: None,
            state: JobState::Pending,
            attempt: 0,
            result_clip_url: None,
        }
    }

    /// Reset per-attempt fields and bump the attempt counter.
    pub fn begin_attempt(&mut self) {
        self.attempt += 1;
        self.remote_job_id = None;
        self.result_clip_url = None;
        self.state = JobState::Pending;
    }

    pub fn slot(&self) -> u32 {
        self.request.slot_index
    }
}

/// A locally available media file bound to one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipReference {
    pub source_path: PathBuf,
    pub slot_index: u32,
}

impl ClipReference {
    pub fn new(source_path: impl AsRef<Path>, slot_index: u32) -> Self {
        Self {
            source_path: source_path.as_ref().to_path_buf(),
            slot_index,
        }
    }

    pub fn exists(&self) -> bool {
        self.source_path.is_file()
    }

    /// File extension, defaulting to `mp4`.
    pub fn extension(&self) -> &str {
        self.source_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
    }
}

/// Terminal result of one slot in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOutcome {
    /// `None` means generation failed for this slot
    pub clip: Option<ClipReference>,
    /// Attempts consumed (0 if the worker never ran)
    pub attempts: u32,
    pub final_state: JobState,
}

impl SlotOutcome {
    pub fn absent() -> Self {
        Self {
            clip: None,
            attempts: 0,
            final_state: JobState::Pending,
        }
    }
}

/// Per-slot results of one generation batch.
///
/// Keys are exactly the slots of the submitted batch. A slot without a clip
/// is the failure signal; entries are never dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    outcomes: BTreeMap<u32, SlotOutcome>,
}

impl BatchResult {
    /// Create a result with every slot marked absent.
    pub fn seeded(slots: impl IntoIterator<Item = u32>) -> Self {
        Self {
            outcomes: slots
                .into_iter()
                .map(|slot| (slot, SlotOutcome::absent()))
                .collect(),
        }
    }

    /// Record the outcome for a slot. Slots outside the batch are ignored.
    pub fn record(&mut self, slot: u32, outcome: SlotOutcome) -> bool {
        match self.outcomes.get_mut(&slot) {
            Some(entry) => {
                *entry = outcome;
                true
            }
            None => false,
        }
    }

    pub fn clip(&self, slot: u32) -> Option<&ClipReference> {
        self.outcomes.get(&slot).and_then(|o| o.clip.as_ref())
    }

    pub fn outcome(&self, slot: u32) -> Option<&SlotOutcome> {
        self.outcomes.get(&slot)
    }

    pub fn contains_slot(&self, slot: u32) -> bool {
        self.outcomes.contains_key(&slot)
    }

    /// Slots in ascending order.
    pub fn slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.outcomes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.clip.is_some()).count()
    }

    pub fn failed_slots(&self) -> Vec<u32> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.clip.is_none())
            .map(|(slot, _)| *slot)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_batch_has_every_slot_absent() {
        let batch = BatchResult::seeded(1..=4);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.success_count(), 0);
        assert_eq!(batch.failed_slots(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_record_ignores_unknown_slot() {
        let mut batch = BatchResult::seeded([1, 2]);
        let outcome = SlotOutcome {
            clip: Some(ClipReference::new("/tmp/choice_9.mp4", 9)),
            attempts: 1,
            final_state: JobState::Completed,
        };
        assert!(!batch.record(9, outcome));
        assert_eq!(batch.len(), 2);
        assert!(!batch.contains_slot(9));
    }

    #[test]
    fn test_record_and_lookup() {
        let mut batch = BatchResult::seeded([1, 2]);
        batch.record(
            2,
            SlotOutcome {
                clip: Some(ClipReference::new("/tmp/choice_2.mp4", 2)),
                attempts: 3,
                final_state: JobState::Completed,
            },
        );
        assert!(batch.clip(1).is_none());
        assert_eq!(batch.clip(2).unwrap().slot_index, 2);
        assert_eq!(batch.outcome(2).unwrap().attempts, 3);
        assert_eq!(batch.success_count(), 1);
    }

    #[test]
    fn test_job_attempts_reset_remote_state() {
        let mut job = GenerationJob::new(GenerationRequest::new(1, "ice room", 8));
        job.begin_attempt();
        job.remote_job_id = Some("gen-1".into());
        job.state = JobState::Polling;
        job.begin_attempt();
        assert_eq!(job.attempt, 2);
        assert!(job.remote_job_id.is_none());
        assert_eq!(job.state, JobState::Pending);
    }

    #[test]
    fn test_clip_extension_defaults_to_mp4() {
        assert_eq!(ClipReference::new("/tmp/clip", 1).extension(), "mp4");
        assert_eq!(ClipReference::new("/tmp/clip.mov", 1).extension(), "mov");
    }
}
