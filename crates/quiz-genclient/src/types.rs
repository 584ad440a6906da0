//! Video generation service request/response types.

use serde::{Deserialize, Serialize};

use crate::error::{GenResult, GenerationError};

/// Body of a create-generation call.
#[derive(Debug, Clone, Serialize)]
pub struct CreateGenerationBody<'a> {
    pub prompt: &'a str,
    pub aspect_ratio: &'a str,
    /// Requested length, e.g. `"8s"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
}

/// Generation resource as returned by create and status calls.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    pub id: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub assets: Option<GenerationAssets>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationAssets {
    pub video: Option<String>,
}

/// Remote job status, validated from the wire response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Still queued or rendering; carries the raw remote state
    Pending { state: String },
    Completed { clip_url: String },
    Failed { reason: String },
}

impl GenerationResponse {
    /// Extract the remote job id from a create response.
    pub fn into_job_id(self) -> GenResult<String> {
        match self.id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(GenerationError::invalid_response("create response has no id")),
        }
    }

    /// Map a status response onto [`JobStatus`].
    ///
    /// A `completed` state without a video asset is rejected as invalid.
    pub fn into_status(self) -> GenResult<JobStatus> {
        let state = self
            .state
            .ok_or_else(|| GenerationError::invalid_response("status response has no state"))?;

        match state.as_str() {
            "completed" => {
                let clip_url = self
                    .assets
                    .and_then(|a| a.video)
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| {
                        GenerationError::invalid_response("completed generation has no video asset")
                    })?;
                Ok(JobStatus::Completed { clip_url })
            }
            "failed" => Ok(JobStatus::Failed {
                reason: self
                    .failure_reason
                    .unwrap_or_else(|| "no reason given".to_string()),
            }),
            _ => Ok(JobStatus::Pending { state }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerationResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_completed_status() {
        let status = parse(r#"{"id":"g1","state":"completed","assets":{"video":"https://cdn/x.mp4"}}"#)
            .into_status()
            .unwrap();
        assert_eq!(
            status,
            JobStatus::Completed {
                clip_url: "https://cdn/x.mp4".into()
            }
        );
    }

    #[test]
    fn test_completed_without_asset_is_invalid() {
        let err = parse(r#"{"id":"g1","state":"completed","assets":{}}"#)
            .into_status()
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResponse(_)));
    }

    #[test]
    fn test_in_progress_states_are_pending() {
        for state in ["queued", "dreaming"] {
            let json = format!(r#"{{"id":"g1","state":"{}"}}"#, state);
            assert!(matches!(
                parse(&json).into_status().unwrap(),
                JobStatus::Pending { .. }
            ));
        }
    }

    #[test]
    fn test_failed_status_keeps_reason() {
        let status = parse(r#"{"id":"g1","state":"failed","failure_reason":"moderation"}"#)
            .into_status()
            .unwrap();
        assert_eq!(
            status,
            JobStatus::Failed {
                reason: "moderation".into()
            }
        );
    }

    #[test]
    fn test_missing_id() {
        assert!(parse(r#"{"state":"queued"}"#).into_job_id().is_err());
        assert_eq!(parse(r#"{"id":"abc"}"#).into_job_id().unwrap(), "abc");
    }
}
