//! Props handed to the Remotion `QuizWithVideos` composition.

use serde::{Deserialize, Serialize};

/// One choice as the composition expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderChoice {
    pub number: u32,
    pub text: String,
    #[serde(rename = "textEn", skip_serializing_if = "Option::is_none")]
    pub text_translated: Option<String>,
    /// Path relative to the Remotion `public/` directory. Absent when the
    /// slot has no clip on disk and renders as a plain card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
}

/// Structured render input: question, choices with visuals, closing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    pub question: String,
    #[serde(rename = "questionEn", skip_serializing_if = "Option::is_none")]
    pub question_translated: Option<String>,
    pub choices: Vec<RenderChoice>,
    pub end_message: String,
    #[serde(rename = "endMessageEn", skip_serializing_if = "Option::is_none")]
    pub end_message_translated: Option<String>,
}

impl RenderPayload {
    /// Wrap as `--props` JSON (`{"data": ...}`).
    pub fn to_props_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&serde_json::json!({ "data": self }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_use_composition_field_names() {
        let payload = RenderPayload {
            question: "一週間過ごすなら？".into(),
            question_translated: Some("Where would you spend a week?".into()),
            choices: vec![RenderChoice {
                number: 1,
                text: "溶岩の中".into(),
                text_translated: Some("In the Lava".into()),
                video_path: Some("videos/choice_1.mp4".into()),
            }],
            end_message: "感想はコメント欄へ！".into(),
            end_message_translated: None,
        };

        let json: serde_json::Value = serde_json::from_str(&payload.to_props_json().unwrap()).unwrap();
        let data = &json["data"];
        assert_eq!(data["questionEn"], "Where would you spend a week?");
        assert_eq!(data["choices"][0]["textEn"], "In the Lava");
        assert_eq!(data["choices"][0]["videoPath"], "videos/choice_1.mp4");
        assert_eq!(data["endMessage"], "感想はコメント欄へ！");
        assert!(data.get("endMessageEn").is_none());
    }

    #[test]
    fn test_choice_without_clip_omits_video_path() {
        let choice = RenderChoice {
            number: 2,
            text: "深海".into(),
            text_translated: None,
            video_path: None,
        };

        let json = serde_json::to_value(&choice).unwrap();
        assert!(json.get("videoPath").is_none());
        let back: RenderChoice = serde_json::from_value(json).unwrap();
        assert_eq!(back, choice);
    }
}
