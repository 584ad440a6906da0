//! Quiz input and translation types.
//!
//! The quiz script arrives from the upstream text generator as JSON. It is
//! validated once here; everything downstream works with the typed form.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Number of choices in a standard quiz.
pub const DEFAULT_CHOICE_COUNT: usize = 4;

/// Default call to action shown on the ending card.
pub const DEFAULT_END_MESSAGE: &str = "あなたはどれを選んだ？\nコメント欄で教えて！";

/// English call to action used when the ending card is bilingual.
pub const DEFAULT_END_MESSAGE_EN: &str = "Which did you choose?\nTell us in the comments!";

/// One answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceScript {
    /// Slot number, 1-based
    pub number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Prompt for the video model
    pub video_prompt: String,
}

/// A complete quiz as produced by the text generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub question: String,
    /// Optional line of context shown under the question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub choices: Vec<ChoiceScript>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_message: Option<String>,
}

/// Structural problems in a quiz script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizValidationError {
    #[error("question text is empty")]
    EmptyQuestion,

    #[error("expected {expected} choices, got {actual}")]
    ChoiceCount { expected: usize, actual: usize },

    #[error("choice numbers must be exactly 1..={expected}, got {numbers:?}")]
    ChoiceNumbers { expected: usize, numbers: Vec<u32> },

    #[error("choice {0} has an empty title")]
    EmptyTitle(u32),

    #[error("choice {0} has an empty video prompt")]
    EmptyPrompt(u32),
}

impl QuizScript {
    /// Check field presence and choice count.
    pub fn validate(&self, expected_choices: usize) -> Result<(), QuizValidationError> {
        if self.question.trim().is_empty() {
            return Err(QuizValidationError::EmptyQuestion);
        }

        if self.choices.len() != expected_choices {
            return Err(QuizValidationError::ChoiceCount {
                expected: expected_choices,
                actual: self.choices.len(),
            });
        }

        let numbers: BTreeSet<u32> = self.choices.iter().map(|c| c.number).collect();
        let wanted: BTreeSet<u32> = (1..=expected_choices as u32).collect();
        if numbers != wanted {
            return Err(QuizValidationError::ChoiceNumbers {
                expected: expected_choices,
                numbers: self.choices.iter().map(|c| c.number).collect(),
            });
        }

        for choice in &self.choices {
            if choice.title.trim().is_empty() {
                return Err(QuizValidationError::EmptyTitle(choice.number));
            }
            if choice.video_prompt.trim().is_empty() {
                return Err(QuizValidationError::EmptyPrompt(choice.number));
            }
        }

        Ok(())
    }

    /// Choices sorted by slot number.
    pub fn choices_in_order(&self) -> Vec<&ChoiceScript> {
        let mut choices: Vec<&ChoiceScript> = self.choices.iter().collect();
        choices.sort_by_key(|c| c.number);
        choices
    }

    pub fn choice(&self, number: u32) -> Option<&ChoiceScript> {
        self.choices.iter().find(|c| c.number == number)
    }

    pub fn end_message_or_default(&self) -> &str {
        self.end_message.as_deref().unwrap_or(DEFAULT_END_MESSAGE)
    }

    /// Request for the translation collaborator.
    pub fn translation_request(&self) -> TranslationRequest {
        TranslationRequest {
            question: self.question.clone(),
            choices: self
                .choices_in_order()
                .into_iter()
                .map(|c| TranslationChoice {
                    number: c.number,
                    text: c.title.clone(),
                })
                .collect(),
        }
    }
}

/// Text sent for translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub question: String,
    pub choices: Vec<TranslationChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationChoice {
    pub number: u32,
    pub text: String,
}

/// Translated quiz text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub question: String,
    pub choices: BTreeMap<u32, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_message: Option<String>,
    /// True when this is the source text standing in for a failed translation
    #[serde(default)]
    pub is_fallback: bool,
}

impl Translation {
    /// Source-language text in every field.
    pub fn source_fallback(script: &QuizScript) -> Self {
        Self {
            question: script.question.clone(),
            choices: script
                .choices
                .iter()
                .map(|c| (c.number, c.title.clone()))
                .collect(),
            end_message: Some(script.end_message_or_default().to_string()),
            is_fallback: true,
        }
    }

    /// Fill fields the translator left empty or missing with source text.
    pub fn completed_from(mut self, script: &QuizScript) -> Self {
        if self.question.trim().is_empty() {
            self.question = script.question.clone();
        }
        for choice in &script.choices {
            let missing = self
                .choices
                .get(&choice.number)
                .map(|t| t.trim().is_empty())
                .unwrap_or(true);
            if missing {
                self.choices.insert(choice.number, choice.title.clone());
            }
        }
        self.choices.retain(|number, _| script.choice(*number).is_some());
        self
    }

    pub fn choice(&self, number: u32) -> Option<&str> {
        self.choices.get(&number).map(String::as_str)
    }
}
