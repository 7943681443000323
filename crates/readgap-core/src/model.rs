//! Core data model types for readgap.
//!
//! Questions, students, attempts, and the responses recorded against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Language tag of the English track. Every other tag is a home-language code.
pub const ENGLISH: &str = "en";

/// Language tag for resources that apply to every home language.
pub const GENERAL: &str = "general";

/// Returns `true` if `language` is the English track.
pub fn is_english(language: &str) -> bool {
    language == ENGLISH
}

/// A single multiple-choice question from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the catalog.
    pub id: String,
    /// Language tag ("en" or a home-language code such as "spanish").
    pub language: String,
    /// Prompt shown to the student.
    pub text: String,
    /// Answer choices, in display order.
    pub choices: Vec<String>,
    /// Index into `choices` of the correct answer.
    pub correct_idx: usize,
    /// Hardness rating, typically 1–5.
    pub difficulty: f64,
    /// Reading skill the question targets (e.g. "inference").
    #[serde(default)]
    pub skill_tag: String,
}

impl Question {
    /// Whether `selected_idx` is the correct choice.
    pub fn is_correct(&self, selected_idx: usize) -> bool {
        selected_idx == self.correct_idx
    }

    pub fn is_english(&self) -> bool {
        is_english(&self.language)
    }
}

/// A student taking the assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub year_group: String,
    /// Declared home-language code; `None` skips the home-language track.
    #[serde(default)]
    pub home_language: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn new(name: &str, year_group: &str, home_language: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            year_group: year_group.trim().to_string(),
            home_language: home_language
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty()),
            created_at: Utc::now(),
        }
    }
}

/// One answered question. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub question_id: String,
    pub selected_idx: usize,
    pub is_correct: bool,
    /// Time the student spent on the question.
    pub time_ms: u64,
    pub answered_at: DateTime<Utc>,
}

/// A (difficulty, correctness) pair fed to the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub difficulty: f64,
    pub correct: bool,
}

/// Qualitative classification of the gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Green,
    Amber,
    Red,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Green, Band::Amber, Band::Red];
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Green => write!(f, "green"),
            Band::Amber => write!(f, "amber"),
            Band::Red => write!(f, "red"),
        }
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "green" => Ok(Band::Green),
            "amber" | "yellow" => Ok(Band::Amber),
            "red" => Ok(Band::Red),
            other => Err(format!("unknown band: {other}")),
        }
    }
}

/// Where the summary text of a completed attempt came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum SummarySource {
    /// A generative service, by name.
    Service(String),
    /// The deterministic fallback.
    Fallback,
}

/// Scores attached to an attempt when it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub completed_at: DateTime<Utc>,
    /// Difficulty-weighted English accuracy, 0–100.
    pub english_score: f64,
    /// Difficulty-weighted home-language accuracy, 0–100 (0 when not assessed).
    pub l1_score: f64,
    /// `l1_score - english_score`.
    pub gap: f64,
    pub band: Band,
    pub summary: String,
    pub summary_source: SummarySource,
}

/// One assessment session for one student.
///
/// In progress while `outcome` is `None`; the outcome is attached exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub session_code: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub outcome: Option<AttemptOutcome>,
}

impl Attempt {
    pub fn new(student_id: Uuid, session_code: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            session_code: session_code.to_string(),
            started_at: Utc::now(),
            outcome: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome.is_some()
    }
}

/// A reading resource recommended for a language and band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Home-language code, or "general" for every language.
    pub language: String,
    pub band: Band,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct_idx: usize) -> Question {
        Question {
            id: "en-1".into(),
            language: ENGLISH.into(),
            text: "Cat sat on the ___".into(),
            choices: vec!["mat".into(), "map".into(), "mop".into()],
            correct_idx,
            difficulty: 1.0,
            skill_tag: "decoding".into(),
        }
    }

    #[test]
    fn band_display_and_parse() {
        assert_eq!(Band::Green.to_string(), "green");
        assert_eq!(Band::Amber.to_string(), "amber");
        assert_eq!("RED".parse::<Band>().unwrap(), Band::Red);
        assert_eq!("yellow".parse::<Band>().unwrap(), Band::Amber);
        assert!("blue".parse::<Band>().is_err());
    }

    #[test]
    fn band_serializes_lowercase() {
        let json = serde_json::to_string(&Band::Amber).unwrap();
        assert_eq!(json, "\"amber\"");
    }

    #[test]
    fn question_correctness() {
        let q = question(0);
        assert!(q.is_correct(0));
        assert!(!q.is_correct(2));
        assert!(q.is_english());
    }

    #[test]
    fn student_normalizes_home_language() {
        let s = Student::new(" Ana ", "Year 7", Some(" Spanish "));
        assert_eq!(s.name, "Ana");
        assert_eq!(s.home_language.as_deref(), Some("spanish"));

        let s = Student::new("Ben", "Year 8", Some("  "));
        assert!(s.home_language.is_none());
    }

    #[test]
    fn new_attempt_is_in_progress() {
        let attempt = Attempt::new(Uuid::new_v4(), "123456");
        assert!(!attempt.is_completed());
        assert_eq!(attempt.session_code, "123456");
    }

    #[test]
    fn summary_source_serde() {
        let json = serde_json::to_string(&SummarySource::Service("openai".into())).unwrap();
        assert_eq!(json, r#"{"kind":"service","name":"openai"}"#);
        let back: SummarySource = serde_json::from_str(r#"{"kind":"fallback"}"#).unwrap();
        assert_eq!(back, SummarySource::Fallback);
    }
}
