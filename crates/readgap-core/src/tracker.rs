//! The per-attempt phase state machine.
//!
//! An attempt moves `english` → `l1` → `completed`. Transitions happen only
//! inside [`AttemptTracker::record`], after each answered question.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AssessmentError;
use crate::model::{Question, QuestionResult};

/// Stage of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "english")]
    English,
    #[serde(rename = "l1")]
    HomeLanguage,
    #[serde(rename = "completed")]
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::English => write!(f, "english"),
            Phase::HomeLanguage => write!(f, "l1"),
            Phase::Completed => write!(f, "completed"),
        }
    }
}

/// Block sizes of the two language tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseLimits {
    pub english: usize,
    pub home_language: usize,
}

impl Default for PhaseLimits {
    fn default() -> Self {
        Self {
            english: 15,
            home_language: 3,
        }
    }
}

/// What the caller should do after a response is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// Stay in the current track and pick the next question adaptively.
    Adapt,
    /// The English block is done; begin the home-language track.
    StartHomeLanguage(String),
    /// The attempt is finished and should be scored.
    Complete,
}

/// Counts responses per track and decides phase transitions.
#[derive(Debug, Clone)]
pub struct AttemptTracker {
    attempt_id: Uuid,
    home_language: Option<String>,
    limits: PhaseLimits,
    phase: Phase,
    english: Vec<QuestionResult>,
    home: Vec<QuestionResult>,
    used_english: HashSet<String>,
    used_home: HashSet<String>,
}

impl AttemptTracker {
    pub fn new(attempt_id: Uuid, home_language: Option<String>, limits: PhaseLimits) -> Self {
        Self {
            attempt_id,
            home_language,
            limits,
            phase: Phase::English,
            english: Vec::new(),
            home: Vec::new(),
            used_english: HashSet::new(),
            used_home: HashSet::new(),
        }
    }

    /// Rebuild a tracker from an attempt's recorded history.
    pub fn replay<'a>(
        attempt_id: Uuid,
        home_language: Option<String>,
        limits: PhaseLimits,
        history: impl IntoIterator<Item = (&'a Question, bool)>,
    ) -> Result<Self, AssessmentError> {
        let mut tracker = Self::new(attempt_id, home_language, limits);
        for (question, correct) in history {
            tracker.record(question, correct)?;
        }
        Ok(tracker)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn home_language(&self) -> Option<&str> {
        self.home_language.as_deref()
    }

    pub fn limits(&self) -> PhaseLimits {
        self.limits
    }

    pub fn english_count(&self) -> usize {
        self.english.len()
    }

    pub fn home_count(&self) -> usize {
        self.home.len()
    }

    pub fn english_results(&self) -> &[QuestionResult] {
        &self.english
    }

    pub fn home_results(&self) -> &[QuestionResult] {
        &self.home
    }

    /// Question ids already answered in the track for `language`.
    pub fn used_ids(&self, language: &str) -> &HashSet<String> {
        if crate::model::is_english(language) {
            &self.used_english
        } else {
            &self.used_home
        }
    }

    /// Language of the questions the current phase accepts.
    pub fn expected_language(&self) -> Option<&str> {
        match self.phase {
            Phase::English => Some(crate::model::ENGLISH),
            Phase::HomeLanguage => self.home_language.as_deref(),
            Phase::Completed => None,
        }
    }

    /// Record one answered question and advance the phase if a block is full.
    pub fn record(&mut self, question: &Question, correct: bool) -> Result<NextStep, AssessmentError> {
        let result = QuestionResult {
            difficulty: question.difficulty,
            correct,
        };

        match self.phase {
            Phase::Completed => Err(AssessmentError::AttemptCompleted(self.attempt_id)),
            Phase::English => {
                self.check_language(question)?;
                self.english.push(result);
                self.used_english.insert(question.id.clone());
                if self.english.len() < self.limits.english {
                    return Ok(NextStep::Adapt);
                }
                match self.home_language.clone() {
                    Some(code) if self.limits.home_language > 0 => {
                        tracing::info!(attempt = %self.attempt_id, language = %code, "english block complete; starting home-language track");
                        self.phase = Phase::HomeLanguage;
                        Ok(NextStep::StartHomeLanguage(code))
                    }
                    _ => {
                        tracing::info!(attempt = %self.attempt_id, "english block complete; no home-language track");
                        self.phase = Phase::Completed;
                        Ok(NextStep::Complete)
                    }
                }
            }
            Phase::HomeLanguage => {
                self.check_language(question)?;
                self.home.push(result);
                self.used_home.insert(question.id.clone());
                if self.home.len() < self.limits.home_language {
                    return Ok(NextStep::Adapt);
                }
                self.phase = Phase::Completed;
                Ok(NextStep::Complete)
            }
        }
    }

    fn check_language(&self, question: &Question) -> Result<(), AssessmentError> {
        if self.expected_language() == Some(question.language.as_str()) {
            Ok(())
        } else {
            Err(AssessmentError::PhaseMismatch {
                question_id: question.id.clone(),
                language: question.language.clone(),
                phase: self.phase.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ENGLISH;

    fn q(id: &str, language: &str, difficulty: f64) -> Question {
        Question {
            id: id.into(),
            language: language.into(),
            text: String::new(),
            choices: vec!["a".into(), "b".into()],
            correct_idx: 0,
            difficulty,
            skill_tag: String::new(),
        }
    }

    fn answer_english(tracker: &mut AttemptTracker, n: usize) -> Vec<NextStep> {
        (0..n)
            .map(|i| {
                tracker
                    .record(&q(&format!("en-{i}"), ENGLISH, 2.5), i % 2 == 0)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn english_block_then_home_language() {
        let mut tracker =
            AttemptTracker::new(Uuid::nil(), Some("spanish".into()), PhaseLimits::default());
        let steps = answer_english(&mut tracker, 15);

        assert!(steps[..14].iter().all(|s| *s == NextStep::Adapt));
        assert_eq!(steps[14], NextStep::StartHomeLanguage("spanish".into()));
        assert_eq!(tracker.phase(), Phase::HomeLanguage);
        assert_eq!(tracker.english_count(), 15);
        assert_eq!(tracker.home_count(), 0);
    }

    #[test]
    fn no_home_language_completes_after_english() {
        let mut tracker = AttemptTracker::new(Uuid::nil(), None, PhaseLimits::default());
        let steps = answer_english(&mut tracker, 15);
        assert_eq!(steps[14], NextStep::Complete);
        assert_eq!(tracker.phase(), Phase::Completed);
        assert!(tracker.home_results().is_empty());
    }

    #[test]
    fn home_language_block_completes() {
        let mut tracker =
            AttemptTracker::new(Uuid::nil(), Some("polish".into()), PhaseLimits::default());
        answer_english(&mut tracker, 15);

        assert_eq!(
            tracker.record(&q("pl-1", "polish", 2.5), true).unwrap(),
            NextStep::Adapt
        );
        assert_eq!(
            tracker.record(&q("pl-2", "polish", 3.0), false).unwrap(),
            NextStep::Adapt
        );
        assert_eq!(
            tracker.record(&q("pl-3", "polish", 2.5), true).unwrap(),
            NextStep::Complete
        );
        assert_eq!(tracker.phase(), Phase::Completed);
        assert_eq!(tracker.home_count(), 3);
        assert_eq!(tracker.used_ids("polish").len(), 3);
    }

    #[test]
    fn completed_is_terminal() {
        let mut tracker = AttemptTracker::new(Uuid::nil(), None, PhaseLimits::default());
        answer_english(&mut tracker, 15);
        let err = tracker.record(&q("en-x", ENGLISH, 3.0), true).unwrap_err();
        assert!(matches!(err, AssessmentError::AttemptCompleted(_)));
        assert_eq!(tracker.english_count(), 15);
    }

    #[test]
    fn wrong_language_for_phase_is_rejected() {
        let mut tracker =
            AttemptTracker::new(Uuid::nil(), Some("spanish".into()), PhaseLimits::default());
        let err = tracker.record(&q("es-1", "spanish", 2.5), true).unwrap_err();
        assert!(matches!(err, AssessmentError::PhaseMismatch { .. }));

        answer_english(&mut tracker, 15);
        let err = tracker.record(&q("en-99", ENGLISH, 2.5), true).unwrap_err();
        assert!(err.to_string().contains("l1 phase"));
        let err = tracker.record(&q("fr-1", "french", 2.5), true).unwrap_err();
        assert!(matches!(err, AssessmentError::PhaseMismatch { .. }));
    }

    #[test]
    fn used_ids_are_tracked_per_track() {
        let mut tracker =
            AttemptTracker::new(Uuid::nil(), Some("urdu".into()), PhaseLimits::default());
        tracker.record(&q("en-a", ENGLISH, 2.5), true).unwrap();
        tracker.record(&q("en-b", ENGLISH, 3.0), true).unwrap();
        assert_eq!(tracker.used_ids(ENGLISH).len(), 2);
        assert!(tracker.used_ids("urdu").is_empty());
    }

    #[test]
    fn replay_rebuilds_state() {
        let questions: Vec<Question> = (0..15)
            .map(|i| q(&format!("en-{i}"), ENGLISH, 1.0 + (i % 5) as f64))
            .chain([q("es-1", "spanish", 2.5)])
            .collect();
        let history = questions.iter().map(|q| (q, true));
        let tracker = AttemptTracker::replay(
            Uuid::nil(),
            Some("spanish".into()),
            PhaseLimits::default(),
            history,
        )
        .unwrap();
        assert_eq!(tracker.phase(), Phase::HomeLanguage);
        assert_eq!(tracker.english_count(), 15);
        assert_eq!(tracker.home_count(), 1);
    }

    #[test]
    fn custom_limits() {
        let limits = PhaseLimits {
            english: 2,
            home_language: 1,
        };
        let mut tracker = AttemptTracker::new(Uuid::nil(), Some("somali".into()), limits);
        assert_eq!(answer_english(&mut tracker, 2)[1], NextStep::StartHomeLanguage("somali".into()));
        assert_eq!(
            tracker.record(&q("so-1", "somali", 2.5), true).unwrap(),
            NextStep::Complete
        );
    }

    #[test]
    fn phase_serializes_like_the_wire_format() {
        assert_eq!(serde_json::to_string(&Phase::HomeLanguage).unwrap(), "\"l1\"");
        assert_eq!(Phase::English.to_string(), "english");
    }
}
