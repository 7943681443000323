//! Assessment engine.
//!
//! Coordinates the stores, the difficulty selector, the attempt tracker and
//! the scorer. Every public call is one sequential unit of work: read the
//! attempt's state, decide the next step, then persist.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::recommend;
use crate::error::AssessmentError;
use crate::model::{
    is_english, Attempt, AttemptOutcome, Question, Resource, Response, Student, ENGLISH,
};
use crate::scoring::Scorer;
use crate::selector::{DifficultyPolicy, DifficultySelector};
use crate::tracker::{AttemptTracker, NextStep, Phase, PhaseLimits};
use crate::traits::{AttemptStore, QuestionStore, RandomSource};

/// Tunable assessment parameters (the `[assessment]` config section).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSettings {
    #[serde(default = "default_english_questions")]
    pub english_questions: usize,
    #[serde(default = "default_home_language_questions")]
    pub home_language_questions: usize,
    #[serde(default = "default_difficulty_step")]
    pub difficulty_step: f64,
    #[serde(default = "default_min_difficulty")]
    pub min_difficulty: f64,
    #[serde(default = "default_max_difficulty")]
    pub max_difficulty: f64,
    #[serde(default = "default_starting_difficulty")]
    pub starting_difficulty: f64,
}

fn default_english_questions() -> usize {
    PhaseLimits::default().english
}
fn default_home_language_questions() -> usize {
    PhaseLimits::default().home_language
}
fn default_difficulty_step() -> f64 {
    DifficultyPolicy::default().step
}
fn default_min_difficulty() -> f64 {
    DifficultyPolicy::default().min
}
fn default_max_difficulty() -> f64 {
    DifficultyPolicy::default().max
}
fn default_starting_difficulty() -> f64 {
    DifficultyPolicy::default().starting
}

impl Default for AssessmentSettings {
    fn default() -> Self {
        Self {
            english_questions: default_english_questions(),
            home_language_questions: default_home_language_questions(),
            difficulty_step: default_difficulty_step(),
            min_difficulty: default_min_difficulty(),
            max_difficulty: default_max_difficulty(),
            starting_difficulty: default_starting_difficulty(),
        }
    }
}

impl AssessmentSettings {
    pub fn limits(&self) -> PhaseLimits {
        PhaseLimits {
            english: self.english_questions,
            home_language: self.home_language_questions,
        }
    }

    /// Reject settings the selector cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let (min, max, start, step) = (
            self.min_difficulty,
            self.max_difficulty,
            self.starting_difficulty,
            self.difficulty_step,
        );
        anyhow::ensure!(
            [min, max, start, step].iter().all(|v| v.is_finite()),
            "difficulty settings must be finite numbers"
        );
        anyhow::ensure!(
            min <= max,
            "min_difficulty ({min}) is greater than max_difficulty ({max})"
        );
        anyhow::ensure!(
            (min..=max).contains(&start),
            "starting_difficulty ({start}) is outside {min}-{max}"
        );
        anyhow::ensure!(step > 0.0, "difficulty_step must be positive, got {step}");
        anyhow::ensure!(
            self.english_questions > 0,
            "english_questions must be at least 1"
        );
        Ok(())
    }

    pub fn policy(&self) -> DifficultyPolicy {
        DifficultyPolicy {
            step: self.difficulty_step,
            min: self.min_difficulty,
            max: self.max_difficulty,
            starting: self.starting_difficulty,
        }
    }
}

/// A freshly started attempt and its first question.
#[derive(Debug, Clone)]
pub struct StartedAttempt {
    pub attempt: Attempt,
    pub question: Question,
}

/// One answer from a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub attempt_id: Uuid,
    pub question_id: String,
    pub selected_idx: usize,
    pub time_ms: u64,
}

/// Final result of a completed attempt.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub attempt: Attempt,
    pub outcome: AttemptOutcome,
    /// Reading resources for the student's home language and band.
    pub resources: Vec<Resource>,
}

/// What happened after an answer was recorded.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    /// Phase after the answer.
    pub phase: Phase,
    /// Whether the submitted answer was correct.
    pub correct: bool,
    pub next_question: Option<Question>,
    /// Difficulty the next question was chosen for.
    pub target_difficulty: Option<f64>,
    /// Present once the attempt is completed.
    pub result: Option<AttemptResult>,
}

/// Where an in-progress attempt stands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptProgress {
    pub phase: Phase,
    /// All answers are recorded but no outcome is stored yet; the next
    /// `submit_answer` call scores the attempt.
    pub awaiting_score: bool,
    pub english_answered: usize,
    pub home_answered: usize,
    pub limits: PhaseLimits,
}

/// Runs assessments against shared question and attempt stores.
pub struct AssessmentEngine {
    questions: Arc<dyn QuestionStore>,
    attempts: Arc<dyn AttemptStore>,
    selector: DifficultySelector,
    scorer: Scorer,
    settings: AssessmentSettings,
    resources: Vec<Resource>,
}

impl AssessmentEngine {
    pub fn new(
        questions: Arc<dyn QuestionStore>,
        attempts: Arc<dyn AttemptStore>,
        random: Arc<dyn RandomSource>,
        scorer: Scorer,
        settings: AssessmentSettings,
    ) -> Self {
        let selector = DifficultySelector::new(Arc::clone(&questions), random, settings.policy());
        Self {
            questions,
            attempts,
            selector,
            scorer,
            settings,
            resources: Vec::new(),
        }
    }

    /// Attach the resources recommended on completion.
    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn settings(&self) -> &AssessmentSettings {
        &self.settings
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Store a new student. English is rejected as a home language.
    pub async fn register_student(
        &self,
        name: &str,
        year_group: &str,
        home_language: Option<&str>,
    ) -> Result<Student, AssessmentError> {
        let student = Student::new(name, year_group, home_language);
        if let Some(language) = student.home_language.as_deref().filter(|l| is_english(l)) {
            return Err(AssessmentError::EnglishHomeLanguage(language.to_string()));
        }
        self.attempts
            .insert_student(student.clone())
            .await
            .map_err(AssessmentError::Store)?;
        tracing::debug!(student = %student.id, home_language = ?student.home_language, "registered student");
        Ok(student)
    }

    /// Open a new attempt and pick the first English question.
    pub async fn start_attempt(
        &self,
        student_id: Uuid,
        session_code: &str,
    ) -> Result<StartedAttempt, AssessmentError> {
        self.attempts
            .student(student_id)
            .await
            .map_err(AssessmentError::Store)?
            .ok_or(AssessmentError::StudentNotFound(student_id))?;

        let question = self
            .selector
            .starting_question(ENGLISH)
            .await
            .map_err(AssessmentError::Store)?
            .ok_or_else(|| AssessmentError::CatalogEmpty(ENGLISH.to_string()))?;

        let attempt = Attempt::new(student_id, session_code);
        self.attempts
            .insert_attempt(attempt.clone())
            .await
            .map_err(AssessmentError::Store)?;

        tracing::info!(attempt = %attempt.id, student = %student_id, session = session_code, "attempt started");
        Ok(StartedAttempt { attempt, question })
    }

    /// Record one answer and decide what comes next.
    ///
    /// Nothing is persisted unless the next step could be decided. If every
    /// answer is already recorded but the outcome is missing, the submitted
    /// answer is ignored and the attempt is scored.
    pub async fn submit_answer(
        &self,
        submission: AnswerSubmission,
    ) -> Result<AnswerOutcome, AssessmentError> {
        let attempt = self.load_attempt(submission.attempt_id).await?;
        if attempt.is_completed() {
            return Err(AssessmentError::AttemptCompleted(attempt.id));
        }

        let student = self.load_student(attempt.student_id).await?;
        let mut tracker = self.rebuild_tracker(&attempt, &student).await?;

        // Every response is in but the outcome was never stored: score now.
        if tracker.phase() == Phase::Completed {
            tracing::info!(attempt = %attempt.id, "finishing attempt left without an outcome");
            let correct = tracker
                .home_results()
                .last()
                .or_else(|| tracker.english_results().last())
                .is_some_and(|r| r.correct);
            let result = self.finalize(attempt.id, &student, &tracker).await?;
            return Ok(AnswerOutcome {
                phase: Phase::Completed,
                correct,
                next_question: None,
                target_difficulty: None,
                result: Some(result),
            });
        }

        let question = self
            .questions
            .question(&submission.question_id)
            .await
            .map_err(AssessmentError::Store)?
            .ok_or_else(|| AssessmentError::QuestionNotFound(submission.question_id.clone()))?;

        if submission.selected_idx >= question.choices.len() {
            return Err(AssessmentError::InvalidChoice {
                question_id: question.id.clone(),
                selected: submission.selected_idx,
                choices: question.choices.len(),
            });
        }

        let correct = question.is_correct(submission.selected_idx);
        let step = tracker.record(&question, correct)?;

        let (next_question, target_difficulty) = match &step {
            NextStep::Adapt => {
                let target = self.selector.policy().target(question.difficulty, correct);
                let next = self
                    .selector
                    .select_at(&question.language, target, tracker.used_ids(&question.language))
                    .await
                    .map_err(AssessmentError::Store)?
                    .ok_or_else(|| AssessmentError::CatalogEmpty(question.language.clone()))?;
                (Some(next), Some(target))
            }
            NextStep::StartHomeLanguage(code) => {
                let next = self
                    .selector
                    .starting_question(code)
                    .await
                    .map_err(AssessmentError::Store)?
                    .ok_or_else(|| AssessmentError::CatalogEmpty(code.clone()))?;
                (Some(next), Some(self.selector.policy().starting))
            }
            NextStep::Complete => (None, None),
        };

        let response = Response {
            question_id: question.id.clone(),
            selected_idx: submission.selected_idx,
            is_correct: correct,
            time_ms: submission.time_ms,
            answered_at: Utc::now(),
        };
        self.attempts
            .append_response(attempt.id, response)
            .await
            .map_err(AssessmentError::Store)?;

        let result = match step {
            NextStep::Complete => Some(self.finalize(attempt.id, &student, &tracker).await?),
            _ => None,
        };

        Ok(AnswerOutcome {
            phase: tracker.phase(),
            correct,
            next_question,
            target_difficulty,
            result,
        })
    }

    /// Current phase and counts for an attempt.
    pub async fn progress(&self, attempt_id: Uuid) -> Result<AttemptProgress, AssessmentError> {
        let attempt = self.load_attempt(attempt_id).await?;
        let student = self.load_student(attempt.student_id).await?;
        let tracker = self.rebuild_tracker(&attempt, &student).await?;
        Ok(AttemptProgress {
            phase: tracker.phase(),
            awaiting_score: tracker.phase() == Phase::Completed && !attempt.is_completed(),
            english_answered: tracker.english_count(),
            home_answered: tracker.home_count(),
            limits: tracker.limits(),
        })
    }

    async fn finalize(
        &self,
        attempt_id: Uuid,
        student: &Student,
        tracker: &AttemptTracker,
    ) -> Result<AttemptResult, AssessmentError> {
        let card = self
            .scorer
            .score(tracker.english_results(), tracker.home_results())
            .await;
        let outcome = card.into_outcome(Utc::now());
        let attempt = self
            .attempts
            .complete_attempt(attempt_id, outcome.clone())
            .await
            .map_err(AssessmentError::Store)?;

        tracing::info!(
            attempt = %attempt_id,
            english = outcome.english_score,
            l1 = outcome.l1_score,
            gap = outcome.gap,
            band = %outcome.band,
            "attempt completed"
        );

        let resources = recommend(&self.resources, student.home_language.as_deref(), outcome.band);
        Ok(AttemptResult {
            attempt,
            outcome,
            resources,
        })
    }

    async fn load_attempt(&self, id: Uuid) -> Result<Attempt, AssessmentError> {
        self.attempts
            .attempt(id)
            .await
            .map_err(AssessmentError::Store)?
            .ok_or(AssessmentError::AttemptNotFound(id))
    }

    async fn load_student(&self, id: Uuid) -> Result<Student, AssessmentError> {
        self.attempts
            .student(id)
            .await
            .map_err(AssessmentError::Store)?
            .ok_or(AssessmentError::StudentNotFound(id))
    }

    async fn rebuild_tracker(
        &self,
        attempt: &Attempt,
        student: &Student,
    ) -> Result<AttemptTracker, AssessmentError> {
        let responses = self
            .attempts
            .responses(attempt.id)
            .await
            .map_err(AssessmentError::Store)?;

        let mut history = Vec::with_capacity(responses.len());
        for response in &responses {
            let question = self
                .questions
                .question(&response.question_id)
                .await
                .map_err(AssessmentError::Store)?
                .ok_or_else(|| AssessmentError::QuestionNotFound(response.question_id.clone()))?;
            history.push((question, response.is_correct));
        }

        AttemptTracker::replay(
            attempt.id,
            student.home_language.clone(),
            self.settings.limits(),
            history.iter().map(|(q, correct)| (q, *correct)),
        )
    }
}
