//! Adaptive next-question selection.
//!
//! After each answer the target difficulty moves up or down by one step and
//! the selector picks, among questions not yet used in this attempt, one of
//! those closest to the target.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::Question;
use crate::traits::{QuestionStore, RandomSource};

/// Difficulties within this distance of each other are treated as tied.
const TIE_EPSILON: f64 = 1e-9;

/// How the target difficulty moves through an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyPolicy {
    /// Change applied after each answer.
    pub step: f64,
    pub min: f64,
    pub max: f64,
    /// Target for the first question of each language track.
    pub starting: f64,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        Self {
            step: 0.5,
            min: 1.0,
            max: 5.0,
            starting: 2.5,
        }
    }
}

impl DifficultyPolicy {
    /// Target for the question after one answered at `previous` difficulty.
    pub fn target(&self, previous: f64, was_correct: bool) -> f64 {
        let target = if was_correct {
            previous + self.step
        } else {
            previous - self.step
        };
        target.clamp(self.min, self.max)
    }
}

/// Target difficulty under the default policy (±0.5, clamped to 1–5).
pub fn target_difficulty(previous: f64, was_correct: bool) -> f64 {
    DifficultyPolicy::default().target(previous, was_correct)
}

/// All questions whose distance from `target` is minimal.
pub fn nearest_candidates(questions: &[Question], target: f64) -> Vec<&Question> {
    let best = questions
        .iter()
        .map(|q| (q.difficulty - target).abs())
        .fold(f64::INFINITY, f64::min);

    questions
        .iter()
        .filter(|q| (q.difficulty - target).abs() - best <= TIE_EPSILON)
        .collect()
}

/// Picks questions from a store by difficulty.
pub struct DifficultySelector {
    store: Arc<dyn QuestionStore>,
    random: Arc<dyn RandomSource>,
    policy: DifficultyPolicy,
}

impl DifficultySelector {
    pub fn new(
        store: Arc<dyn QuestionStore>,
        random: Arc<dyn RandomSource>,
        policy: DifficultyPolicy,
    ) -> Self {
        Self {
            store,
            random,
            policy,
        }
    }

    pub fn policy(&self) -> &DifficultyPolicy {
        &self.policy
    }

    /// Pick the question to ask after `previous`.
    ///
    /// Returns `None` only when no questions exist for the language.
    pub async fn select_next(
        &self,
        previous: &Question,
        was_correct: bool,
        used_ids: &HashSet<String>,
    ) -> Result<Option<Question>> {
        let target = self.policy.target(previous.difficulty, was_correct);
        self.select_at(&previous.language, target, used_ids).await
    }

    /// First question of a language track, at the starting difficulty.
    pub async fn starting_question(&self, language: &str) -> Result<Option<Question>> {
        self.select_at(language, self.policy.starting, &HashSet::new())
            .await
    }

    /// Pick a question in `language` nearest to `target`, avoiding `used_ids`.
    ///
    /// If every question in the language has been used, repeats are allowed.
    /// Questions without a finite difficulty are never chosen.
    pub async fn select_at(
        &self,
        language: &str,
        target: f64,
        used_ids: &HashSet<String>,
    ) -> Result<Option<Question>> {
        let questions: Vec<Question> = self
            .store
            .by_language(language)
            .await?
            .into_iter()
            .filter(|q| q.difficulty.is_finite())
            .collect();
        if questions.is_empty() {
            tracing::debug!(language, "no questions in catalog");
            return Ok(None);
        }

        let (unused, used): (Vec<Question>, Vec<Question>) = questions
            .into_iter()
            .partition(|q| !used_ids.contains(&q.id));
        let pool = if unused.is_empty() {
            tracing::debug!(language, "every question used; allowing repeats");
            used
        } else {
            unused
        };

        let nearest = nearest_candidates(&pool, target);
        if nearest.is_empty() {
            return Ok(None);
        }
        let chosen = nearest[self.random.pick(nearest.len())].clone();
        tracing::debug!(
            language,
            target,
            tied = nearest.len(),
            question = %chosen.id,
            difficulty = chosen.difficulty,
            "selected question"
        );
        Ok(Some(chosen))
    }
}
