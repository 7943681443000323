//! Difficulty-weighted scoring, gap banding, and summary retrieval.
//!
//! Numeric scores are always computed locally so that scoring the same
//! results twice gives the same numbers and band. A summary service only
//! contributes the descriptive text, and any failure there falls back to a
//! fixed sentence.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::model::{AttemptOutcome, Band, QuestionResult, SummarySource};
use crate::traits::{ServiceAssessment, SummaryRequest, SummaryService};

/// Summary used whenever no generated summary is available.
pub const FALLBACK_SUMMARY: &str =
    "Assessment completed. Detailed analysis temporarily unavailable.";

/// Gaps at or below this are green.
pub const AMBER_THRESHOLD: f64 = 0.5;
/// Gaps above this are red.
pub const RED_THRESHOLD: f64 = 1.5;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Difficulty-weighted accuracy on a 0–100 scale, rounded to a whole number.
///
/// score = sum(difficulty of correct answers) / sum(all difficulties) * 100
///
/// An empty result set (or one with no positive weight) scores 0.
pub fn weighted_accuracy(results: &[QuestionResult]) -> f64 {
    let total: f64 = results.iter().map(|r| r.difficulty).sum();
    if results.is_empty() || total <= 0.0 {
        return 0.0;
    }
    let correct: f64 = results
        .iter()
        .filter(|r| r.correct)
        .map(|r| r.difficulty)
        .sum();
    (correct / total * 100.0).round()
}

impl Band {
    /// Classify a signed gap (`l1_score - english_score`).
    pub fn from_gap(gap: f64) -> Band {
        if gap > RED_THRESHOLD {
            Band::Red
        } else if gap > AMBER_THRESHOLD {
            Band::Amber
        } else {
            Band::Green
        }
    }
}

/// The scorer's result for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub english_score: f64,
    pub l1_score: f64,
    pub gap: f64,
    pub band: Band,
    pub summary: String,
    pub summary_source: SummarySource,
}

impl ScoreCard {
    pub fn into_outcome(self, completed_at: DateTime<Utc>) -> AttemptOutcome {
        AttemptOutcome {
            completed_at,
            english_score: self.english_score,
            l1_score: self.l1_score,
            gap: self.gap,
            band: self.band,
            summary: self.summary,
            summary_source: self.summary_source,
        }
    }
}

/// Retry behaviour for summary service calls.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Retries on transient service errors.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub retry_delay: Duration,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Deterministic summary service used when no generative service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackSummary;

#[async_trait]
impl SummaryService for FallbackSummary {
    fn name(&self) -> &str {
        "fallback"
    }

    fn is_fallback(&self) -> bool {
        true
    }

    async fn assess(&self, request: &SummaryRequest) -> Result<ServiceAssessment> {
        Ok(ServiceAssessment {
            english_score: weighted_accuracy(&request.english),
            l1_score: weighted_accuracy(&request.l1),
            summary: FALLBACK_SUMMARY.to_string(),
        })
    }
}

/// Computes score cards, asking a summary service for the summary text.
pub struct Scorer {
    service: Arc<dyn SummaryService>,
    config: ScorerConfig,
}

impl Scorer {
    pub fn new(service: Arc<dyn SummaryService>, config: ScorerConfig) -> Self {
        Self { service, config }
    }

    /// A scorer that never leaves the process.
    pub fn deterministic() -> Self {
        Self::new(Arc::new(FallbackSummary), ScorerConfig::default())
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Score one attempt. Never fails: service problems only affect the summary.
    pub async fn score(&self, english: &[QuestionResult], l1: &[QuestionResult]) -> ScoreCard {
        let english_score = weighted_accuracy(english);
        let l1_score = weighted_accuracy(l1);
        let gap = l1_score - english_score;
        let band = Band::from_gap(gap);

        let request = SummaryRequest {
            english: english.to_vec(),
            l1: l1.to_vec(),
        };

        let (summary, summary_source) = match self.request_summary(&request).await {
            Ok(assessment) if self.service.is_fallback() => {
                (assessment.summary, SummarySource::Fallback)
            }
            Ok(assessment) => {
                if (assessment.english_score - english_score).abs() > 5.0
                    || (assessment.l1_score - l1_score).abs() > 5.0
                {
                    tracing::debug!(
                        service = self.service.name(),
                        english_score,
                        l1_score,
                        service_english = assessment.english_score,
                        service_l1 = assessment.l1_score,
                        "service scores differ from weighted accuracy; keeping local scores"
                    );
                }
                (
                    assessment.summary,
                    SummarySource::Service(self.service.name().to_string()),
                )
            }
            Err(e) => {
                tracing::warn!(
                    service = self.service.name(),
                    "summary unavailable, using fallback: {e:#}"
                );
                (FALLBACK_SUMMARY.to_string(), SummarySource::Fallback)
            }
        };

        ScoreCard {
            english_score,
            l1_score,
            gap,
            band,
            summary,
            summary_source,
        }
    }

    /// Call the service, retrying transient errors with exponential backoff.
    async fn request_summary(&self, request: &SummaryRequest) -> Result<ServiceAssessment> {
        let mut last_error = None;
        let mut retry_delay = self.config.retry_delay;

        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
            }
            match self.service.assess(request).await {
                Ok(assessment) => {
                    assessment.validate()?;
                    return Ok(assessment);
                }
                Err(e) => {
                    let classified = e.downcast_ref::<ServiceError>();
                    if classified.is_some_and(ServiceError::is_permanent) {
                        return Err(e);
                    }
                    if let Some(ms) = classified.and_then(ServiceError::retry_after_ms) {
                        retry_delay = Duration::from_millis(ms).min(MAX_RETRY_DELAY);
                    }
                    tracing::debug!(retry, "summary service call failed: {e:#}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("summary service gave no reply")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    fn r(difficulty: f64, correct: bool) -> QuestionResult {
        QuestionResult {
            difficulty,
            correct,
        }
    }

    /// Replies with a scripted sequence of results, then repeats the last one.
    struct ScriptedService {
        replies: Mutex<VecDeque<Result<ServiceAssessment, ServiceError>>>,
        calls: AtomicU32,
    }

    impl ScriptedService {
        fn new(replies: Vec<Result<ServiceAssessment, ServiceError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl SummaryService for ScriptedService {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn assess(&self, _request: &SummaryRequest) -> Result<ServiceAssessment> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                match replies.front().unwrap() {
                    Ok(a) => Ok(a.clone()),
                    Err(e) => Err(ServiceError::NetworkError(e.to_string())),
                }
            };
            reply.map_err(anyhow::Error::from)
        }
    }

    fn good_reply() -> ServiceAssessment {
        ServiceAssessment {
            english_score: 40.0,
            l1_score: 90.0,
            summary: "Confident home-language reader; English vocabulary needs support.".into(),
        }
    }

    #[test]
    fn weighted_accuracy_example() {
        let score = weighted_accuracy(&[r(2.0, true), r(4.0, false)]);
        assert_eq!(score, 33.0);
    }

    #[test]
    fn weighted_accuracy_edges() {
        assert_eq!(weighted_accuracy(&[]), 0.0);
        assert_eq!(weighted_accuracy(&[r(3.0, true), r(5.0, true)]), 100.0);
        assert_eq!(weighted_accuracy(&[r(3.0, false)]), 0.0);
        assert_eq!(weighted_accuracy(&[r(0.0, true)]), 0.0);
    }

    #[test]
    fn weighted_accuracy_favours_hard_questions() {
        let hard_right = weighted_accuracy(&[r(5.0, true), r(1.0, false)]);
        let easy_right = weighted_accuracy(&[r(5.0, false), r(1.0, true)]);
        assert_eq!(hard_right, 83.0);
        assert_eq!(easy_right, 17.0);
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(Band::from_gap(-40.0), Band::Green);
        assert_eq!(Band::from_gap(0.0), Band::Green);
        assert_eq!(Band::from_gap(0.5), Band::Green);
        assert_eq!(Band::from_gap(0.51), Band::Amber);
        assert_eq!(Band::from_gap(1.5), Band::Amber);
        assert_eq!(Band::from_gap(1.51), Band::Red);
        assert_eq!(Band::from_gap(30.0), Band::Red);
    }

    #[tokio::test]
    async fn deterministic_scorer_uses_fallback_summary() {
        let scorer = Scorer::deterministic();
        let card = scorer
            .score(&[r(2.0, true), r(4.0, false)], &[r(3.0, true)])
            .await;
        assert_eq!(card.english_score, 33.0);
        assert_eq!(card.l1_score, 100.0);
        assert_eq!(card.gap, 67.0);
        assert_eq!(card.band, Band::Red);
        assert_eq!(card.summary, FALLBACK_SUMMARY);
        assert_eq!(card.summary_source, SummarySource::Fallback);
    }

    #[tokio::test]
    async fn gap_polarity_is_home_minus_english() {
        let scorer = Scorer::deterministic();
        let card = scorer.score(&[r(3.0, true)], &[r(3.0, false)]).await;
        assert_eq!(card.gap, -100.0);
        assert_eq!(card.band, Band::Green);
    }

    #[tokio::test]
    async fn scoring_is_idempotent() {
        let service = Arc::new(ScriptedService::new(vec![Ok(good_reply())]));
        let scorer = Scorer::new(service, ScorerConfig::default());
        let english = [r(1.0, true), r(2.5, false), r(4.0, true)];
        let l1 = [r(2.5, true), r(3.0, true), r(2.0, false)];

        let first = scorer.score(&english, &l1).await;
        let second = scorer.score(&english, &l1).await;
        assert_eq!(first.english_score, second.english_score);
        assert_eq!(first.l1_score, second.l1_score);
        assert_eq!(first.band, second.band);
    }

    #[tokio::test]
    async fn service_summary_is_used_but_scores_stay_local() {
        let service = Arc::new(ScriptedService::new(vec![Ok(good_reply())]));
        let scorer = Scorer::new(service.clone(), ScorerConfig::default());
        let card = scorer.score(&[r(2.0, true), r(4.0, false)], &[]).await;

        assert_eq!(card.english_score, 33.0);
        assert_eq!(card.l1_score, 0.0);
        assert_eq!(card.summary, good_reply().summary);
        assert_eq!(card.summary_source, SummarySource::Service("scripted".into()));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let service = Arc::new(ScriptedService::new(vec![
            Err(ServiceError::Timeout(30)),
            Err(ServiceError::RateLimited {
                retry_after_ms: 2000,
            }),
            Ok(good_reply()),
        ]));
        let scorer = Scorer::new(
            service.clone(),
            ScorerConfig {
                max_retries: 3,
                retry_delay: Duration::from_millis(100),
            },
        );
        let card = scorer.score(&[r(3.0, true)], &[r(3.0, true)]).await;
        assert_eq!(service.calls(), 3);
        assert_eq!(card.summary_source, SummarySource::Service("scripted".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fall_back() {
        let service = Arc::new(ScriptedService::new(vec![Err(
            ServiceError::NetworkError("connection reset".into()),
        )]));
        let scorer = Scorer::new(
            service.clone(),
            ScorerConfig {
                max_retries: 2,
                retry_delay: Duration::from_millis(10),
            },
        );
        let card = scorer.score(&[r(2.0, true), r(4.0, false)], &[]).await;
        assert_eq!(service.calls(), 3);
        assert_eq!(card.english_score, 33.0);
        assert_eq!(card.summary, FALLBACK_SUMMARY);
        assert_eq!(card.summary_source, SummarySource::Fallback);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let service = Arc::new(ScriptedService::new(vec![
            Err(ServiceError::AuthenticationFailed("bad key".into())),
            Ok(good_reply()),
        ]));
        let scorer = Scorer::new(service.clone(), ScorerConfig::default());
        let card = scorer.score(&[r(3.0, true)], &[]).await;
        assert_eq!(service.calls(), 1);
        assert_eq!(card.summary_source, SummarySource::Fallback);
    }

    #[tokio::test]
    async fn non_conforming_reply_falls_back() {
        let service = Arc::new(ScriptedService::new(vec![Ok(ServiceAssessment {
            english_score: 250.0,
            l1_score: 10.0,
            summary: "nonsense".into(),
        })]));
        let scorer = Scorer::new(service.clone(), ScorerConfig::default());
        let card = scorer.score(&[r(3.0, false)], &[r(3.0, true)]).await;
        assert_eq!(service.calls(), 1);
        assert_eq!(card.summary, FALLBACK_SUMMARY);
        assert_eq!(card.band, Band::Red);
    }
}
