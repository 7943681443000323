//! Core trait definitions for stores, summary services, and randomness.
//!
//! The stores and the summary service are fallible I/O; they are implemented
//! by `store::MemoryStore` and the `readgap-providers` crate respectively.

use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::model::{Attempt, AttemptOutcome, Question, QuestionResult, Response, Student};

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Read-only question catalog.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// All questions tagged with `language`. Empty if there are none.
    async fn by_language(&self, language: &str) -> Result<Vec<Question>>;

    /// A single question by id.
    async fn question(&self, id: &str) -> Result<Option<Question>>;
}

/// Persistence for students, attempts, and their responses.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn insert_student(&self, student: Student) -> Result<()>;

    async fn student(&self, id: Uuid) -> Result<Option<Student>>;

    async fn insert_attempt(&self, attempt: Attempt) -> Result<()>;

    async fn attempt(&self, id: Uuid) -> Result<Option<Attempt>>;

    /// Append a response. Responses are never modified or removed.
    async fn append_response(&self, attempt_id: Uuid, response: Response) -> Result<()>;

    /// Responses of an attempt in the order they were recorded.
    async fn responses(&self, attempt_id: Uuid) -> Result<Vec<Response>>;

    /// Attach the outcome to an attempt in a single update.
    ///
    /// Fails if the attempt is unknown or already completed.
    async fn complete_attempt(&self, attempt_id: Uuid, outcome: AttemptOutcome) -> Result<Attempt>;

    /// Every attempt in a session, paired with its student.
    async fn session_attempts(&self, session_code: &str) -> Result<Vec<(Student, Attempt)>>;
}

// ---------------------------------------------------------------------------
// Summary service
// ---------------------------------------------------------------------------

/// Results sent to a summary service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub english: Vec<QuestionResult>,
    pub l1: Vec<QuestionResult>,
}

/// What a summary service returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAssessment {
    pub english_score: f64,
    pub l1_score: f64,
    pub summary: String,
}

impl ServiceAssessment {
    /// Check that the reply is usable: scores in 0–100 and a non-empty summary.
    pub fn validate(&self) -> std::result::Result<(), ServiceError> {
        for (field, score) in [("englishScore", self.english_score), ("l1Score", self.l1_score)] {
            if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                return Err(ServiceError::InvalidReply(format!(
                    "{field} out of range: {score}"
                )));
            }
        }
        if self.summary.trim().is_empty() {
            return Err(ServiceError::InvalidReply("empty summary".into()));
        }
        Ok(())
    }
}

/// A capability that describes a student's results in words.
#[async_trait]
pub trait SummaryService: Send + Sync {
    /// Human-readable service name (e.g. "openai").
    fn name(&self) -> &str;

    /// Whether this service is the deterministic fallback.
    fn is_fallback(&self) -> bool {
        false
    }

    /// Assess a finished attempt.
    async fn assess(&self, request: &SummaryRequest) -> Result<ServiceAssessment>;
}

/// System prompt for generative summary services.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a precise educational assessment tool. Return ONLY valid JSON without any markdown formatting or code blocks.";

/// Build the user prompt for a summary request.
pub fn build_summary_prompt(request: &SummaryRequest) -> String {
    let english = serde_json::to_string(&request.english).unwrap_or_else(|_| "[]".into());
    let l1 = serde_json::to_string(&request.l1).unwrap_or_else(|_| "[]".into());
    format!(
        "You score reading assessments. Each result below is a question difficulty (1-5) \
and whether the student answered it correctly.\n\n\
English results: {english}\n\
Home-language results: {l1}\n\n\
Reply with a JSON object containing:\n\
- englishScore: 0-100, weighted by difficulty\n\
- l1Score: 0-100, weighted by difficulty\n\
- summary: at most 40 words on the student's reading gap and strengths\n\n\
Reply with the JSON object only.\n\n\
Example: {{\"englishScore\": 75, \"l1Score\": 82, \"summary\": \"Strong home-language reading with a moderate English gap. Focus on vocabulary.\"}}"
    )
}

/// Strip a markdown code fence from a model reply, if present.
///
/// Handles ```json and bare ``` fences, including an unclosed trailing fence.
/// Text without a fence is returned trimmed.
pub fn extract_json_payload(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse and validate a model reply into a `ServiceAssessment`.
pub fn parse_service_reply(reply: &str) -> std::result::Result<ServiceAssessment, ServiceError> {
    let payload = extract_json_payload(reply);
    if payload.is_empty() {
        return Err(ServiceError::InvalidReply("empty reply".into()));
    }
    let assessment: ServiceAssessment = serde_json::from_str(payload)
        .map_err(|e| ServiceError::InvalidReply(format!("malformed JSON: {e}")))?;
    assessment.validate()?;
    Ok(assessment)
}

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Source of uniform random choices.
pub trait RandomSource: Send + Sync {
    /// A uniformly distributed index in `0..len`. `len` must be non-zero.
    fn pick(&self, len: usize) -> usize;
}

/// Thread-local OS-seeded randomness.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Deterministic randomness from a fixed seed.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick(&self, len: usize) -> usize {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plain_json() {
        let reply = r#"  {"englishScore": 70, "l1Score": 80, "summary": "ok"}  "#;
        assert_eq!(
            extract_json_payload(reply),
            r#"{"englishScore": 70, "l1Score": 80, "summary": "ok"}"#
        );
    }

    #[test]
    fn extract_json_fence() {
        let reply = "```json\n{\"englishScore\": 1, \"l1Score\": 2, \"summary\": \"s\"}\n```";
        assert_eq!(
            extract_json_payload(reply),
            "{\"englishScore\": 1, \"l1Score\": 2, \"summary\": \"s\"}"
        );
    }

    #[test]
    fn extract_bare_fence_and_unclosed_fence() {
        assert_eq!(extract_json_payload("```\n{}\n```"), "{}");
        assert_eq!(extract_json_payload("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn parse_valid_reply() {
        let reply = "```json\n{\"englishScore\": 62, \"l1Score\": 88, \"summary\": \"Reads well at home.\"}\n```";
        let parsed = parse_service_reply(reply).unwrap();
        assert_eq!(parsed.english_score, 62.0);
        assert_eq!(parsed.l1_score, 88.0);
    }

    #[test]
    fn parse_rejects_missing_fields() {
        let err = parse_service_reply(r#"{"englishScore": 62, "summary": "x"}"#).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidReply(_)));
    }

    #[test]
    fn parse_rejects_non_numeric_scores() {
        let err =
            parse_service_reply(r#"{"englishScore": "high", "l1Score": 3, "summary": "x"}"#)
                .unwrap_err();
        assert!(err.to_string().contains("malformed JSON"));
    }

    #[test]
    fn parse_rejects_out_of_range_and_empty_summary() {
        assert!(
            parse_service_reply(r#"{"englishScore": 140, "l1Score": 3, "summary": "x"}"#).is_err()
        );
        assert!(
            parse_service_reply(r#"{"englishScore": 40, "l1Score": 3, "summary": "  "}"#).is_err()
        );
        assert!(parse_service_reply("").is_err());
    }

    #[test]
    fn prompt_contains_results() {
        let request = SummaryRequest {
            english: vec![QuestionResult {
                difficulty: 2.5,
                correct: true,
            }],
            l1: vec![],
        };
        let prompt = build_summary_prompt(&request);
        assert!(prompt.contains(r#"[{"difficulty":2.5,"correct":true}]"#));
        assert!(prompt.contains("Home-language results: []"));
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let a = SeededRandom::new(42);
        let b = SeededRandom::new(42);
        let xs: Vec<usize> = (0..20).map(|_| a.pick(10)).collect();
        let ys: Vec<usize> = (0..20).map(|_| b.pick(10)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&x| x < 10));
    }
}
