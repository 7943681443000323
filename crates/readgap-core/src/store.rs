//! In-memory question and attempt store.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::model::{Attempt, AttemptOutcome, Question, Response, Student};
use crate::report::AttemptRecord;
use crate::traits::{AttemptStore, QuestionStore};

#[derive(Debug)]
struct AttemptEntry {
    attempt: Attempt,
    responses: Vec<Response>,
}

/// Holds a read-only question catalog plus mutable student/attempt state.
///
/// Shared between concurrent attempts behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    questions: Vec<Question>,
    by_id: HashMap<String, usize>,
    students: RwLock<HashMap<Uuid, Student>>,
    attempts: RwLock<HashMap<Uuid, AttemptEntry>>,
}

impl MemoryStore {
    pub fn new(questions: Vec<Question>) -> Self {
        let mut by_id = HashMap::new();
        for (idx, question) in questions.iter().enumerate() {
            // First definition wins; the catalog validator reports duplicates.
            by_id.entry(question.id.clone()).or_insert(idx);
        }
        Self {
            questions,
            by_id,
            students: RwLock::new(HashMap::new()),
            attempts: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::new(catalog.questions.clone())
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Snapshot of an attempt with its student and responses, for saving.
    pub async fn record(&self, attempt_id: Uuid) -> Result<Option<AttemptRecord>> {
        let attempts = self.attempts.read().await;
        let Some(entry) = attempts.get(&attempt_id) else {
            return Ok(None);
        };
        let students = self.students.read().await;
        let student = students
            .get(&entry.attempt.student_id)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "attempt {attempt_id} refers to unknown student {}",
                    entry.attempt.student_id
                )
            })?;
        Ok(Some(AttemptRecord {
            student,
            attempt: entry.attempt.clone(),
            responses: entry.responses.clone(),
        }))
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn by_language(&self, language: &str) -> Result<Vec<Question>> {
        Ok(self
            .questions
            .iter()
            .filter(|q| q.language == language)
            .cloned()
            .collect())
    }

    async fn question(&self, id: &str) -> Result<Option<Question>> {
        Ok(self.by_id.get(id).map(|&idx| self.questions[idx].clone()))
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_student(&self, student: Student) -> Result<()> {
        let mut students = self.students.write().await;
        if students.contains_key(&student.id) {
            anyhow::bail!("student {} already exists", student.id);
        }
        students.insert(student.id, student);
        Ok(())
    }

    async fn student(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.students.read().await.get(&id).cloned())
    }

    async fn insert_attempt(&self, attempt: Attempt) -> Result<()> {
        let mut attempts = self.attempts.write().await;
        if attempts.contains_key(&attempt.id) {
            anyhow::bail!("attempt {} already exists", attempt.id);
        }
        attempts.insert(
            attempt.id,
            AttemptEntry {
                attempt,
                responses: Vec::new(),
            },
        );
        Ok(())
    }

    async fn attempt(&self, id: Uuid) -> Result<Option<Attempt>> {
        Ok(self
            .attempts
            .read()
            .await
            .get(&id)
            .map(|entry| entry.attempt.clone()))
    }

    async fn append_response(&self, attempt_id: Uuid, response: Response) -> Result<()> {
        let mut attempts = self.attempts.write().await;
        let entry = attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| anyhow::anyhow!("attempt {attempt_id} not found"))?;
        entry.responses.push(response);
        Ok(())
    }

    async fn responses(&self, attempt_id: Uuid) -> Result<Vec<Response>> {
        Ok(self
            .attempts
            .read()
            .await
            .get(&attempt_id)
            .map(|entry| entry.responses.clone())
            .unwrap_or_default())
    }

    async fn complete_attempt(&self, attempt_id: Uuid, outcome: AttemptOutcome) -> Result<Attempt> {
        let mut attempts = self.attempts.write().await;
        let entry = attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| anyhow::anyhow!("attempt {attempt_id} not found"))?;
        if entry.attempt.is_completed() {
            anyhow::bail!("attempt {attempt_id} is already completed");
        }
        entry.attempt.outcome = Some(outcome);
        Ok(entry.attempt.clone())
    }

    async fn session_attempts(&self, session_code: &str) -> Result<Vec<(Student, Attempt)>> {
        let attempts = self.attempts.read().await;
        let students = self.students.read().await;
        Ok(attempts
            .values()
            .filter(|entry| entry.attempt.session_code == session_code)
            .filter_map(|entry| {
                students
                    .get(&entry.attempt.student_id)
                    .map(|s| (s.clone(), entry.attempt.clone()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{Band, SummarySource, ENGLISH};

    fn q(id: &str, language: &str) -> Question {
        Question {
            id: id.into(),
            language: language.into(),
            text: String::new(),
            choices: vec!["a".into(), "b".into()],
            correct_idx: 1,
            difficulty: 2.0,
            skill_tag: String::new(),
        }
    }

    fn outcome() -> AttemptOutcome {
        AttemptOutcome {
            completed_at: Utc::now(),
            english_score: 50.0,
            l1_score: 0.0,
            gap: -50.0,
            band: Band::Green,
            summary: "done".into(),
            summary_source: SummarySource::Fallback,
        }
    }

    #[tokio::test]
    async fn questions_by_language_and_id() {
        let store = MemoryStore::new(vec![q("en-1", ENGLISH), q("es-1", "spanish"), q("en-2", ENGLISH)]);
        assert_eq!(store.by_language(ENGLISH).await.unwrap().len(), 2);
        assert_eq!(store.by_language("spanish").await.unwrap().len(), 1);
        assert!(store.by_language("polish").await.unwrap().is_empty());
        assert_eq!(store.question("es-1").await.unwrap().unwrap().language, "spanish");
        assert!(store.question("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attempt_lifecycle() {
        let store = MemoryStore::new(vec![]);
        let student = Student::new("Ana", "Year 7", Some("spanish"));
        let attempt = Attempt::new(student.id, "654321");
        let attempt_id = attempt.id;
        store.insert_student(student.clone()).await.unwrap();
        store.insert_attempt(attempt).await.unwrap();

        store
            .append_response(
                attempt_id,
                Response {
                    question_id: "en-1".into(),
                    selected_idx: 1,
                    is_correct: true,
                    time_ms: 1200,
                    answered_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(store.responses(attempt_id).await.unwrap().len(), 1);

        let completed = store.complete_attempt(attempt_id, outcome()).await.unwrap();
        assert!(completed.is_completed());

        let err = store.complete_attempt(attempt_id, outcome()).await.unwrap_err();
        assert!(err.to_string().contains("already completed"));

        let session = store.session_attempts("654321").await.unwrap();
        assert_eq!(session.len(), 1);
        assert_eq!(session[0].0.name, "Ana");

        let record = store.record(attempt_id).await.unwrap().unwrap();
        assert_eq!(record.responses.len(), 1);
        assert_eq!(record.student.id, student.id);
    }

    #[tokio::test]
    async fn append_to_unknown_attempt_fails() {
        let store = MemoryStore::new(vec![]);
        let err = store
            .append_response(
                Uuid::new_v4(),
                Response {
                    question_id: "x".into(),
                    selected_idx: 0,
                    is_correct: false,
                    time_ms: 0,
                    answered_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
