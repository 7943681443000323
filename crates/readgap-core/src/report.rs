//! Saved attempt records and per-session reports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Attempt, AttemptOutcome, Band, Response, Student};
use crate::session::{session_dir, Session};
use crate::traits::AttemptStore;

/// An attempt together with its student and responses, as saved to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub student: Student,
    pub attempt: Attempt,
    pub responses: Vec<Response>,
}

impl AttemptRecord {
    /// Save as `attempt-<uuid>.json` in the attempt's session directory.
    pub fn save(&self, data_dir: &Path) -> Result<PathBuf> {
        let dir = session_dir(data_dir, &self.attempt.session_code);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create session directory: {}", dir.display()))?;
        let path = dir.join(format!("attempt-{}.json", self.attempt.id));
        let json = serde_json::to_string_pretty(self).context("failed to serialize attempt")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write attempt to {}", path.display()))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read attempt from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse attempt JSON: {}", path.display()))
    }
}

/// One completed attempt in a session report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub student: Student,
    pub attempt_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

/// Results of every completed attempt in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub session_code: String,
    #[serde(default)]
    pub teacher_name: Option<String>,
    /// Sorted by student name.
    pub rows: Vec<SessionRow>,
}

impl SessionReport {
    /// Build a report from saved records; in-progress attempts are left out.
    pub fn from_records(
        session_code: &str,
        teacher_name: Option<String>,
        records: impl IntoIterator<Item = AttemptRecord>,
    ) -> Self {
        let rows = records
            .into_iter()
            .filter(|r| r.attempt.session_code == session_code)
            .filter_map(|r| {
                let outcome = r.attempt.outcome?;
                Some(SessionRow {
                    student: r.student,
                    attempt_id: r.attempt.id,
                    started_at: r.attempt.started_at,
                    outcome,
                })
            });
        Self::from_rows(session_code, teacher_name, rows)
    }

    /// Build a report straight from an attempt store.
    pub async fn from_store(
        store: &dyn AttemptStore,
        session_code: &str,
        teacher_name: Option<String>,
    ) -> Result<Self> {
        let rows = store
            .session_attempts(session_code)
            .await?
            .into_iter()
            .filter_map(|(student, attempt)| {
                let outcome = attempt.outcome?;
                Some(SessionRow {
                    student,
                    attempt_id: attempt.id,
                    started_at: attempt.started_at,
                    outcome,
                })
            });
        Ok(Self::from_rows(session_code, teacher_name, rows))
    }

    /// Load the session and every saved attempt under `data_dir`.
    pub fn load(data_dir: &Path, session_code: &str) -> Result<Self> {
        let session = Session::load(data_dir, session_code)?;
        let dir = session_dir(data_dir, session_code);

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("failed to read directory: {}", dir.display()))?
        {
            let path = entry?.path();
            let is_attempt = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("attempt-") && n.ends_with(".json"));
            if !is_attempt {
                continue;
            }
            match AttemptRecord::load(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("skipping {}: {:#}", path.display(), e),
            }
        }

        Ok(Self::from_records(session_code, session.teacher_name, records))
    }

    fn from_rows(
        session_code: &str,
        teacher_name: Option<String>,
        rows: impl Iterator<Item = SessionRow>,
    ) -> Self {
        let mut rows: Vec<SessionRow> = rows.collect();
        rows.sort_by(|a, b| {
            a.student
                .name
                .to_lowercase()
                .cmp(&b.student.name.to_lowercase())
                .then(a.started_at.cmp(&b.started_at))
        });
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            session_code: session_code.to_string(),
            teacher_name,
            rows,
        }
    }

    /// Number of rows per band, green first.
    pub fn band_counts(&self) -> [(Band, usize); 3] {
        Band::ALL.map(|band| {
            (
                band,
                self.rows.iter().filter(|r| r.outcome.band == band).count(),
            )
        })
    }

    pub fn average_gap(&self) -> Option<f64> {
        if self.rows.is_empty() {
            return None;
        }
        let total: f64 = self.rows.iter().map(|r| r.outcome.gap).sum();
        Some(total / self.rows.len() as f64)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SummarySource;
    use crate::store::MemoryStore;

    fn record(name: &str, code: &str, gap: Option<f64>) -> AttemptRecord {
        let student = Student::new(name, "Year 7", Some("spanish"));
        let mut attempt = Attempt::new(student.id, code);
        attempt.outcome = gap.map(|gap| AttemptOutcome {
            completed_at: Utc::now(),
            english_score: 50.0,
            l1_score: 50.0 + gap,
            gap,
            band: Band::from_gap(gap),
            summary: "ok".into(),
            summary_source: SummarySource::Fallback,
        });
        AttemptRecord {
            student,
            attempt,
            responses: Vec::new(),
        }
    }

    #[test]
    fn completed_attempts_only_sorted_by_name() {
        let report = SessionReport::from_records(
            "123456",
            None,
            vec![
                record("zoe", "123456", Some(10.0)),
                record("Adam", "123456", Some(-5.0)),
                record("Mia", "123456", None),
                record("Bea", "654321", Some(1.0)),
            ],
        );
        let names: Vec<&str> = report.rows.iter().map(|r| r.student.name.as_str()).collect();
        assert_eq!(names, vec!["Adam", "zoe"]);
        assert_eq!(
            report.band_counts(),
            [(Band::Green, 1), (Band::Amber, 0), (Band::Red, 1)]
        );
        assert_eq!(report.average_gap(), Some(2.5));
    }

    #[test]
    fn empty_report_has_no_average() {
        let report = SessionReport::from_records("123456", None, Vec::new());
        assert!(report.average_gap().is_none());
        assert!(report.band_counts().iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn load_from_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        Session::new("123456".into(), Some("Mr Jones"))
            .save(dir.path())
            .unwrap();
        record("Ana", "123456", Some(1.0)).save(dir.path()).unwrap();
        record("Ben", "123456", None).save(dir.path()).unwrap();
        std::fs::write(
            session_dir(dir.path(), "123456").join("attempt-broken.json"),
            "{",
        )
        .unwrap();

        let report = SessionReport::load(dir.path(), "123456").unwrap();
        assert_eq!(report.teacher_name.as_deref(), Some("Mr Jones"));
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].outcome.band, Band::Amber);

        let path = dir.path().join("out/report.json");
        report.save_json(&path).unwrap();
        let loaded = SessionReport::load_json(&path).unwrap();
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.session_code, "123456");
    }

    #[test]
    fn load_unknown_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SessionReport::load(dir.path(), "111111").is_err());
    }

    #[tokio::test]
    async fn from_store_matches_records() {
        let store = MemoryStore::new(Vec::new());
        for r in [record("Cai", "222222", Some(0.0)), record("Dev", "222222", None)] {
            store.insert_student(r.student.clone()).await.unwrap();
            let mut attempt = r.attempt.clone();
            let outcome = attempt.outcome.take();
            store.insert_attempt(attempt).await.unwrap();
            if let Some(outcome) = outcome {
                store.complete_attempt(r.attempt.id, outcome).await.unwrap();
            }
        }
        let report = SessionReport::from_store(&store, "222222", None).await.unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].student.name, "Cai");
    }
}
