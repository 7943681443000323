//! Teacher-created assessment sessions identified by a six-digit code.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::RandomSource;

const CODE_MIN: usize = 100_000;
const CODE_SPAN: usize = 900_000;

/// A classroom session students join with its code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub code: String,
    #[serde(default)]
    pub teacher_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Session {
    pub fn new(code: String, teacher_name: Option<&str>) -> Self {
        Self {
            code,
            teacher_name: teacher_name
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            created_at: Utc::now(),
            active: true,
        }
    }

    /// Write `session.json` into the session directory.
    pub fn save(&self, data_dir: &Path) -> Result<PathBuf> {
        let dir = session_dir(data_dir, &self.code);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create session directory: {}", dir.display()))?;
        let path = dir.join("session.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write session file: {}", path.display()))?;
        Ok(path)
    }

    pub fn load(data_dir: &Path, code: &str) -> Result<Self> {
        let path = session_dir(data_dir, code).join("session.json");
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("session {code} not found ({})", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse session file: {}", path.display()))
    }

    pub fn exists(data_dir: &Path, code: &str) -> bool {
        session_dir(data_dir, code).join("session.json").is_file()
    }
}

/// Directory holding a session's files.
pub fn session_dir(data_dir: &Path, code: &str) -> PathBuf {
    data_dir.join("sessions").join(code)
}

/// A random code in `100000..=999999`.
pub fn generate_session_code(random: &dyn RandomSource) -> String {
    (CODE_MIN + random.pick(CODE_SPAN)).to_string()
}

pub fn is_valid_session_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) && !code.starts_with('0')
}
