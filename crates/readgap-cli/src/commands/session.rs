//! The `readgap session` command.

use std::path::PathBuf;

use anyhow::Result;

use readgap_core::session::{generate_session_code, is_valid_session_code, Session};
use readgap_core::traits::ThreadRandom;

const MAX_CODE_TRIES: usize = 20;

pub fn execute(
    teacher: Option<String>,
    code: Option<String>,
    data_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, data_dir) = super::load_settings(config_path.as_deref(), data_dir)?;

    let code = match code {
        Some(code) => {
            anyhow::ensure!(
                is_valid_session_code(&code),
                "session code must be six digits not starting with 0: '{code}'"
            );
            anyhow::ensure!(
                !Session::exists(&data_dir, &code),
                "session {code} already exists"
            );
            code
        }
        None => (0..MAX_CODE_TRIES)
            .map(|_| generate_session_code(&ThreadRandom))
            .find(|code| !Session::exists(&data_dir, code))
            .ok_or_else(|| anyhow::anyhow!("could not find an unused session code"))?,
    };

    let session = Session::new(code, teacher.as_deref());
    let path = session.save(&data_dir)?;
    tracing::info!(code = %session.code, path = %path.display(), "session created");

    println!("Session code: {}", session.code);
    if let Some(teacher) = &session.teacher_name {
        println!("Teacher: {teacher}");
    }
    Ok(())
}
