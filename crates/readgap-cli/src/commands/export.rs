//! The `readgap export` command.

use std::path::PathBuf;

use anyhow::Result;

use readgap_core::report::SessionReport;
use readgap_report::{write_csv_report, write_html_report};

const FORMATS: [&str; 3] = ["csv", "html", "json"];

pub fn execute(
    session: String,
    format: String,
    output: PathBuf,
    data_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let formats = parse_formats(&format)?;
    let (_, data_dir) = super::load_settings(config_path.as_deref(), data_dir)?;

    let report = SessionReport::load(&data_dir, &session)?;
    eprintln!(
        "Session {}: {} completed attempt(s)",
        report.session_code,
        report.rows.len()
    );

    std::fs::create_dir_all(&output)?;
    for fmt in formats {
        let path = output.join(format!("session-{session}.{fmt}"));
        match fmt {
            "csv" => write_csv_report(&report, &path)?,
            "html" => write_html_report(&report, &path)?,
            _ => report.save_json(&path)?,
        }
        println!("{} report: {}", fmt.to_uppercase(), path.display());
    }
    Ok(())
}

/// Comma-separated format names; `all` expands to every format.
fn parse_formats(list: &str) -> Result<Vec<&'static str>> {
    let mut formats = Vec::new();
    for name in list.split(',').map(|s| s.trim().to_lowercase()) {
        if name == "all" {
            return Ok(FORMATS.to_vec());
        }
        let Some(fmt) = FORMATS.iter().find(|f| **f == name) else {
            anyhow::bail!("unknown export format '{name}' (expected csv, html, json or all)");
        };
        if !formats.contains(fmt) {
            formats.push(*fmt);
        }
    }
    Ok(formats)
}
