//! CSV export, one row per completed attempt.

use std::path::Path;

use anyhow::{Context, Result};

use readgap_core::report::{SessionReport, SessionRow};

/// Column headings, in order.
pub const HEADER: [&str; 8] = [
    "Name",
    "Year Group",
    "Home Language",
    "English Score",
    "L1 Score",
    "Gap",
    "Colour Band",
    "Summary",
];

fn record(row: &SessionRow) -> [String; 8] {
    let outcome = &row.outcome;
    [
        row.student.name.clone(),
        row.student.year_group.clone(),
        row.student.home_language.clone().unwrap_or_default(),
        format!("{}", outcome.english_score),
        format!("{}", outcome.l1_score),
        format!("{}", outcome.gap),
        outcome.band.to_string(),
        outcome.summary.clone(),
    ]
}

fn write_rows<W: std::io::Write>(report: &SessionReport, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(HEADER)?;
    for row in &report.rows {
        writer.write_record(record(row))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the report as a CSV string.
pub fn render_csv(report: &SessionReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_rows(report, &mut writer)?;
    let bytes = writer.into_inner().context("failed to finish CSV output")?;
    Ok(String::from_utf8(bytes)?)
}

/// Write the report as CSV to a file.
pub fn write_csv_report(report: &SessionReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_rows(report, &mut writer)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use readgap_core::model::{AttemptOutcome, Band, Student, SummarySource};

    fn row(name: &str, home: Option<&str>, english: f64, l1: f64, summary: &str) -> SessionRow {
        let gap = l1 - english;
        SessionRow {
            student: Student::new(name, "Year 8", home),
            attempt_id: uuid::Uuid::new_v4(),
            started_at: Utc::now(),
            outcome: AttemptOutcome {
                completed_at: Utc::now(),
                english_score: english,
                l1_score: l1,
                gap,
                band: Band::from_gap(gap),
                summary: summary.into(),
                summary_source: SummarySource::Fallback,
            },
        }
    }

    fn report(rows: Vec<SessionRow>) -> SessionReport {
        SessionReport {
            id: uuid::Uuid::new_v4(),
            created_at: Utc::now(),
            session_code: "123456".into(),
            teacher_name: None,
            rows,
        }
    }

    #[test]
    fn header_and_rows() {
        let csv = render_csv(&report(vec![
            row("Ana", Some("spanish"), 40.0, 90.0, "Strong in Spanish"),
            row("Ben", None, 75.0, 0.0, "Reads well"),
        ]))
        .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Name,Year Group,Home Language,English Score,L1 Score,Gap,Colour Band,Summary"
        );
        assert_eq!(lines[1], "Ana,Year 8,spanish,40,90,50,red,Strong in Spanish");
        assert_eq!(lines[2], "Ben,Year 8,,75,0,-75,green,Reads well");
    }

    #[test]
    fn quotes_commas_and_quotes() {
        let csv = render_csv(&report(vec![row(
            "O'Brien, Liam",
            Some("polish"),
            50.0,
            50.0,
            "Said \"good\", mostly",
        )]))
        .unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert!(line.starts_with("\"O'Brien, Liam\""));
        assert!(line.ends_with("\"Said \"\"good\"\", mostly\""));
    }

    #[test]
    fn empty_report_is_header_only() {
        let csv = render_csv(&report(vec![])).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports/session.csv");
        write_csv_report(&report(vec![row("Ana", None, 10.0, 0.0, "x")]), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Ana,Year 8"));
    }
}
