//! HTML session dashboard.
//!
//! One self-contained page per session: band counts, a sortable results
//! table, and the report as raw JSON.

use std::path::Path;

use anyhow::Result;

use readgap_core::catalog::display_name;
use readgap_core::model::Band;
use readgap_core::report::SessionReport;

/// Escape text for element content and attribute values.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn band_label(band: Band) -> &'static str {
    match band {
        Band::Green => "Green",
        Band::Amber => "Amber",
        Band::Red => "Red",
    }
}

/// Generate the dashboard for one session.
pub fn generate_html(report: &SessionReport) -> String {
    let mut html = String::new();
    let code = html_escape(&report.session_code);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>readgap session {code}</title>\n"));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str(&format!("<h1>Session {code}</h1>\n"));
    let teacher = report
        .teacher_name
        .as_deref()
        .map(|t| format!("Teacher: <strong>{}</strong> | ", html_escape(t)))
        .unwrap_or_default();
    html.push_str(&format!(
        "<p class=\"meta\">{teacher}{} completed attempts | generated {}</p>\n",
        report.rows.len(),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    html.push_str("<section class=\"dashboard\">\n<h2>Bands</h2>\n<div class=\"counts\">\n");
    for (band, count) in report.band_counts() {
        html.push_str(&format!(
            "<div class=\"count band-{band}\"><span class=\"n\">{count}</span> {}</div>\n",
            band_label(band)
        ));
    }
    html.push_str("</div>\n");
    if let Some(gap) = report.average_gap() {
        html.push_str(&format!("<p class=\"meta\">Average gap: {gap:.1}</p>\n"));
    }
    html.push_str("</section>\n");

    html.push_str("<section class=\"results\">\n<h2>Results</h2>\n");
    if report.rows.is_empty() {
        html.push_str("<p class=\"empty\">No completed attempts yet.</p>\n");
    } else {
        html.push_str("<table id=\"results\">\n");
        html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Name</th><th onclick=\"sortTable(1)\">Year</th><th onclick=\"sortTable(2)\">Home language</th><th onclick=\"sortTable(3)\">English</th><th onclick=\"sortTable(4)\">L1</th><th onclick=\"sortTable(5)\">Gap</th><th onclick=\"sortTable(6)\">Band</th><th>Summary</th></tr></thead>\n");
        html.push_str("<tbody>\n");
        for row in &report.rows {
            let outcome = &row.outcome;
            let home = row
                .student
                .home_language
                .as_deref()
                .map(display_name)
                .unwrap_or_else(|| "-".to_string());
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><span class=\"badge band-{}\">{}</span></td><td>{}</td></tr>\n",
                html_escape(&row.student.name),
                html_escape(&row.student.year_group),
                html_escape(&home),
                outcome.english_score,
                outcome.l1_score,
                outcome.gap,
                outcome.band,
                band_label(outcome.band),
                html_escape(&outcome.summary),
            ));
        }
        html.push_str("</tbody></table>\n");
    }
    html.push_str("</section>\n");

    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write the dashboard to a file.
pub fn write_html_report(report: &SessionReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --green: #dcfce7; --amber: #fef3c7; --red: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --green: #064e3b; --amber: #78350f; --red: #7f1d1d; }
}
body { font-family: system-ui, 'Segoe UI', Roboto, sans-serif; margin: 0 auto; max-width: 72rem; padding: 1.5rem; background: var(--bg); color: var(--fg); }
h1 { margin-bottom: 0.25rem; }
h2 { margin-top: 1.5rem; font-size: 1.2rem; }
.meta, .empty { color: #6b7280; }
.counts { display: flex; gap: 1rem; }
.count { padding: 1rem 1.5rem; border-radius: 8px; font-weight: bold; }
.count .n { font-size: 2rem; display: block; }
.band-green { background: var(--green); }
.band-amber { background: var(--amber); }
.band-red { background: var(--red); }
.badge { padding: 0.2rem 0.6rem; border-radius: 999px; font-size: 0.85rem; }
#results { border-collapse: collapse; width: 100%; }
#results th, #results td { border-bottom: 1px solid var(--border); padding: 0.4rem 0.75rem; text-align: left; vertical-align: top; }
#results th { cursor: pointer; user-select: none; }
pre { overflow-x: auto; padding: 0.75rem; background: var(--border); border-radius: 6px; }
code { font-family: ui-monospace, monospace; font-size: 0.8rem; }
details summary { cursor: pointer; margin-top: 1.5rem; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = !(table.dataset.sortCol == col && table.dataset.sortDir == 'asc');
  const key = cell => {
    const n = parseFloat(cell.textContent);
    return isNaN(n) ? cell.textContent : n;
  };
  rows.sort((a, b) => {
    const va = key(a.cells[col]);
    const vb = key(b.cells[col]);
    const cmp = typeof va === 'number' && typeof vb === 'number' ? va - vb : String(va).localeCompare(String(vb));
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use readgap_core::model::{AttemptOutcome, Student, SummarySource};
    use readgap_core::report::SessionRow;

    fn make_test_report() -> SessionReport {
        let mut student = Student::new("Ana <script>", "Year 7", Some("spanish"));
        student.id = uuid::Uuid::nil();
        SessionReport {
            id: uuid::Uuid::nil(),
            created_at: Utc::now(),
            session_code: "482913".into(),
            teacher_name: Some("Ms Patel".into()),
            rows: vec![SessionRow {
                student,
                attempt_id: uuid::Uuid::nil(),
                started_at: Utc::now(),
                outcome: AttemptOutcome {
                    completed_at: Utc::now(),
                    english_score: 40.0,
                    l1_score: 90.0,
                    gap: 50.0,
                    band: Band::Red,
                    summary: "Strong home-language reader & keen".into(),
                    summary_source: SummarySource::Fallback,
                },
            }],
        }
    }

    #[test]
    fn html_report_contains_required_elements() {
        let html = generate_html(&make_test_report());

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Session 482913"));
        assert!(html.contains("Ms Patel"));
        assert!(html.contains("Spanish (Español)"));
        assert!(html.contains("badge band-red"));
        assert!(html.contains("<span class=\"n\">1</span> Red"));
        assert!(html.contains("Raw JSON Data"));
        assert!(html.contains("<title>readgap session 482913</title>\n<style>"));
        assert!(html.contains("<p class=\"meta\">Average gap: 50.0</p>\n</section>"));
    }

    #[test]
    fn html_escapes_user_text() {
        let html = generate_html(&make_test_report());
        assert!(!html.contains("Ana <script>"));
        assert!(html.contains("Ana &lt;script&gt;"));
        assert!(html.contains("reader &amp; keen"));
    }

    #[test]
    fn empty_session() {
        let mut report = make_test_report();
        report.rows.clear();
        report.teacher_name = None;
        let html = generate_html(&report);
        assert!(html.contains("No completed attempts yet."));
        assert!(!html.contains("Average gap"));
    }

    #[test]
    fn html_report_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/session.html");

        write_html_report(&make_test_report(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
