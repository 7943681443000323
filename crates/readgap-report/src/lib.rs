//! readgap-report: Session exports.
//!
//! Renders a `SessionReport` as CSV for spreadsheets or as a self-contained
//! HTML dashboard.

pub mod csv;
pub mod html;

pub use self::csv::{render_csv, write_csv_report};
pub use self::html::{generate_html, write_html_report};
