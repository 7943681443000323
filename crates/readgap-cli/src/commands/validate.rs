//! The `readgap validate` command.

use std::path::PathBuf;

use anyhow::Result;

use readgap_core::catalog::{load_catalog_directory, parse_catalog, validate_catalog};
use readgap_providers::config::load_config_from;

pub fn execute(catalog_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let limits = load_config_from(config_path.as_deref())?.assessment.limits();
    let catalogs = if catalog_path.is_dir() {
        load_catalog_directory(&catalog_path)?
    } else {
        vec![parse_catalog(&catalog_path)?]
    };
    anyhow::ensure!(
        !catalogs.is_empty(),
        "no catalog files found in {}",
        catalog_path.display()
    );

    let mut total_warnings = 0;

    for catalog in &catalogs {
        println!("Catalog: {} ({} questions)", catalog.name, catalog.questions.len());

        let mut counts: Vec<(&str, usize)> = catalog.language_counts().into_iter().collect();
        counts.sort();
        for (language, n) in counts {
            println!("  {language}: {n}");
        }
        if !catalog.resources.is_empty() {
            println!("  resources: {}", catalog.resources.len());
        }

        let warnings = validate_catalog(catalog, &limits);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All catalogs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
