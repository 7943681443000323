//! The `readgap languages` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::Table;

use readgap_core::catalog::available_languages;
use readgap_core::tracker::PhaseLimits;

pub fn execute(catalog_path: PathBuf) -> Result<()> {
    let catalog = super::load_checked_catalog(&catalog_path, &PhaseLimits::default())?;
    let languages = available_languages(&catalog);
    if languages.is_empty() {
        println!("No home-language questions in {}.", catalog.name);
        return Ok(());
    }

    let counts = catalog.language_counts();
    let mut table = Table::new();
    table.set_header(vec!["Code", "Language", "Questions"]);
    for language in &languages {
        table.add_row(vec![
            language.code.clone(),
            language.name.clone(),
            counts.get(language.code.as_str()).copied().unwrap_or(0).to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
