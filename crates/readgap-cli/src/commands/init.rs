//! The `readgap init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("readgap.toml").exists() {
        println!("readgap.toml already exists, skipping.");
    } else {
        std::fs::write("readgap.toml", SAMPLE_CONFIG)?;
        println!("Created readgap.toml");
    }

    std::fs::create_dir_all("catalog")?;
    let catalog_path = Path::new("catalog/reading.toml");
    if catalog_path.exists() {
        println!("catalog/reading.toml already exists, skipping.");
    } else {
        std::fs::write(catalog_path, STARTER_CATALOG)?;
        println!("Created catalog/reading.toml");
    }

    println!("\nNext steps:");
    println!("  1. Optionally configure a summary service in readgap.toml");
    println!("  2. Run: readgap validate --catalog catalog/reading.toml");
    println!("  3. Run: readgap session --teacher \"Your Name\"");
    println!("  4. Run: readgap take --catalog catalog/reading.toml --session <code> --name <name> --year-group <year>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# readgap configuration

data_dir = "./readgap-data"

# Uncomment to have a generative service write attempt summaries.
# Without it, a fixed summary is used. Scores never depend on the service.
#
# [summary_service]
# type = "openai"
# api_key = "${OPENAI_API_KEY}"
# model = "gpt-4o"

[assessment]
english_questions = 15
home_language_questions = 3
difficulty_step = 0.5
min_difficulty = 1.0
max_difficulty = 5.0
starting_difficulty = 2.5

[scoring]
max_retries = 2
retry_delay_ms = 500
"#;

const STARTER_CATALOG: &str = include_str!("../../../../catalog/reading.toml");
