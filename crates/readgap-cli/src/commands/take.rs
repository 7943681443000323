//! The `readgap take` command: an interactive attempt on the terminal.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use readgap_core::catalog::display_name;
use readgap_core::engine::{AnswerSubmission, AttemptResult};
use readgap_core::model::{is_english, Question};

pub struct TakeArgs {
    pub catalog: PathBuf,
    pub session: String,
    pub name: String,
    pub year_group: String,
    pub home_language: Option<String>,
    pub seed: Option<u64>,
    pub data_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: TakeArgs) -> Result<()> {
    let (config, data_dir) = super::load_settings(args.config.as_deref(), args.data_dir)?;
    super::open_session(&data_dir, &args.session)?;

    let catalog = super::load_checked_catalog(&args.catalog, &config.assessment.limits())?;
    let home_language = args
        .home_language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());
    if let Some(code) = home_language {
        super::check_home_language(&catalog, code)?;
    }

    let (store, engine) = super::build_engine(&catalog, &config, args.seed)?;
    let student = engine
        .register_student(&args.name, &args.year_group, home_language)
        .await?;
    let started = engine.start_attempt(student.id, &args.session).await?;
    let attempt_id = started.attempt.id;

    let limits = engine.settings().limits();
    println!(
        "Hello {}! Part 1: {} English reading questions.",
        student.name, limits.english
    );
    println!("Type the number of your answer and press Enter.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut question = started.question;
    let mut number = 1;

    let result = loop {
        print_question(number, &question);
        let shown = Instant::now();

        let selected_idx = loop {
            let Some(line) = lines.next_line().await? else {
                anyhow::bail!("input ended before the assessment was finished");
            };
            match parse_choice(&line, question.choices.len()) {
                Some(idx) => break idx,
                None => println!(
                    "Please enter a number from 1 to {}.",
                    question.choices.len()
                ),
            }
        };

        let outcome = engine
            .submit_answer(AnswerSubmission {
                attempt_id,
                question_id: question.id.clone(),
                selected_idx,
                time_ms: u64::try_from(shown.elapsed().as_millis()).unwrap_or(u64::MAX),
            })
            .await?;

        if let Some(result) = outcome.result {
            break result;
        }
        let next = outcome
            .next_question
            .context("assessment stopped without a next question")?;
        if is_english(&question.language) && !is_english(&next.language) {
            println!(
                "\nPart 2: {} questions in {}.\n",
                limits.home_language,
                display_name(&next.language)
            );
        }
        question = next;
        number += 1;
    };

    print_result(&result);

    let record = store
        .record(attempt_id)
        .await?
        .context("finished attempt missing from store")?;
    let path = record.save(&data_dir)?;
    tracing::info!(path = %path.display(), "attempt saved");

    Ok(())
}

fn print_question(number: usize, question: &Question) {
    println!("Q{number}. {}", question.text);
    for (i, choice) in question.choices.iter().enumerate() {
        println!("  {}) {choice}", i + 1);
    }
}

/// One-based choice number typed by the student, as a zero-based index.
fn parse_choice(line: &str, choices: usize) -> Option<usize> {
    let n: usize = line.trim().parse().ok()?;
    (1..=choices).contains(&n).then(|| n - 1)
}

fn print_result(result: &AttemptResult) {
    let outcome = &result.outcome;
    println!("\nAssessment complete.");
    println!("  English score:       {:.0}", outcome.english_score);
    println!("  Home-language score: {:.0}", outcome.l1_score);
    println!("  Gap:                 {:+.0}", outcome.gap);
    println!("  Band:                {}", outcome.band);
    println!("\n{}", outcome.summary);

    if !result.resources.is_empty() {
        println!("\nSuggested resources:");
        for resource in &result.resources {
            if resource.description.is_empty() {
                println!("  - {}", resource.url);
            } else {
                println!("  - {} ({})", resource.description, resource.url);
            }
        }
    }
}
