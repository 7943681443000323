//! The `readgap simulate` command: synthetic students answering by a fixed
//! strategy, run concurrently against one engine.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use comfy_table::Table;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use readgap_core::catalog::{available_languages, display_name};
use readgap_core::engine::{AnswerSubmission, AssessmentEngine, AttemptResult};
use readgap_core::model::{Band, Question, Student};

pub struct SimulateArgs {
    pub catalog: PathBuf,
    pub session: String,
    pub students: usize,
    pub strategy: String,
    pub parallelism: usize,
    pub seed: Option<u64>,
    pub no_home_language: bool,
    pub data_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// How a synthetic student answers.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Strategy {
    Correct,
    Incorrect,
    /// Correct on the first question, wrong on the second, and so on.
    Alternate,
    /// Correct exactly when the question is no harder than the ability.
    Ability(f64),
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "correct" => Ok(Strategy::Correct),
            "incorrect" => Ok(Strategy::Incorrect),
            "alternate" => Ok(Strategy::Alternate),
            other => {
                let level = other.strip_prefix("ability:").ok_or_else(|| {
                    anyhow::anyhow!(
                        "unknown strategy '{s}' (expected correct, incorrect, alternate or ability:<difficulty>)"
                    )
                })?;
                let level: f64 = level
                    .parse()
                    .with_context(|| format!("invalid ability level '{level}'"))?;
                anyhow::ensure!(level.is_finite(), "invalid ability level '{level}'");
                Ok(Strategy::Ability(level))
            }
        }
    }
}

impl Strategy {
    fn answer(self, question: &Question, answered: usize) -> usize {
        let correct = match self {
            Strategy::Correct => true,
            Strategy::Incorrect => false,
            Strategy::Alternate => answered % 2 == 0,
            Strategy::Ability(level) => question.difficulty <= level,
        };
        if correct {
            question.correct_idx
        } else {
            (question.correct_idx + 1) % question.choices.len()
        }
    }
}

pub async fn execute(args: SimulateArgs) -> Result<()> {
    let strategy: Strategy = args.strategy.parse()?;
    anyhow::ensure!(args.students > 0, "--students must be at least 1");
    anyhow::ensure!(args.parallelism > 0, "--parallelism must be at least 1");

    let (config, data_dir) = super::load_settings(args.config.as_deref(), args.data_dir)?;
    super::open_session(&data_dir, &args.session)?;
    let catalog = super::load_checked_catalog(&args.catalog, &config.assessment.limits())?;

    let languages: Vec<String> = if args.no_home_language {
        Vec::new()
    } else {
        available_languages(&catalog)
            .into_iter()
            .map(|l| l.code)
            .collect()
    };

    let (store, engine) = super::build_engine(&catalog, &config, args.seed)?;
    let engine = Arc::new(engine);
    let semaphore = Arc::new(Semaphore::new(args.parallelism));

    eprintln!(
        "Simulating {} students ({:?}, parallelism {})",
        args.students, strategy, args.parallelism
    );
    let start = Instant::now();

    let mut futures = FuturesUnordered::new();
    for n in 1..=args.students {
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);
        let session = args.session.clone();
        let home_language = if languages.is_empty() {
            None
        } else {
            Some(languages[(n - 1) % languages.len()].clone())
        };
        let name = format!("Student {n:02}");

        futures.push(async move {
            let result = async {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                run_student(&engine, &session, &name, home_language.as_deref(), strategy).await
            }
            .await;
            (name, result)
        });
    }

    let mut rows: Vec<(Student, AttemptResult)> = Vec::new();
    let mut failed = 0;
    while let Some((name, result)) = futures.next().await {
        match result {
            Ok((student, result)) => {
                let record = store
                    .record(result.attempt.id)
                    .await?
                    .context("finished attempt missing from store")?;
                record.save(&data_dir)?;
                rows.push((student, result));
            }
            Err(e) => {
                tracing::error!(student = %name, "simulated attempt failed: {e:#}");
                failed += 1;
            }
        }
    }
    rows.sort_by(|a, b| a.0.name.cmp(&b.0.name));

    let mut table = Table::new();
    table.set_header(vec!["Student", "Home language", "English", "L1", "Gap", "Band"]);
    for (student, result) in &rows {
        let outcome = &result.outcome;
        table.add_row(vec![
            student.name.clone(),
            student
                .home_language
                .as_deref()
                .map(display_name)
                .unwrap_or_else(|| "-".to_string()),
            format!("{:.0}", outcome.english_score),
            format!("{:.0}", outcome.l1_score),
            format!("{:+.0}", outcome.gap),
            outcome.band.to_string(),
        ]);
    }
    println!("{table}");

    let counts: Vec<String> = Band::ALL
        .iter()
        .map(|band| {
            let n = rows.iter().filter(|(_, r)| r.outcome.band == *band).count();
            format!("{band}: {n}")
        })
        .collect();
    println!("{}", counts.join("  "));
    eprintln!(
        "Complete: {}/{} succeeded, {failed} failed ({:.1}s)",
        rows.len(),
        args.students,
        start.elapsed().as_secs_f64()
    );

    anyhow::ensure!(failed == 0, "{failed} simulated attempt(s) failed");
    Ok(())
}

async fn run_student(
    engine: &AssessmentEngine,
    session: &str,
    name: &str,
    home_language: Option<&str>,
    strategy: Strategy,
) -> Result<(Student, AttemptResult)> {
    let student = engine.register_student(name, "Simulated", home_language).await?;
    let started = engine.start_attempt(student.id, session).await?;
    let attempt_id = started.attempt.id;

    let mut question = started.question;
    let mut answered = 0;
    loop {
        let outcome = engine
            .submit_answer(AnswerSubmission {
                attempt_id,
                question_id: question.id.clone(),
                selected_idx: strategy.answer(&question, answered),
                time_ms: 0,
            })
            .await?;
        answered += 1;

        if let Some(result) = outcome.result {
            return Ok((student, result));
        }
        question = outcome
            .next_question
            .context("assessment stopped without a next question")?;
    }
}
