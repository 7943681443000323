//! Subcommand implementations.

pub mod export;
pub mod init;
pub mod languages;
pub mod session;
pub mod simulate;
pub mod take;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use readgap_core::catalog::{available_languages, load_catalog, validate_catalog, Catalog};
use readgap_core::engine::AssessmentEngine;
use readgap_core::model::is_english;
use readgap_core::scoring::Scorer;
use readgap_core::session::Session;
use readgap_core::store::MemoryStore;
use readgap_core::tracker::PhaseLimits;
use readgap_core::traits::{RandomSource, SeededRandom, ThreadRandom};
use readgap_providers::config::{create_summary_service, load_config_from, ReadgapConfig};

/// Config plus the data directory after applying `--data-dir`.
pub(crate) fn load_settings(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
) -> Result<(ReadgapConfig, PathBuf)> {
    let config = load_config_from(config_path)?;
    let data_dir = data_dir.unwrap_or_else(|| config.data_dir.clone());
    Ok((config, data_dir))
}

/// The session a student is joining; it must exist and be open.
pub(crate) fn open_session(data_dir: &Path, code: &str) -> Result<Session> {
    let session = Session::load(data_dir, code)?;
    anyhow::ensure!(session.active, "session {code} is closed");
    Ok(session)
}

/// Load a catalog and log anything `validate_catalog` finds under `limits`.
pub(crate) fn load_checked_catalog(path: &Path, limits: &PhaseLimits) -> Result<Catalog> {
    let catalog = load_catalog(path)
        .with_context(|| format!("failed to load catalog {}", path.display()))?;
    for warning in validate_catalog(&catalog, limits) {
        match &warning.question_id {
            Some(id) => tracing::warn!(question = %id, "{}", warning.message),
            None => tracing::warn!(catalog = %catalog.id, "{}", warning.message),
        }
    }
    Ok(catalog)
}

/// Reject home languages the catalog has no questions for.
pub(crate) fn check_home_language(catalog: &Catalog, code: &str) -> Result<()> {
    let code = code.trim().to_lowercase();
    if is_english(&code) {
        anyhow::bail!("home language cannot be English");
    }
    if !catalog.has_language(&code) {
        let offered: Vec<String> = available_languages(catalog)
            .into_iter()
            .map(|l| l.code)
            .collect();
        anyhow::bail!(
            "no questions for home language '{code}'. Available: {}",
            if offered.is_empty() {
                "none".to_string()
            } else {
                offered.join(", ")
            }
        );
    }
    Ok(())
}

/// Build an engine over an in-memory store loaded from `catalog`.
pub(crate) fn build_engine(
    catalog: &Catalog,
    config: &ReadgapConfig,
    seed: Option<u64>,
) -> Result<(Arc<MemoryStore>, AssessmentEngine)> {
    let store = Arc::new(MemoryStore::from_catalog(catalog));
    let random: Arc<dyn RandomSource> = match seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(ThreadRandom),
    };
    let service = create_summary_service(config.summary_service.as_ref())?;
    let scorer = Scorer::new(service, config.scorer_config());

    let engine = AssessmentEngine::new(
        store.clone(),
        store.clone(),
        random,
        scorer,
        config.assessment,
    )
    .with_resources(catalog.resources.clone());
    tracing::debug!(
        questions = store.question_count(),
        service = engine.scorer().service_name(),
        "engine ready"
    );
    Ok((store, engine))
}
