//! TOML question catalog loader.
//!
//! Loads catalogs from TOML files and directories, validates them, and
//! answers catalog-level questions such as which home languages are offered.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{is_english, Band, Question, Resource, ENGLISH, GENERAL};
use crate::tracker::PhaseLimits;

/// A set of questions and reading resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Catalog {
    /// Number of questions per language tag.
    pub fn language_counts(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for q in &self.questions {
            *counts.entry(q.language.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.questions.iter().any(|q| q.language == language)
    }
}

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
    #[serde(default)]
    resources: Vec<TomlResource>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(default)]
    id: Option<String>,
    language: String,
    text: String,
    choices: Vec<String>,
    correct_idx: usize,
    difficulty: f64,
    #[serde(default)]
    skill_tag: String,
}

#[derive(Debug, Deserialize)]
struct TomlResource {
    language: String,
    band: String,
    url: String,
    #[serde(default)]
    description: String,
}

/// Parse a single TOML file into a `Catalog`.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a `Catalog` (useful for testing).
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let mut per_language: HashMap<String, usize> = HashMap::new();
    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let language = q.language.trim().to_lowercase();
            let n = per_language.entry(language.clone()).or_insert(0);
            *n += 1;
            let id = q.id.unwrap_or_else(|| format!("{language}-{n}"));
            anyhow::ensure!(
                q.difficulty.is_finite(),
                "question {id}: difficulty must be a finite number, got {}",
                q.difficulty
            );
            Ok(Question {
                id,
                language,
                text: q.text,
                choices: q.choices,
                correct_idx: q.correct_idx,
                difficulty: q.difficulty,
                skill_tag: q.skill_tag,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let resources = parsed
        .resources
        .into_iter()
        .map(|r| {
            let band: Band = r
                .band
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}", e))?;
            Ok(Resource {
                language: r.language.trim().to_lowercase(),
                band,
                url: r.url,
                description: r.description,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Catalog {
        id: parsed.catalog.id,
        name: parsed.catalog.name,
        description: parsed.catalog.description,
        questions,
        resources,
    })
}

/// Recursively load all `.toml` catalog files from a directory.
pub fn load_catalog_directory(dir: &Path) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// Load a catalog file, or merge every catalog in a directory.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if path.is_dir() {
        let catalogs = load_catalog_directory(path)?;
        anyhow::ensure!(
            !catalogs.is_empty(),
            "no catalog files found in {}",
            path.display()
        );
        Ok(merge(catalogs))
    } else {
        parse_catalog(path)
    }
}

/// Combine several catalogs into one.
pub fn merge(catalogs: Vec<Catalog>) -> Catalog {
    if catalogs.len() == 1 {
        return catalogs.into_iter().next().unwrap_or_default();
    }
    let mut merged = Catalog {
        id: catalogs
            .iter()
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>()
            .join("+"),
        name: catalogs
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        ..Catalog::default()
    };
    for catalog in catalogs {
        merged.questions.extend(catalog.questions);
        merged.resources.extend(catalog.resources);
    }
    merged
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a catalog for common issues.
pub fn validate_catalog(catalog: &Catalog, limits: &PhaseLimits) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for q in &catalog.questions {
        if !seen_ids.insert(&q.id) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
    }

    for q in &catalog.questions {
        let mut warn = |message: String| {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message,
            })
        };
        if q.text.trim().is_empty() {
            warn("prompt is empty".into());
        }
        if q.choices.len() < 2 {
            warn(format!("needs at least 2 choices, has {}", q.choices.len()));
        }
        if q.correct_idx >= q.choices.len() {
            warn(format!(
                "correct_idx {} is out of range for {} choices",
                q.correct_idx,
                q.choices.len()
            ));
        }
        if !q.difficulty.is_finite() || !(1.0..=5.0).contains(&q.difficulty) {
            warn(format!("difficulty {} is outside 1-5", q.difficulty));
        }
    }

    let counts = catalog.language_counts();
    match counts.get(ENGLISH).copied().unwrap_or(0) {
        0 => warnings.push(ValidationWarning {
            question_id: None,
            message: "no English questions; assessments cannot start".into(),
        }),
        n if n < limits.english => warnings.push(ValidationWarning {
            question_id: None,
            message: format!(
                "only {n} English questions for a block of {}; questions will repeat",
                limits.english
            ),
        }),
        _ => {}
    }

    let mut home: Vec<(&str, usize)> = counts
        .iter()
        .filter(|(lang, _)| !is_english(lang))
        .map(|(lang, n)| (*lang, *n))
        .collect();
    home.sort();
    for (language, n) in home {
        if n < limits.home_language {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "only {n} {language} questions for a block of {}; questions will repeat",
                    limits.home_language
                ),
            });
        }
    }

    warnings
}

/// A home language offered by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageOption {
    pub code: String,
    pub name: String,
}

/// Display name for a home-language code.
pub fn display_name(code: &str) -> String {
    let known = match code {
        "spanish" => Some("Spanish (Español)"),
        "french" => Some("French (Français)"),
        "arabic" => Some("Arabic (العربية)"),
        "polish" => Some("Polish (Polski)"),
        "portuguese" => Some("Portuguese (Português)"),
        "urdu" => Some("Urdu (اردو)"),
        "bengali" => Some("Bengali (বাংলা)"),
        "punjabi" => Some("Punjabi (ਪੰਜਾਬੀ)"),
        "turkish" => Some("Turkish (Türkçe)"),
        "somali" => Some("Somali (Soomaali)"),
        _ => None,
    };
    if let Some(name) = known {
        return name.to_string();
    }
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Home languages with at least one question, sorted by display name.
pub fn available_languages(catalog: &Catalog) -> Vec<LanguageOption> {
    let codes: BTreeSet<&str> = catalog
        .questions
        .iter()
        .map(|q| q.language.as_str())
        .filter(|lang| !is_english(lang))
        .collect();

    let mut languages: Vec<LanguageOption> = codes
        .into_iter()
        .map(|code| LanguageOption {
            code: code.to_string(),
            name: display_name(code),
        })
        .collect();
    languages.sort_by(|a, b| a.name.cmp(&b.name));
    languages
}

/// Resources for a student's home language and band, followed by general ones.
pub fn recommend(resources: &[Resource], home_language: Option<&str>, band: Band) -> Vec<Resource> {
    let specific = resources
        .iter()
        .filter(|r| r.band == band && Some(r.language.as_str()) == home_language);
    let general = resources
        .iter()
        .filter(|r| r.band == band && r.language == GENERAL);
    specific.chain(general).cloned().collect()
}
