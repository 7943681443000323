//! `readgap.toml` configuration and summary-service factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use readgap_core::engine::AssessmentSettings;
use readgap_core::scoring::{FallbackSummary, ScorerConfig};
use readgap_core::traits::SummaryService;

use crate::anthropic::AnthropicSummaryService;
use crate::openai::OpenAiSummaryService;

/// Which generative service writes attempt summaries.
///
/// API keys are masked in `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServiceConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, base_url, model) = match self {
            ServiceConfig::OpenAI {
                base_url, model, ..
            } => ("OpenAI", base_url, model),
            ServiceConfig::Anthropic {
                base_url, model, ..
            } => ("Anthropic", base_url, model),
        };
        f.debug_struct(name)
            .field("api_key", &"***")
            .field("base_url", base_url)
            .field("model", model)
            .finish()
    }
}

/// Retry settings for summary service calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_retries() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    500
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

/// Top-level readgap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadgapConfig {
    /// Generative summary service; the deterministic fallback when absent.
    #[serde(default)]
    pub summary_service: Option<ServiceConfig>,
    #[serde(default)]
    pub assessment: AssessmentSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    /// Where sessions and attempt records are stored.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./readgap-data")
}

impl Default for ReadgapConfig {
    fn default() -> Self {
        Self {
            summary_service: None,
            assessment: AssessmentSettings::default(),
            scoring: ScoringSettings::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl ReadgapConfig {
    pub fn scorer_config(&self) -> ScorerConfig {
        ScorerConfig {
            max_retries: self.scoring.max_retries,
            retry_delay: Duration::from_millis(self.scoring.retry_delay_ms),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Unset variables expand to an empty string.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_service_config(config: &ServiceConfig) -> ServiceConfig {
    let resolve = |v: &Option<String>| v.as_deref().map(resolve_env_vars);
    match config {
        ServiceConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => ServiceConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve(base_url),
            model: resolve(model),
        },
        ServiceConfig::Anthropic {
            api_key,
            base_url,
            model,
        } => ServiceConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: resolve(base_url),
            model: resolve(model),
        },
    }
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ReadgapConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("readgap.toml");
            if local.exists() {
                Some(local)
            } else {
                global_config_path().filter(|p| p.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ReadgapConfig::default(),
    };

    apply_env_overrides(
        &mut config,
        std::env::var("READGAP_OPENAI_KEY").ok(),
        std::env::var("READGAP_ANTHROPIC_KEY").ok(),
    );
    config.summary_service = config.summary_service.as_ref().map(resolve_service_config);
    config
        .assessment
        .validate()
        .context("invalid [assessment] settings")?;

    Ok(config)
}

/// Parse a config file's contents.
pub fn parse_config(content: &str) -> Result<ReadgapConfig> {
    Ok(toml::from_str(content)?)
}

/// An explicitly set key replaces the configured one. Without a configured
/// service, an OpenAI key selects OpenAI, otherwise an Anthropic key selects
/// Anthropic.
fn apply_env_overrides(
    config: &mut ReadgapConfig,
    openai_key: Option<String>,
    anthropic_key: Option<String>,
) {
    let configured = config.summary_service.take();
    config.summary_service = match (configured, openai_key, anthropic_key) {
        (Some(ServiceConfig::OpenAI { base_url, model, .. }), Some(key), _) => {
            Some(ServiceConfig::OpenAI {
                api_key: key,
                base_url,
                model,
            })
        }
        (Some(ServiceConfig::Anthropic { base_url, model, .. }), _, Some(key)) => {
            Some(ServiceConfig::Anthropic {
                api_key: key,
                base_url,
                model,
            })
        }
        (None, Some(key), _) => Some(ServiceConfig::OpenAI {
            api_key: key,
            base_url: None,
            model: None,
        }),
        (None, None, Some(key)) => Some(ServiceConfig::Anthropic {
            api_key: key,
            base_url: None,
            model: None,
        }),
        (configured, _, _) => configured,
    };
}

fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|h| {
        PathBuf::from(h)
            .join(".config")
            .join("readgap")
            .join("config.toml")
    })
}

/// Create the configured summary service, or the deterministic fallback.
pub fn create_summary_service(config: Option<&ServiceConfig>) -> Result<Arc<dyn SummaryService>> {
    let service: Arc<dyn SummaryService> = match config {
        None => Arc::new(FallbackSummary),
        Some(ServiceConfig::OpenAI { api_key, .. } | ServiceConfig::Anthropic { api_key, .. })
            if api_key.trim().is_empty() =>
        {
            tracing::warn!("summary service configured without an API key; using fallback summaries");
            Arc::new(FallbackSummary)
        }
        Some(ServiceConfig::OpenAI {
            api_key,
            base_url,
            model,
        }) => Arc::new(OpenAiSummaryService::new(api_key, base_url.clone(), model.clone())?),
        Some(ServiceConfig::Anthropic {
            api_key,
            base_url,
            model,
        }) => Arc::new(AnthropicSummaryService::new(
            api_key,
            base_url.clone(),
            model.clone(),
        )?),
    };
    Ok(service)
}
