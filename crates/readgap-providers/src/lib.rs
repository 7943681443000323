//! readgap-providers: Generative summary services.
//!
//! Implements the `SummaryService` trait for OpenAI and Anthropic, and loads
//! the `readgap.toml` configuration that selects between them.

pub mod anthropic;
pub mod config;
mod http;
pub mod mock;
pub mod openai;

pub use config::{create_summary_service, load_config_from, ReadgapConfig, ServiceConfig};
pub use readgap_core::error::ServiceError;
