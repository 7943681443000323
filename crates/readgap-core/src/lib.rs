//! readgap-core: adaptive question selection and gap scoring.
//!
//! This crate defines the data model, the store/service traits, and the
//! decision logic that the rest of readgap builds on.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod model;
pub mod report;
pub mod scoring;
pub mod selector;
pub mod session;
pub mod store;
pub mod tracker;
pub mod traits;
