//! # Redraft
//!
//! A content-rewriting workflow: fetch a chapter, spin it with an LLM, polish
//! it with a second pass, let a human approve the final text, and keep every
//! version searchable.
//!
//! ## Features
//!
//! - **Two-pass rewriting**: a styled rewrite followed by a grammar/flow review
//! - **Version store**: sled-backed, append-only, with embedding search
//! - **Keyword index**: tantivy full-text search over the same versions
//! - **Narration**: any text to an MP3 artifact
//! - **Compare**: unified diff between any two stored versions

pub mod agent;
pub mod config;
pub mod diff;
pub mod embedding;
pub mod narration;
pub mod scoring;
pub mod scraper;
pub mod search;
pub mod storage;
pub mod ui;
pub mod version;
pub mod workflow;

pub use agent::Style;
pub use config::Config;
pub use search::SearchIndex;
pub use storage::VersionStore;
pub use version::{Chapter, SearchResult, Version, VersionKind, VersionMetadata};
pub use workflow::{Session, Workflow, WorkflowError};
