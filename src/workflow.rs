//! The rewrite pipeline: fetch → rewrite → review → human edit → approve,
//! plus the read-side search and compare views.
//!
//! Stage outputs live in an explicit [`Session`] that the caller owns and
//! passes in; [`Workflow`] holds only the collaborators.

use crate::agent::{self, AgentError, Style, TextModel};
use crate::diff;
use crate::embedding::{Embedder, EmbeddingError};
use crate::narration::{NarrationError, Narrator};
use crate::scoring::Scorer;
use crate::scraper::{PageFetcher, ScraperError};
use crate::search::SearchIndex;
use crate::storage::{StorageError, VersionStore};
use crate::version::{Chapter, SearchResult, Version, VersionKind, VersionMetadata};
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker recorded on versions a person approved
pub const HUMAN_EDITOR: &str = "human";

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("scrape a chapter first")]
    MissingChapter,
    #[error("generate rewritten text first")]
    MissingRewrite,
    #[error("final text is empty")]
    EmptyFinalText,
    #[error("enter a query")]
    EmptyQuery,
    #[error("result count must be at least 1")]
    InvalidTopK,
    #[error("no version with id {0}")]
    VersionNotFound(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] ScraperError),
    #[error("model call failed: {0}")]
    Agent(#[from] AgentError),
    #[error("version store failed: {0}")]
    Storage(#[from] StorageError),
    #[error("narration failed: {0}")]
    Narration(#[from] NarrationError),
    #[error("scoring failed: {0}")]
    Scoring(#[from] EmbeddingError),
    #[error("failed to export final text to {path}: {source}")]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WorkflowError {
    /// Bad or missing input, as opposed to a failing collaborator
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::MissingChapter
                | WorkflowError::MissingRewrite
                | WorkflowError::EmptyFinalText
                | WorkflowError::EmptyQuery
                | WorkflowError::InvalidTopK
                | WorkflowError::VersionNotFound(_)
                | WorkflowError::Narration(NarrationError::EmptyText)
        )
    }
}

/// Stage outputs for one interactive session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub chapter: Option<Chapter>,
    pub style: Style,
    pub tone: Option<String>,
    pub rewritten: Option<String>,
    pub reviewed: Option<String>,
    /// Save original / rewritten / reviewed drafts as they are produced
    pub auto_save: bool,
}

impl Session {
    pub fn new(auto_save: bool) -> Self {
        Self {
            auto_save,
            ..Self::default()
        }
    }

    /// The text the human edit starts from: reviewed, else rewritten
    pub fn draft(&self) -> &str {
        self.reviewed
            .as_deref()
            .or(self.rewritten.as_deref())
            .unwrap_or_default()
    }

    /// Drop every stage output. Settings (auto-save) stay.
    pub fn reset(&mut self) {
        *self = Self::new(self.auto_save);
    }

    fn metadata(&self) -> VersionMetadata {
        self.chapter
            .as_ref()
            .map(VersionMetadata::for_chapter)
            .unwrap_or_default()
    }

    fn styled_metadata(&self) -> VersionMetadata {
        self.metadata().with_style(self.style, self.tone.as_deref())
    }
}

/// Outcome of comparing two stored versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Identical,
    Diff(String),
}

/// Wires the collaborators into the pipeline.
pub struct Workflow<'a> {
    fetcher: Box<dyn PageFetcher>,
    model: Box<dyn TextModel>,
    narrator: Narrator,
    store: VersionStore<'a>,
    index: Option<SearchIndex>,
    scorer: Scorer<'a>,
    export_path: PathBuf,
}

impl<'a> Workflow<'a> {
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        model: Box<dyn TextModel>,
        narrator: Narrator,
        store: VersionStore<'a>,
        embedder: &'a dyn Embedder,
        export_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            model,
            narrator,
            store,
            index: None,
            scorer: Scorer::new(embedder),
            export_path: export_path.into(),
        }
    }

    /// Also index every saved version for keyword search
    pub fn with_index(mut self, index: SearchIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn store(&self) -> &VersionStore<'a> {
        &self.store
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    /// Fetch a chapter and make it the session's source text.
    pub async fn scrape(&self, session: &mut Session, url: &str) -> Result<Chapter, WorkflowError> {
        let chapter = self.fetcher.fetch(url).await?;

        if session.auto_save {
            self.save(
                VersionKind::Original,
                &chapter.text,
                VersionMetadata::for_chapter(&chapter),
            )?;
        }

        // Drafts of a previous chapter no longer apply
        session.chapter = Some(chapter.clone());
        session.rewritten = None;
        session.reviewed = None;
        Ok(chapter)
    }

    /// Spin the session's chapter in the given style.
    pub async fn rewrite(
        &self,
        session: &mut Session,
        style: Style,
        tone: Option<&str>,
    ) -> Result<String, WorkflowError> {
        let chapter = session.chapter.as_ref().ok_or(WorkflowError::MissingChapter)?;
        let tone = tone.map(str::trim).filter(|t| !t.is_empty());

        let rewritten = agent::rewrite(self.model.as_ref(), &chapter.text, style, tone).await?;

        session.style = style;
        session.tone = tone.map(str::to_string);
        if session.auto_save {
            self.save(VersionKind::Rewritten, &rewritten, session.styled_metadata())?;
        }
        session.rewritten = Some(rewritten.clone());
        Ok(rewritten)
    }

    /// Polish the session's rewritten text.
    pub async fn review(&self, session: &mut Session) -> Result<String, WorkflowError> {
        let rewritten = session.rewritten.as_deref().ok_or(WorkflowError::MissingRewrite)?;

        let reviewed = agent::review(self.model.as_ref(), rewritten).await?;

        if session.auto_save {
            self.save(VersionKind::Reviewed, &reviewed, session.styled_metadata())?;
        }
        session.reviewed = Some(reviewed.clone());
        Ok(reviewed)
    }

    /// Export the human-approved text, then persist it as the final version.
    /// A failed export stores nothing.
    pub fn approve(&self, session: &Session, final_text: &str) -> Result<Version, WorkflowError> {
        if final_text.trim().is_empty() {
            return Err(WorkflowError::EmptyFinalText);
        }

        if let Some(parent) = self.export_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| WorkflowError::Export {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.export_path, final_text).map_err(|source| WorkflowError::Export {
            path: self.export_path.clone(),
            source,
        })?;

        let metadata = VersionMetadata {
            edited_by: Some(HUMAN_EDITOR.to_string()),
            approved_at: Some(Utc::now()),
            ..session.styled_metadata()
        };
        let version = self.save(VersionKind::Final, final_text, metadata)?;

        tracing::info!(id = %version.id, export = %self.export_path.display(), "final version approved");
        Ok(version)
    }

    /// Save a version and index it for keyword search.
    pub fn save(
        &self,
        kind: VersionKind,
        text: &str,
        metadata: VersionMetadata,
    ) -> Result<Version, WorkflowError> {
        let version = self.store.save(kind, text, metadata)?;
        if let Some(index) = &self.index {
            if let Err(e) = index.index_version(&version) {
                tracing::warn!(id = %version.id, error = %e, "failed to index version");
            }
        }
        Ok(version)
    }

    /// Semantic search, each hit scored against the query text.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, WorkflowError> {
        if query.trim().is_empty() {
            return Err(WorkflowError::EmptyQuery);
        }
        if top_k == 0 {
            return Err(WorkflowError::InvalidTopK);
        }

        self.store
            .search(query, top_k)?
            .into_iter()
            .map(|(version, _)| -> Result<SearchResult, WorkflowError> {
                let score = self.scorer.score(&version.text, query)?;
                Ok(SearchResult { version, score })
            })
            .collect()
    }

    /// Keyword search through the tantivy index, or a substring scan when
    /// no index is attached.
    pub fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<Version>, WorkflowError> {
        if query.trim().is_empty() {
            return Err(WorkflowError::EmptyQuery);
        }
        if limit == 0 {
            return Err(WorkflowError::InvalidTopK);
        }

        let Some(index) = &self.index else {
            return self.simple_search(query, limit);
        };

        match index.search(query, limit) {
            Ok(ids) => {
                let mut versions = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(version) = self.store.get(&id)? {
                        versions.push(version);
                    }
                }
                Ok(versions)
            }
            Err(e) => {
                tracing::warn!(error = %e, "keyword index unavailable, scanning versions");
                self.simple_search(query, limit)
            }
        }
    }

    /// Simple text-based search fallback
    fn simple_search(&self, query: &str, limit: usize) -> Result<Vec<Version>, WorkflowError> {
        let query_lower = query.to_lowercase();
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .filter(|v| {
                v.text.to_lowercase().contains(&query_lower)
                    || v.metadata
                        .title
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(&query_lower))
            })
            .take(limit)
            .collect())
    }

    /// Every stored version, for building the compare selector
    pub fn versions(&self) -> Result<Vec<Version>, WorkflowError> {
        Ok(self.store.list_all()?)
    }

    /// Unified diff between two stored versions' text.
    pub fn compare(&self, id_a: &str, id_b: &str) -> Result<Comparison, WorkflowError> {
        let a = self.find(id_a)?;
        let b = self.find(id_b)?;
        let diff = diff::unified_diff(&a.text, &b.text, "Version A", "Version B");
        if diff.trim().is_empty() {
            Ok(Comparison::Identical)
        } else {
            Ok(Comparison::Diff(diff))
        }
    }

    fn find(&self, id: &str) -> Result<Version, WorkflowError> {
        self.store
            .get(id)?
            .ok_or_else(|| WorkflowError::VersionNotFound(id.to_string()))
    }

    /// Render `text` to a new MP3.
    pub async fn narrate(&self, text: &str) -> Result<PathBuf, WorkflowError> {
        Ok(self.narrator.narrate(text).await?)
    }
}
