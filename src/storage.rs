//! Sled-based version store.
//!
//! Append-only: versions are saved under a fresh uuid and never rewritten.
//! Each version's embedding sits in a sibling tree and search is a
//! brute-force cosine scan over it.

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder, EmbeddingError};
use crate::version::{Version, VersionKind, VersionMetadata};
use chrono::Utc;
use sled::Transactional;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

const VERSIONS_TREE: &str = "chapter_versions";
const EMBEDDINGS_TREE: &str = "chapter_embeddings";

/// Results returned by [`VersionStore::search`] when the caller has no preference
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    DbError(#[from] sled::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),
    #[error("top_k must be at least 1")]
    InvalidTopK,
}

/// Persistent store of chapter versions.
pub struct VersionStore<'a> {
    db: sled::Db,
    versions: sled::Tree,
    embeddings: sled::Tree,
    embedder: &'a dyn Embedder,
}

impl<'a> VersionStore<'a> {
    /// Open or create the store at the given path. Reopening reuses the
    /// existing trees.
    pub fn open<P: AsRef<Path>>(path: P, embedder: &'a dyn Embedder) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let versions = db.open_tree(VERSIONS_TREE)?;
        let embeddings = db.open_tree(EMBEDDINGS_TREE)?;
        tracing::debug!(
            model = embedder.model_name(),
            dimensions = embedder.dimensions(),
            versions = versions.len(),
            "version store opened"
        );
        Ok(Self {
            db,
            versions,
            embeddings,
            embedder,
        })
    }

    /// Persist a version under a fresh id. The timestamp is stamped here.
    ///
    /// Blank text is stored as given with a zero vector, so it never ranks
    /// above a real match.
    pub fn save(
        &self,
        kind: VersionKind,
        text: &str,
        metadata: VersionMetadata,
    ) -> Result<Version, StorageError> {
        let vector = if text.trim().is_empty() {
            vec![0.0; self.embedder.dimensions()]
        } else {
            self.embedder.embed(text)?
        };
        let version = Version {
            id: Uuid::new_v4().to_string(),
            kind,
            text: text.to_string(),
            timestamp: Utc::now(),
            metadata,
        };
        let value = serde_json::to_vec(&version)?;

        // Both rows land together or not at all
        (&self.versions, &self.embeddings)
            .transaction(|(versions, embeddings)| {
                versions.insert(version.id.as_bytes(), value.as_slice())?;
                embeddings.insert(version.id.as_bytes(), vec_to_blob(&vector))?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Storage(err) => StorageError::DbError(err),
                sled::transaction::TransactionError::Abort(()) => {
                    StorageError::DbError(sled::Error::Unsupported("transaction aborted".into()))
                }
            })?;
        self.db.flush()?;

        tracing::info!(id = %version.id, kind = %version.kind, "version saved");
        Ok(version)
    }

    /// The `top_k` stored versions most similar to `query`, best first
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<(Version, f32)>, StorageError> {
        if top_k == 0 {
            return Err(StorageError::InvalidTopK);
        }
        let query_vec = self.embedder.embed(query)?;

        let mut scored = Vec::new();
        for item in self.embeddings.iter() {
            let (key, blob) = item?;
            let stored = blob_to_vec(&blob);
            if stored.len() != self.embedder.dimensions() {
                tracing::warn!(
                    id = %String::from_utf8_lossy(&key),
                    len = stored.len(),
                    model = self.embedder.model_name(),
                    "skipping embedding from a different model"
                );
                continue;
            }
            scored.push((key, cosine_similarity(&query_vec, &stored)));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        let mut results = Vec::with_capacity(scored.len());
        for (key, similarity) in scored {
            if let Some(data) = self.versions.get(&key)? {
                results.push((serde_json::from_slice(&data)?, similarity));
            }
        }

        tracing::debug!(hits = results.len(), top_k, "search finished");
        Ok(results)
    }

    /// Retrieve a version by id
    pub fn get(&self, id: &str) -> Result<Option<Version>, StorageError> {
        match self.versions.get(id.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// List all stored versions, oldest first
    pub fn list_all(&self) -> Result<Vec<Version>, StorageError> {
        let mut results = Vec::new();
        for item in self.versions.iter() {
            let (_key, value) = item?;
            let version: Version = serde_json::from_slice(&value)?;
            results.push(version);
        }
        results.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(results)
    }

    /// Get the number of stored versions
    pub fn count(&self) -> usize {
        self.versions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use std::collections::HashSet;

    fn meta(title: &str) -> VersionMetadata {
        VersionMetadata {
            title: Some(title.to_string()),
            ..VersionMetadata::default()
        }
    }

    #[test]
    fn saved_versions_are_listed_as_given() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::default();
        let store = VersionStore::open(dir.path(), &embedder).unwrap();

        let saved = store
            .save(VersionKind::Rewritten, "The tide turned.", meta("Chapter_1"))
            .unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, saved.id);
        assert_eq!(all[0].kind, VersionKind::Rewritten);
        assert_eq!(all[0].text, "The tide turned.");
        assert_eq!(all[0].metadata.title.as_deref(), Some("Chapter_1"));
        assert_eq!(store.get(&saved.id).unwrap(), Some(saved));
    }

    #[test]
    fn ids_are_pairwise_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::default();
        let store = VersionStore::open(dir.path(), &embedder).unwrap();

        let ids: HashSet<String> = (0..10)
            .map(|_| {
                store
                    .save(VersionKind::Original, "same text", VersionMetadata::default())
                    .unwrap()
                    .id
            })
            .collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(store.count(), 10);
    }

    #[test]
    fn search_is_bounded_and_ranked() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::default();
        let store = VersionStore::open(dir.path(), &embedder).unwrap();

        for text in [
            "the storm broke over the reef",
            "a quiet morning in the village",
            "merchants argued about copra prices",
            "the canoe drifted past the reef in the storm",
            "children played on the beach",
        ] {
            store.save(VersionKind::Original, text, VersionMetadata::default()).unwrap();
        }

        let hits = store.search("storm over the reef", 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0.text, "the storm broke over the reef");
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn search_on_empty_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::default();
        let store = VersionStore::open(dir.path(), &embedder).unwrap();
        assert!(store.search("anything", DEFAULT_TOP_K).unwrap().is_empty());
    }

    #[test]
    fn blank_text_is_saved_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::default();
        let store = VersionStore::open(dir.path(), &embedder).unwrap();

        let blank = store.save(VersionKind::Final, "   ", VersionMetadata::default()).unwrap();
        store
            .save(VersionKind::Original, "the reef at dawn", VersionMetadata::default())
            .unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, blank.id);
        assert_eq!(all[0].text, "   ");

        let hits = store.search("reef", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.text, "the reef at dawn");
        assert_eq!(hits[1].1, 0.0);
    }

    #[test]
    fn embeddings_of_another_size_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::default();
        let store = VersionStore::open(dir.path(), &embedder).unwrap();

        let old = store.save(VersionKind::Original, "old reef", VersionMetadata::default()).unwrap();
        let small = HashEmbedder::new(8).embed("old reef").unwrap();
        store.embeddings.insert(old.id.as_bytes(), vec_to_blob(&small)).unwrap();
        store.save(VersionKind::Original, "new reef", VersionMetadata::default()).unwrap();

        let hits = store.search("reef", 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.text, "new reef");
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::default();
        let store = VersionStore::open(dir.path(), &embedder).unwrap();
        assert!(matches!(store.search("q", 0), Err(StorageError::InvalidTopK)));
    }
}
