//! Tantivy-based keyword index over saved versions.
//!
//! Complements the embedding search in [`crate::storage`] with exact-term
//! matching on titles and bodies.

use crate::version::Version;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("index error: {0}")]
    IndexError(#[from] tantivy::TantivyError),
    #[error("query parse error: {0}")]
    QueryError(#[from] tantivy::query::QueryParserError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Tantivy-based keyword index for versions.
pub struct SearchIndex {
    index: Index,
    id: Field,
    kind: Field,
    title: Field,
    body: Field,
}

impl SearchIndex {
    /// Open or create a search index at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SearchError> {
        let mut schema_builder = Schema::builder();
        let id = schema_builder.add_text_field("id", STRING | STORED);
        let kind = schema_builder.add_text_field("kind", TEXT);
        let title = schema_builder.add_text_field("title", TEXT);
        let body = schema_builder.add_text_field("body", TEXT);
        let schema: Schema = schema_builder.build();

        let index_path = path.as_ref();
        std::fs::create_dir_all(index_path)?;

        let index = Index::create_in_dir(index_path, schema)
            .or_else(|_| Index::open_in_dir(index_path))?;

        Ok(Self {
            index,
            id,
            kind,
            title,
            body,
        })
    }

    /// Index a version for keyword searching
    pub fn index_version(&self, version: &Version) -> Result<(), SearchError> {
        let mut index_writer: IndexWriter = self.index.writer(50_000_000)?;

        index_writer.add_document(doc!(
            self.id => version.id.clone(),
            self.kind => version.kind.as_str(),
            self.title => version.metadata.title.clone().unwrap_or_default(),
            self.body => version.text.clone(),
        ))?;

        index_writer.commit()?;
        Ok(())
    }

    /// Ids of the versions matching the query, best first
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        // TopDocs panics on a zero limit
        if limit == 0 {
            return Ok(Vec::new());
        }
        let reader: IndexReader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;
        let searcher = reader.searcher();

        let query_parser =
            QueryParser::for_index(&self.index, vec![self.title, self.body, self.kind]);
        let query = query_parser.parse_query(query_str)?;

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut results = Vec::new();
        for (_score, doc_address) in top_docs {
            let retrieved_doc = searcher.doc::<tantivy::TantivyDocument>(doc_address)?;
            if let Some(id) = retrieved_doc.get_first(self.id).and_then(|v| v.as_str()) {
                results.push(id.to_string());
            }
        }

        Ok(results)
    }
}
