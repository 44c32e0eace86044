//! Version types - the records the pipeline produces and the store keeps.

use crate::agent::Style;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A fetched chapter. Never changes once the fetcher hands it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub url: String,
    /// Filesystem-safe title slug
    pub title: String,
    pub text: String,
    pub snapshot_path: PathBuf,
}

/// Which pipeline stage produced a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionKind {
    Original,
    Rewritten,
    Reviewed,
    Final,
}

impl VersionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionKind::Original => "original",
            VersionKind::Rewritten => "rewritten",
            VersionKind::Reviewed => "reviewed",
            VersionKind::Final => "final",
        }
    }
}

impl fmt::Display for VersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata saved alongside a version's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// Set on final versions only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
    /// Set on final versions only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl VersionMetadata {
    /// Metadata describing a chapter's provenance
    pub fn for_chapter(chapter: &Chapter) -> Self {
        Self {
            title: Some(chapter.title.clone()),
            source_url: Some(chapter.url.clone()),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: Style, tone: Option<&str>) -> Self {
        self.style = Some(style);
        self.tone = tone.map(str::to_string);
        self
    }
}

/// A persisted version. The store only ever appends these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub kind: VersionKind,
    pub text: String,
    /// Stamped by the store on save
    pub timestamp: DateTime<Utc>,
    pub metadata: VersionMetadata,
}

impl Version {
    /// Selector label: `KIND | title | timestamp`
    pub fn label(&self) -> String {
        let ts = self.timestamp.to_rfc3339();
        format!(
            "{} | {} | {}",
            self.kind.as_str().to_uppercase(),
            self.metadata.title.as_deref().unwrap_or("?"),
            &ts[..ts.len().min(19)]
        )
    }
}

/// A search hit annotated with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub version: Version,
    pub score: f32,
}

impl SearchResult {
    /// Result header: `KIND • title • Similarity=0.123`
    pub fn label(&self) -> String {
        format!(
            "{} • {} • Similarity={:.3}",
            self.version.kind.as_str().to_uppercase(),
            self.version.metadata.title.as_deref().unwrap_or("unknown"),
            self.score
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Version {
        Version {
            id: "abc".to_string(),
            kind: VersionKind::Reviewed,
            text: "body".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            metadata: VersionMetadata {
                title: Some("Chapter_1".to_string()),
                ..VersionMetadata::default()
            },
        }
    }

    #[test]
    fn label_truncates_timestamp_to_seconds() {
        assert_eq!(sample().label(), "REVIEWED | Chapter_1 | 2024-03-09T14:05:07");
    }

    #[test]
    fn search_label_formats_score() {
        let hit = SearchResult {
            version: sample(),
            score: 0.87654,
        };
        assert_eq!(hit.label(), "REVIEWED • Chapter_1 • Similarity=0.877");
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&VersionKind::Final).unwrap();
        assert_eq!(json, "\"final\"");
    }

    #[test]
    fn metadata_omits_unset_fields() {
        let json = serde_json::to_value(VersionMetadata::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
