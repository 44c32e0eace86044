use async_trait::async_trait;
use redraft::agent::{AgentError, TextModel};
use redraft::embedding::HashEmbedder;
use redraft::narration::{NarrationError, Narrator, SpeechEngine};
use redraft::scraper::{slugify, PageFetcher, ScraperError};
use redraft::workflow::{Comparison, HUMAN_EDITOR};
use redraft::{
    Chapter, SearchIndex, Session, Style, VersionKind, VersionMetadata, VersionStore, Workflow,
    WorkflowError,
};
use std::path::Path;
use tempfile::TempDir;

const CHAPTER_URL: &str = "https://example.org/wiki/Chapter_1";

struct FakeFetcher {
    fail: bool,
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Chapter, ScraperError> {
        if self.fail {
            return Err(ScraperError::MissingContent("#mw-content-text".to_string()));
        }
        Ok(Chapter {
            url: url.to_string(),
            title: slugify("Chapter 1"),
            text: "The sea was calm. Dick watched the reef.".to_string(),
            snapshot_path: "data/raw/Chapter_1.html".into(),
        })
    }
}

/// Answers writer prompts and reviewer prompts with fixed text
struct FakeModel {
    fail: bool,
}

#[async_trait]
impl TextModel for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        if self.fail {
            return Err(AgentError::RequestFailed("quota exceeded".to_string()));
        }
        if prompt.starts_with("You are **Writer-Bot**") {
            Ok("  The ocean lay still as Dick observed the reef.\n".to_string())
        } else {
            Ok("The ocean lay still while Dick observed the reef.".to_string())
        }
    }
}

struct SilentEngine;

#[async_trait]
impl SpeechEngine for SilentEngine {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, NarrationError> {
        Ok(text.as_bytes().to_vec())
    }
}

fn workflow<'a>(dir: &Path, embedder: &'a HashEmbedder, fetch_fails: bool, model_fails: bool) -> Workflow<'a> {
    let store = VersionStore::open(dir.join("versions"), embedder).unwrap();
    Workflow::new(
        Box::new(FakeFetcher { fail: fetch_fails }),
        Box::new(FakeModel { fail: model_fails }),
        Narrator::new(Box::new(SilentEngine), dir.join("audio")),
        store,
        embedder,
        dir.join("final_output.txt"),
    )
}

fn setup() -> (TempDir, HashEmbedder) {
    (TempDir::new().unwrap(), HashEmbedder::default())
}

#[tokio::test]
async fn end_to_end_approval_saves_and_exports_final_text() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);
    let mut session = Session::new(false);

    let chapter = workflow.scrape(&mut session, CHAPTER_URL).await.unwrap();
    assert_eq!(chapter.title, "Chapter_1");

    let rewritten = workflow
        .rewrite(&mut session, Style::Formal, None)
        .await
        .unwrap();
    assert_eq!(rewritten, "The ocean lay still as Dick observed the reef.");

    let reviewed = workflow.review(&mut session).await.unwrap();
    assert_eq!(session.draft(), reviewed);

    let version = workflow.approve(&session, "Final approved text.").unwrap();

    let all = workflow.versions().unwrap();
    assert_eq!(all.len(), 1);
    let saved = &all[0];
    assert_eq!(saved.id, version.id);
    assert_eq!(saved.kind, VersionKind::Final);
    assert_eq!(saved.text, "Final approved text.");
    assert_eq!(saved.metadata.edited_by.as_deref(), Some(HUMAN_EDITOR));
    assert!(saved.metadata.approved_at.is_some());
    assert_eq!(saved.metadata.title.as_deref(), Some("Chapter_1"));
    assert_eq!(saved.metadata.source_url.as_deref(), Some(CHAPTER_URL));
    assert_eq!(saved.metadata.style, Some(Style::Formal));

    let exported = std::fs::read_to_string(dir.path().join("final_output.txt")).unwrap();
    assert_eq!(exported, "Final approved text.");
}

#[tokio::test]
async fn auto_save_stores_every_stage() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);
    let mut session = Session::new(true);

    workflow.scrape(&mut session, CHAPTER_URL).await.unwrap();
    workflow
        .rewrite(&mut session, Style::Creative, Some("mysterious"))
        .await
        .unwrap();
    workflow.review(&mut session).await.unwrap();
    workflow.approve(&session, "Edited by hand.").unwrap();

    let versions = workflow.versions().unwrap();
    let kinds: Vec<VersionKind> = versions.iter().map(|v| v.kind).collect();
    assert_eq!(
        kinds,
        vec![
            VersionKind::Original,
            VersionKind::Rewritten,
            VersionKind::Reviewed,
            VersionKind::Final
        ]
    );

    let rewritten = &versions[1];
    assert_eq!(rewritten.metadata.style, Some(Style::Creative));
    assert_eq!(rewritten.metadata.tone.as_deref(), Some("mysterious"));
    assert!(rewritten.metadata.edited_by.is_none());
    assert!(versions[0].metadata.style.is_none());
}

#[tokio::test]
async fn stages_out_of_order_are_rejected_without_changes() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);
    let mut session = Session::new(true);

    let err = workflow
        .rewrite(&mut session, Style::Default, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MissingChapter));
    assert!(err.is_validation());

    let err = workflow.review(&mut session).await.unwrap_err();
    assert!(matches!(err, WorkflowError::MissingRewrite));

    let err = workflow.approve(&session, "  \n").unwrap_err();
    assert!(matches!(err, WorkflowError::EmptyFinalText));

    assert_eq!(workflow.store().count(), 0);
    assert!(!dir.path().join("final_output.txt").exists());
}

#[test]
fn failed_export_stores_no_final_version() {
    let (dir, embedder) = setup();
    // The export target is a directory, so writing it fails
    let blocked = dir.path().join("blocked");
    std::fs::create_dir_all(&blocked).unwrap();
    let workflow = Workflow::new(
        Box::new(FakeFetcher { fail: false }),
        Box::new(FakeModel { fail: false }),
        Narrator::new(Box::new(SilentEngine), dir.path().join("audio")),
        VersionStore::open(dir.path().join("versions"), &embedder).unwrap(),
        &embedder,
        blocked,
    );

    let err = workflow.approve(&Session::new(false), "Final text.").unwrap_err();
    assert!(matches!(err, WorkflowError::Export { .. }));
    assert!(!err.is_validation());
    assert_eq!(workflow.store().count(), 0);
}

#[test]
fn blank_text_saves_and_lists_verbatim() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);
    workflow
        .save(VersionKind::Reviewed, "   ", VersionMetadata::default())
        .unwrap();
    workflow
        .save(VersionKind::Original, "The reef at dawn.", VersionMetadata::default())
        .unwrap();

    let all = workflow.versions().unwrap();
    assert_eq!(all[0].text, "   ");

    let results = workflow.search("reef", 5).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].version.text, "The reef at dawn.");
    assert_eq!(results[1].score, 0.0);
}

#[tokio::test]
async fn fetch_failure_keeps_previous_chapter() {
    let (dir, embedder) = setup();
    let good = workflow(dir.path().join("good").as_path(), &embedder, false, false);
    let mut session = Session::new(true);
    good.scrape(&mut session, CHAPTER_URL).await.unwrap();
    drop(good);

    let failing = workflow(dir.path().join("bad").as_path(), &embedder, true, false);
    let err = failing.scrape(&mut session, "https://example.org/other").await.unwrap_err();
    assert!(matches!(err, WorkflowError::Fetch(_)));
    assert!(!err.is_validation());
    assert_eq!(session.chapter.as_ref().unwrap().url, CHAPTER_URL);
    assert_eq!(failing.store().count(), 0);
}

#[tokio::test]
async fn model_failure_surfaces_and_saves_nothing() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, true);
    let mut session = Session::new(true);
    workflow.scrape(&mut session, CHAPTER_URL).await.unwrap();

    let err = workflow
        .rewrite(&mut session, Style::Formal, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Agent(AgentError::RequestFailed(_))));
    assert!(session.rewritten.is_none());
    // Only the auto-saved original
    assert_eq!(workflow.store().count(), 1);
}

#[tokio::test]
async fn reset_clears_stage_outputs() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);
    let mut session = Session::new(true);
    workflow.scrape(&mut session, CHAPTER_URL).await.unwrap();
    workflow
        .rewrite(&mut session, Style::Formal, Some("joyful"))
        .await
        .unwrap();

    session.reset();
    assert!(session.chapter.is_none());
    assert!(session.rewritten.is_none());
    assert!(session.tone.is_none());
    assert_eq!(session.draft(), "");
    assert!(session.auto_save);
}

#[tokio::test]
async fn search_is_bounded_and_scored() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);
    for text in [
        "The storm broke over the reef.",
        "A quiet morning in the village.",
        "Merchants argued about copra prices.",
        "The canoe drifted past the reef.",
        "Children played on the beach.",
    ] {
        workflow
            .save(VersionKind::Original, text, VersionMetadata::default())
            .unwrap();
    }

    let results = workflow.search("storm over the reef", 3).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
    assert_eq!(results[0].version.text, "The storm broke over the reef.");

    assert!(matches!(workflow.search("   ", 3), Err(WorkflowError::EmptyQuery)));
    assert!(matches!(workflow.search("reef", 0), Err(WorkflowError::InvalidTopK)));
    assert!(matches!(
        workflow.keyword_search("reef", 0),
        Err(WorkflowError::InvalidTopK)
    ));
}

#[tokio::test]
async fn search_on_empty_store_is_informational() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);
    assert!(workflow.search("anything", 3).unwrap().is_empty());
}

#[test]
fn compare_reports_identical_and_changed_versions() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);
    let a = workflow
        .save(VersionKind::Reviewed, "Hello world", VersionMetadata::default())
        .unwrap();
    let b = workflow
        .save(VersionKind::Final, "Hello brave world", VersionMetadata::default())
        .unwrap();
    let c = workflow
        .save(VersionKind::Final, "Hello world", VersionMetadata::default())
        .unwrap();

    assert_eq!(workflow.compare(&a.id, &c.id).unwrap(), Comparison::Identical);

    match workflow.compare(&a.id, &b.id).unwrap() {
        Comparison::Diff(diff) => {
            assert!(diff.contains("--- Version A"));
            assert!(diff.contains("+++ Version B"));
            assert!(diff.contains("+Hello brave world"));
        }
        Comparison::Identical => panic!("expected a diff"),
    }

    let err = workflow.compare(&a.id, "missing").unwrap_err();
    assert!(matches!(err, WorkflowError::VersionNotFound(id) if id == "missing"));
}

#[test]
fn keyword_search_uses_index_or_scan() {
    let (dir, embedder) = setup();
    let index = SearchIndex::open(dir.path().join("search_index")).unwrap();
    let indexed = workflow(dir.path(), &embedder, false, false).with_index(index);
    let saved = indexed
        .save(VersionKind::Final, "The lagoon shimmered.", VersionMetadata::default())
        .unwrap();
    let hits = indexed.keyword_search("lagoon", 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, saved.id);
    assert!(matches!(
        indexed.keyword_search("lagoon", 0),
        Err(WorkflowError::InvalidTopK)
    ));
    drop(indexed);

    let other = TempDir::new().unwrap();
    let plain = workflow(other.path(), &embedder, false, false);
    plain
        .save(VersionKind::Original, "Copra prices rose.", VersionMetadata::default())
        .unwrap();
    assert_eq!(plain.keyword_search("copra", 5).unwrap().len(), 1);
    assert!(plain.keyword_search("lagoon", 5).unwrap().is_empty());
}

#[tokio::test]
async fn narration_validates_and_never_overwrites() {
    let (dir, embedder) = setup();
    let workflow = workflow(dir.path(), &embedder, false, false);

    for text in ["", "   "] {
        let err = workflow.narrate(text).await.unwrap_err();
        assert!(err.is_validation());
    }

    let first = workflow.narrate("hello").await.unwrap();
    let second = workflow.narrate("hello").await.unwrap();
    assert_ne!(first, second);
    assert!(first.starts_with(dir.path().join("audio")));
    assert!(second.exists());
}
