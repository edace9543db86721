// tests/summarize.rs
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use reddit_digest::analyze::ai_adapter::MockService;
use reddit_digest::analyze::{build_batch_content, EMPTY_BODY_PLACEHOLDER};
use reddit_digest::ingest::types::{Comment, Item};
use reddit_digest::{BatchSummarizer, ConfigStore};

fn store(dir: &tempfile::TempDir) -> Arc<ConfigStore> {
    Arc::new(
        ConfigStore::load_or_init(dir.path().join("sources.toml"), dir.path().join("prompt.txt"))
            .unwrap(),
    )
}

fn item(id: &str, body: &str, comments: Vec<Comment>) -> Item {
    Item {
        id: id.into(),
        title: format!("Title {id}"),
        body: body.into(),
        url: String::new(),
        score: 42,
        comment_count: comments.len() as u64,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        source: "rust".into(),
        permalink: format!("/r/rust/comments/{id}/"),
        comments,
    }
}

fn comment(author: &str, score: i64) -> Comment {
    Comment {
        author: author.into(),
        body: format!("comment by {author}"),
        score,
    }
}

#[tokio::test]
async fn empty_batch_skips_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockService::fixed("unused"));
    let s = BatchSummarizer::new(mock.clone(), store(&dir));

    assert_eq!(s.summarize(&[]).await.unwrap(), None);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn prompt_is_system_and_batch_is_user_content() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = store(&dir);
    cfg.set_prompt("Summarize tersely.").unwrap();
    let mock = Arc::new(MockService::fixed("  digest text \n"));
    let s = BatchSummarizer::new(mock.clone(), cfg);

    let out = s.summarize(&[item("a", "hello", vec![])]).await.unwrap();
    assert_eq!(out.as_deref(), Some("digest text"));

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "Summarize tersely.");
    assert!(calls[0].1.starts_with("CONTENT TO ANALYZE:"));
    assert!(calls[0].1.contains("=== POST 1 of 1 ==="));
}

#[tokio::test]
async fn blank_answer_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let s = BatchSummarizer::new(Arc::new(MockService::fixed("   \n")), store(&dir));
    assert_eq!(s.summarize(&[item("a", "x", vec![])]).await.unwrap(), None);
}

#[tokio::test]
async fn service_failure_is_a_typed_error() {
    let dir = tempfile::tempdir().unwrap();
    let s = BatchSummarizer::new(
        Arc::new(MockService::fixed("ok").failing_when("Title boom")),
        store(&dir),
    );
    let err = s.summarize(&[item("boom", "x", vec![])]).await.unwrap_err();
    assert!(err.to_string().contains("boom"));
}

#[test]
fn content_lists_posts_in_order_with_top_comments() {
    let comments: Vec<Comment> = (0..12).map(|i| comment(&format!("u{i}"), i)).collect();
    let text = build_batch_content(&[item("a", "", comments), item("b", "real body", vec![])]);

    let a = text.find("=== POST 1 of 2 ===").unwrap();
    let b = text.find("=== POST 2 of 2 ===").unwrap();
    assert!(a < b);
    assert!(text.contains("POST TITLE: Title a"));
    assert!(text.contains("SUBREDDIT: r/rust"));
    assert!(text.contains("TIME: 2024-05-01 12:30 UTC"));
    assert!(text.contains(EMPTY_BODY_PLACEHOLDER));
    assert!(text.contains("real body"));

    // highest eight scores, descending
    assert!(text.contains("1. [↑11] u/u11: comment by u11"));
    assert!(text.contains("8. [↑4] u/u4: comment by u4"));
    assert!(!text.contains("u/u3:"));
}
