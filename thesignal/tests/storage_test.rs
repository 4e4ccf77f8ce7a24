use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use thesignal::model::{CandidateItem, Category, RunOutcome, RunStatus, ScoredItem};
use thesignal::storage::{RunLogRecorder, SqliteStore, StoryStore};

async fn setup_store() -> SqliteStore {
    // A single connection keeps every query on the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteStore::new(pool);
    store.ensure_schema().await.unwrap();
    store
}

fn scored(url: &str, score: f64, category: Category, published_days_ago: Option<i64>) -> ScoredItem {
    ScoredItem {
        item: CandidateItem {
            title: format!("Story {url}"),
            url: url.into(),
            source_domain: "example.com".into(),
            raw_content: "content".into(),
            published_at: published_days_ago.map(|d| Utc::now() - Duration::days(d)),
            author_handle: Some("karpathy".into()),
            image_url: None,
        },
        score,
        summary_bullets: vec!["first".into(), "second".into()],
        category,
    }
}

#[tokio::test]
async fn insert_skips_existing_urls_and_counts_inserted() {
    let store = setup_store().await;

    let first = store
        .insert_scored_items(&[
            scored("https://a", 8.0, Category::Research, Some(0)),
            scored("https://b", 6.0, Category::Industry, Some(0)),
        ])
        .await
        .unwrap();
    assert_eq!(first, 2);

    let second = store
        .insert_scored_items(&[
            scored("https://b", 9.0, Category::Industry, Some(0)),
            scored("https://c", 7.0, Category::AiSafety, None),
        ])
        .await
        .unwrap();
    assert_eq!(second, 1);

    let urls = store.list_existing_urls().await.unwrap();
    assert_eq!(urls.len(), 3);
    assert!(urls.contains("https://c"));
    assert_eq!(store.count_stories().await.unwrap(), 3);
}

#[tokio::test]
async fn empty_insert_is_a_no_op() {
    let store = setup_store().await;
    assert_eq!(store.insert_scored_items(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn recent_stories_filters_window_and_category() {
    let store = setup_store().await;
    store
        .insert_scored_items(&[
            scored("https://old", 10.0, Category::Research, Some(10)),
            scored("https://top", 9.0, Category::Research, Some(1)),
            scored("https://undated", 7.0, Category::Research, None),
            scored("https://policy", 8.0, Category::AiPolicy, Some(0)),
        ])
        .await
        .unwrap();

    let all = store.recent_stories(None, 10, Duration::days(3)).await.unwrap();
    let urls: Vec<&str> = all.iter().map(|s| s.url.as_str()).collect();
    // Undated stories count by fetch time; ordering is by score
    assert_eq!(urls, vec!["https://top", "https://policy", "https://undated"]);
    assert_eq!(all[0].summary_bullets, vec!["first", "second"]);
    assert_eq!(all[0].author_handle.as_deref(), Some("karpathy"));

    let research = store
        .recent_stories(Some(Category::Research), 10, Duration::days(3))
        .await
        .unwrap();
    assert_eq!(research.len(), 2);
    assert!(research.iter().all(|s| s.category == Category::Research));

    let limited = store.recent_stories(None, 1, Duration::days(3)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn legacy_plain_summary_reads_as_one_bullet() {
    let store = setup_store().await;
    sqlx::query(
        "INSERT INTO stories (url, title, source_domain, raw_content, summary, score, category, fetched_at) \
         VALUES ('https://legacy', 'Legacy', 'example.com', 'raw', 'A plain text summary.', 6.0, 'Industry', ?)",
    )
    .bind(Utc::now())
    .execute(store.pool())
    .await
    .unwrap();

    let stories = store.recent_stories(None, 10, Duration::days(3)).await.unwrap();
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].summary_bullets, vec!["A plain text summary."]);
    assert_eq!(stories[0].category, Category::Industry);
}

#[tokio::test]
async fn run_log_keeps_latest_entry() {
    let store = setup_store().await;
    assert!(store.latest_run_log().await.unwrap().is_none());

    store.append_run_log(&RunOutcome::success(4)).await.unwrap();
    store
        .append_run_log(&RunOutcome::error("all 2 search queries failed: timeout"))
        .await
        .unwrap();

    let latest = store.latest_run_log().await.unwrap().unwrap();
    assert_eq!(latest.status, RunStatus::Error);
    assert_eq!(latest.stories_found, 0);
    assert_eq!(latest.error.as_deref(), Some("all 2 search queries failed: timeout"));
}

#[tokio::test]
async fn ensure_schema_is_idempotent() {
    let store = setup_store().await;
    store.ensure_schema().await.unwrap();
    assert_eq!(store.count_stories().await.unwrap(), 0);
}
