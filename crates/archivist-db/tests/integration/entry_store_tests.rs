use archivist_core::error::AppError;
use archivist_core::models::{Entry, Link};
use archivist_core::traits::EntryStore;

use crate::integration::common::setup_test_db;

const ARCHIVE_URL: &str = "https://web.archive.org/web/20240101000000/http://a.example";

fn entry(links: Vec<Link>) -> Entry {
    Entry {
        id: "E1".to_string(),
        title: "Reading list".to_string(),
        links,
    }
}

fn two_links() -> Entry {
    entry(vec![
        Link::new("A", "http://a.example"),
        Link::new("B", "http://b.example"),
    ])
}

#[tokio::test]
async fn upsert_and_get_entry() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();

    let stored = repo.upsert_entry(two_links()).await.unwrap();
    let fetched = repo.get_entry("E1").await.unwrap().expect("Entry should exist");

    assert_eq!(stored, fetched);
    assert_eq!(fetched.links.len(), 2);
    assert_eq!(fetched.links[1].href, "http://b.example");
}

#[tokio::test]
async fn get_missing_entry_returns_none() {
    let (db, _container) = setup_test_db().await;
    assert!(db.entry_repo().get_entry("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn claim_is_compare_and_set() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();
    repo.upsert_entry(two_links()).await.unwrap();

    let first = repo.claim_links("E1", &[0, 1]).await.unwrap();
    let second = repo.claim_links("E1", &[0, 1]).await.unwrap();

    assert_eq!(first, vec![0, 1]);
    assert!(second.is_empty());
    let stored = repo.get_entry("E1").await.unwrap().unwrap();
    assert!(stored.links.iter().all(Link::is_queued));
}

#[tokio::test]
async fn concurrent_claims_hand_each_link_out_once() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();
    repo.upsert_entry(two_links()).await.unwrap();

    let (a, b) = tokio::join!(repo.claim_links("E1", &[0, 1]), repo.claim_links("E1", &[0, 1]));

    let mut all: Vec<usize> = a.unwrap().into_iter().chain(b.unwrap()).collect();
    all.sort_unstable();
    assert_eq!(all, vec![0, 1]);
}

#[tokio::test]
async fn claim_on_missing_entry_fails() {
    let (db, _container) = setup_test_db().await;
    let err = db.entry_repo().claim_links("nope", &[0]).await.unwrap_err();
    assert!(matches!(err, AppError::EntryNotFound(_)));
}

#[tokio::test]
async fn release_clears_queued_flag() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();
    repo.upsert_entry(two_links()).await.unwrap();
    repo.claim_links("E1", &[0, 1]).await.unwrap();

    repo.release_links("E1", &[1]).await.unwrap();

    let stored = repo.get_entry("E1").await.unwrap().unwrap();
    assert!(stored.links[0].is_queued());
    assert!(stored.links[1].needs_archive());
}

#[tokio::test]
async fn set_link_archive_touches_one_link() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();
    repo.upsert_entry(two_links()).await.unwrap();
    repo.claim_links("E1", &[0, 1]).await.unwrap();

    repo.set_link_archive("E1", 0, "http://a.example", ARCHIVE_URL).await.unwrap();

    let stored = repo.get_entry("E1").await.unwrap().unwrap();
    assert_eq!(stored.links[0].archive_href.as_deref(), Some(ARCHIVE_URL));
    assert_eq!(stored.links[0].archive_task_queued, None);
    assert_eq!(stored.links[0].link_text, "A");
    assert!(stored.links[1].is_queued());
    assert!(stored.links[1].archive_href.is_none());
}

#[tokio::test]
async fn concurrent_sibling_updates_both_land() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();
    repo.upsert_entry(two_links()).await.unwrap();
    repo.claim_links("E1", &[0, 1]).await.unwrap();

    let b_url = "https://web.archive.org/web/20240101000000/http://b.example";
    let (a, b) = tokio::join!(
        repo.set_link_archive("E1", 0, "http://a.example", ARCHIVE_URL),
        repo.set_link_archive("E1", 1, "http://b.example", b_url),
    );
    a.unwrap();
    b.unwrap();

    let stored = repo.get_entry("E1").await.unwrap().unwrap();
    assert_eq!(stored.links[0].archive_href.as_deref(), Some(ARCHIVE_URL));
    assert_eq!(stored.links[1].archive_href.as_deref(), Some(b_url));
    assert!(stored.links.iter().all(|l| !l.is_queued()));
}

#[tokio::test]
async fn set_link_archive_reports_missing_targets() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();
    repo.upsert_entry(two_links()).await.unwrap();

    let err = repo.set_link_archive("E1", 2, "http://a.example", ARCHIVE_URL).await.unwrap_err();
    assert!(matches!(err, AppError::LinkNotFound { link_index: 2, .. }));

    let err = repo.set_link_archive("E9", 0, "http://a.example", ARCHIVE_URL).await.unwrap_err();
    assert!(matches!(err, AppError::EntryNotFound(_)));
}

#[tokio::test]
async fn set_link_archive_skips_edited_link() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();
    repo.upsert_entry(two_links()).await.unwrap();
    repo.claim_links("E1", &[0, 1]).await.unwrap();

    // Link A was edited to a new URL after its task was queued.
    let edited = entry(vec![
        Link::new("A", "http://a2.example"),
        Link::new("B", "http://b.example"),
    ]);
    repo.upsert_entry(edited).await.unwrap();

    let err = repo
        .set_link_archive("E1", 0, "http://a.example", ARCHIVE_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::LinkChanged { link_index: 0, .. }));
    assert!(!err.is_retryable());

    let stored = repo.get_entry("E1").await.unwrap().unwrap();
    assert_eq!(stored.links[0].href, "http://a2.example");
    assert!(stored.links[0].archive_href.is_none());
}

#[tokio::test]
async fn upsert_keeps_archive_state_of_unchanged_links() {
    let (db, _container) = setup_test_db().await;
    let repo = db.entry_repo();
    repo.upsert_entry(two_links()).await.unwrap();
    repo.claim_links("E1", &[0, 1]).await.unwrap();
    repo.set_link_archive("E1", 0, "http://a.example", ARCHIVE_URL).await.unwrap();

    // Editor re-saves with link B replaced and a new link C, without archive fields.
    let edited = entry(vec![
        Link::new("A", "http://a.example"),
        Link::new("B2", "http://b2.example"),
        Link::new("C", "http://c.example"),
    ]);
    let stored = repo.upsert_entry(edited).await.unwrap();

    assert_eq!(stored.links[0].archive_href.as_deref(), Some(ARCHIVE_URL));
    assert!(stored.links[1].needs_archive());
    assert!(stored.links[2].needs_archive());
    assert_eq!(repo.get_entry("E1").await.unwrap().unwrap(), stored);
}
