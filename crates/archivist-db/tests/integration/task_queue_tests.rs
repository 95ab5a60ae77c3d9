use chrono::{TimeDelta, Utc};

use archivist_core::models::ArchiveRequest;
use archivist_core::task::TaskStatus;
use archivist_core::task_queue::TaskQueue;

use crate::integration::common::setup_test_db;

fn request(link_index: usize) -> ArchiveRequest {
    ArchiveRequest::new("http://example.com", "E1", link_index)
}

#[tokio::test]
async fn enqueue_and_verify_fields() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();

    let task = repo.enqueue(&request(0)).await.unwrap();

    assert_eq!(task.request(), request(0));
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.attempts, 0);
    assert_eq!(task.max_attempts, 10);
    assert!(task.worker_id.is_none());
}

#[tokio::test]
async fn enqueue_with_custom_max_attempts() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo().with_max_attempts(3);

    let task = repo.enqueue(&request(0)).await.unwrap();
    assert_eq!(task.max_attempts, 3);
}

#[tokio::test]
async fn enqueue_returns_existing_active_task() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();

    let first = repo.enqueue(&request(0)).await.unwrap();
    let again = repo.enqueue(&request(0)).await.unwrap();
    let other_link = repo.enqueue(&request(1)).await.unwrap();

    assert_eq!(first.id, again.id);
    assert_ne!(first.id, other_link.id);
    assert_eq!(repo.count_by_status(TaskStatus::Pending).await.unwrap(), 2);
}

#[tokio::test]
async fn enqueue_for_edited_link_url_creates_new_task() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();

    let old = repo.enqueue(&request(0)).await.unwrap();
    let edited = repo
        .enqueue(&ArchiveRequest::new("http://example.org/moved", "E1", 0))
        .await
        .unwrap();

    assert_ne!(old.id, edited.id);
    assert_eq!(edited.url, "http://example.org/moved");
    assert_eq!(repo.count_by_status(TaskStatus::Pending).await.unwrap(), 2);
}

#[tokio::test]
async fn enqueue_after_completion_creates_new_task() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();

    let first = repo.enqueue(&request(0)).await.unwrap();
    repo.complete_task(first.id).await.unwrap();
    let second = repo.enqueue(&request(0)).await.unwrap();

    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn claim_sets_running_and_counts_attempt() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();
    repo.enqueue(&request(0)).await.unwrap();

    let claimed = repo
        .claim_task("worker-1")
        .await
        .unwrap()
        .expect("Should claim the task");

    assert_eq!(claimed.status, TaskStatus::Running);
    assert_eq!(claimed.worker_id.as_deref(), Some("worker-1"));
    assert_eq!(claimed.attempts, 1);
    assert!(claimed.started_at.is_some());
}

#[tokio::test]
async fn claim_returns_none_when_empty() {
    let (db, _container) = setup_test_db().await;
    assert!(db.task_repo().claim_task("worker-1").await.unwrap().is_none());
}

#[tokio::test]
async fn claim_skips_running_tasks() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();
    repo.enqueue(&request(0)).await.unwrap();

    assert!(repo.claim_task("worker-1").await.unwrap().is_some());
    assert!(repo.claim_task("worker-2").await.unwrap().is_none());
}

#[tokio::test]
async fn complete_task_sets_completed() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();
    let task = repo.enqueue(&request(0)).await.unwrap();
    repo.claim_task("worker-1").await.unwrap();

    repo.complete_task(task.id).await.unwrap();

    let done = repo.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(done.worker_id.is_none());
}

#[tokio::test]
async fn fail_with_retry_requeues_after_delay() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();
    let task = repo.enqueue(&request(0)).await.unwrap();
    repo.claim_task("worker-1").await.unwrap();

    let retry_at = Utc::now() + TimeDelta::minutes(5);
    repo.fail_task(task.id, "Capture job failed: error:bad-gateway", Some(retry_at))
        .await
        .unwrap();

    let requeued = repo.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(requeued.status, TaskStatus::Pending);
    assert_eq!(requeued.attempts, 1);
    assert!(requeued.next_retry_at.is_some());
    assert_eq!(
        requeued.last_error.as_deref(),
        Some("Capture job failed: error:bad-gateway")
    );
    // Not due yet.
    assert!(repo.claim_task("worker-1").await.unwrap().is_none());
}

#[tokio::test]
async fn fail_with_past_retry_is_claimable_again() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();
    let task = repo.enqueue(&request(0)).await.unwrap();
    repo.claim_task("worker-1").await.unwrap();

    repo.fail_task(task.id, "timeout", Some(Utc::now() - TimeDelta::seconds(1)))
        .await
        .unwrap();

    let reclaimed = repo.claim_task("worker-2").await.unwrap().unwrap();
    assert_eq!(reclaimed.id, task.id);
    assert_eq!(reclaimed.attempts, 2);
}

#[tokio::test]
async fn fail_without_retry_is_final() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();
    let task = repo.enqueue(&request(0)).await.unwrap();
    repo.claim_task("worker-1").await.unwrap();

    repo.fail_task(task.id, "exhausted", None).await.unwrap();

    let failed = repo.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(repo.claim_task("worker-1").await.unwrap().is_none());
}

#[tokio::test]
async fn release_worker_tasks_requeues_running() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();
    repo.enqueue(&request(0)).await.unwrap();
    repo.enqueue(&request(1)).await.unwrap();
    repo.claim_task("worker-1").await.unwrap();
    repo.claim_task("worker-1").await.unwrap();

    let released = repo.release_worker_tasks("worker-1").await.unwrap();

    assert_eq!(released, 2);
    assert_eq!(repo.count_by_status(TaskStatus::Pending).await.unwrap(), 2);
    let tasks = repo.list_tasks(None, 10).await.unwrap();
    assert!(tasks.iter().all(|t| t.attempts == 0 && t.worker_id.is_none()));
}

#[tokio::test]
async fn list_tasks_filters_by_status() {
    let (db, _container) = setup_test_db().await;
    let repo = db.task_repo();
    let first = repo.enqueue(&request(0)).await.unwrap();
    repo.enqueue(&request(1)).await.unwrap();
    repo.complete_task(first.id).await.unwrap();

    let pending = repo.list_tasks(Some(TaskStatus::Pending), 10).await.unwrap();
    let completed = repo.list_tasks(Some(TaskStatus::Completed), 10).await.unwrap();
    let limited = repo.list_tasks(None, 1).await.unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].link_index, 1);
    assert_eq!(completed.len(), 1);
    assert_eq!(limited.len(), 1);
}
