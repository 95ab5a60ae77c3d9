use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use archivist_core::task::TaskStatus;
use archivist_core::task_queue::TaskQueue;

use crate::integration::common::{TEST_API_KEY, TestApp, setup_test_app};

fn authed(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TEST_API_KEY}"));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

fn e1_body() -> serde_json::Value {
    json!({
        "title": "Test entry",
        "links": [{ "linkText": "Example", "href": "http://example.com" }]
    })
}

fn e1_task() -> serde_json::Value {
    json!({ "url": "http://example.com", "id": "E1", "linkIndex": 0 })
}

async fn mount_never_archived(app: &TestApp) {
    Mock::given(method("GET"))
        .and(path("/wayback/available"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "archived_snapshots": {} })))
        .mount(&app.wayback)
        .await;
}

async fn mount_job(app: &TestApp, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/save"))
        .and(body_string_contains("url=http%3A%2F%2Fexample.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": job_id })))
        .mount(&app.wayback)
        .await;
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = send(
        &app,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn openapi_document_is_public() {
    let app = setup_test_app().await;

    let (status, json) = send(
        &app,
        Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/tasks/archive"].is_object());
    assert!(json["paths"]["/v1/entries/{id}"].is_object());
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let (status, json) = send(
        &app,
        Request::get("/v1/tasks").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app().await;

    let request = Request::post("/tasks/archive")
        .header("authorization", "Bearer wrong-key")
        .header("content-type", "application/json")
        .body(Body::from(e1_task().to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Entries and dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn put_entry_enqueues_new_links_once() {
    let app = setup_test_app().await;

    let (status, json) = send(&app, authed("PUT", "/v1/entries/E1", Some(e1_body()))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["enqueued"], json!([e1_task()]));
    assert_eq!(json["entry"]["links"][0]["archiveTaskQueued"], true);

    // Saving the same entry again must not queue a second task.
    let (status, json) = send(&app, authed("PUT", "/v1/entries/E1", Some(e1_body()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["enqueued"], json!([]));

    let repo = app.db.task_repo();
    assert_eq!(repo.count_by_status(TaskStatus::Pending).await.unwrap(), 1);
}

#[tokio::test]
async fn get_missing_entry_returns_404() {
    let app = setup_test_app().await;

    let (status, json) = send(&app, authed("GET", "/v1/entries/nope", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn list_tasks_filters_and_validates_status() {
    let app = setup_test_app().await;
    send(&app, authed("PUT", "/v1/entries/E1", Some(e1_body()))).await;

    let (status, json) = send(&app, authed("GET", "/v1/tasks?status=pending", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["tasks"][0]["entry_id"], "E1");
    assert_eq!(json["tasks"][0]["link_index"], 0);

    let (status, json) = send(&app, authed("GET", "/v1/tasks?status=completed", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);

    let (status, json) = send(&app, authed("GET", "/v1/tasks?status=bogus", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

// ---------------------------------------------------------------------------
// Archive consumer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn archive_task_end_to_end() {
    let app = setup_test_app().await;
    send(&app, authed("PUT", "/v1/entries/E1", Some(e1_body()))).await;

    mount_never_archived(&app).await;
    mount_job(&app, "J1").await;
    Mock::given(method("GET"))
        .and(path("/save/status/J1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .up_to_n_times(1)
        .mount(&app.wayback)
        .await;
    Mock::given(method("GET"))
        .and(path("/save/status/J1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "success", "timestamp": "20240101000000" })),
        )
        .mount(&app.wayback)
        .await;

    let (status, json) = send(&app, authed("POST", "/tasks/archive", Some(e1_task()))).await;

    let expected = "https://web.archive.org/web/20240101000000/http://example.com";
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "success": true, "archiveUrl": expected }));

    let (status, json) = send(&app, authed("GET", "/v1/entries/E1", None)).await;
    assert_eq!(status, StatusCode::OK);
    let link = &json["links"][0];
    assert_eq!(link["archiveHref"], expected);
    assert!(link.get("archiveTaskQueued").is_none());
    assert_eq!(link["linkText"], "Example");
}

#[tokio::test]
async fn fresh_snapshot_is_reused_without_submission() {
    let app = setup_test_app().await;
    send(&app, authed("PUT", "/v1/entries/E1", Some(e1_body()))).await;

    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
    let snapshot_url = format!("http://web.archive.org/web/{timestamp}/http://example.com/");
    Mock::given(method("GET"))
        .and(path("/wayback/available"))
        .and(query_param("url", "http://example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "archived_snapshots": {
                "closest": {
                    "timestamp": timestamp,
                    "status": "200",
                    "available": true,
                    "url": snapshot_url
                }
            }
        })))
        .mount(&app.wayback)
        .await;
    Mock::given(method("POST"))
        .and(path("/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "unused" })))
        .expect(0)
        .mount(&app.wayback)
        .await;

    let (status, json) = send(&app, authed("POST", "/tasks/archive", Some(e1_task()))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["archiveUrl"], snapshot_url);
}

#[tokio::test]
async fn terminal_capture_failure_is_done() {
    let app = setup_test_app().await;
    send(&app, authed("PUT", "/v1/entries/E1", Some(e1_body()))).await;

    mount_never_archived(&app).await;
    mount_job(&app, "J2").await;
    Mock::given(method("GET"))
        .and(path("/save/status/J2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "status_ext": "error:blocked-url",
            "message": "This URL is in the Wayback Machine block list."
        })))
        .mount(&app.wayback)
        .await;

    let (status, json) = send(&app, authed("POST", "/tasks/archive", Some(e1_task()))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["retryable"], false);
    assert!(json["error"].as_str().unwrap().contains("error:blocked-url"));

    // The link keeps its claim and gets no archive URL.
    let (_, entry) = send(&app, authed("GET", "/v1/entries/E1", None)).await;
    assert!(entry["links"][0].get("archiveHref").is_none());
}

#[tokio::test]
async fn retryable_capture_failure_asks_for_redelivery() {
    let app = setup_test_app().await;
    send(&app, authed("PUT", "/v1/entries/E1", Some(e1_body()))).await;

    mount_never_archived(&app).await;
    mount_job(&app, "J3").await;
    Mock::given(method("GET"))
        .and(path("/save/status/J3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "status_ext": "error:service-unavailable"
        })))
        .mount(&app.wayback)
        .await;

    let (status, json) = send(&app, authed("POST", "/tasks/archive", Some(e1_task()))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "redeliver");
    assert!(json["message"].as_str().unwrap().contains("error:service-unavailable"));
}

#[tokio::test]
async fn archive_for_missing_entry_is_done_with_error() {
    let app = setup_test_app().await;

    mount_never_archived(&app).await;
    mount_job(&app, "J4").await;
    Mock::given(method("GET"))
        .and(path("/save/status/J4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "success", "timestamp": "20240101000000" })),
        )
        .mount(&app.wayback)
        .await;

    let (status, json) = send(&app, authed("POST", "/tasks/archive", Some(e1_task()))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(
        json["archiveUrl"],
        "https://web.archive.org/web/20240101000000/http://example.com"
    );
    assert!(json["error"].as_str().unwrap().contains("E1"));
}

#[tokio::test]
async fn malformed_task_payload_is_rejected() {
    let app = setup_test_app().await;

    let (status, _) = send(
        &app,
        authed("POST", "/tasks/archive", Some(json!({ "url": "http://example.com" }))),
    )
    .await;

    assert!(status.is_client_error());
}
