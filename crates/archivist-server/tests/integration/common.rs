use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use wiremock::MockServer;

use archivist_client::{WaybackClient, WaybackConfig};
use archivist_core::ArchiveConfig;
use archivist_db::Database;
use archivist_server::routes;
use archivist_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

/// Router wired to a throwaway Postgres and a mock Wayback Machine.
///
/// The container must stay alive for the test duration.
pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub wayback: MockServer,
    _container: ContainerAsync<GenericImage>,
}

pub async fn setup_test_app() -> TestApp {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "archivist_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let url = format!("postgresql://postgres:postgres@{host}:{port}/archivist_test");
    let pool = retry_connect(&url).await;

    let db = Database::from_pool(pool);
    db.migrate().await.expect("Failed to run migrations");

    let wayback = MockServer::start().await;
    let client = WaybackClient::new(
        &WaybackConfig::new("access", "secret").with_base_url(&wayback.uri()),
    )
    .expect("Failed to build Wayback client");

    let archive_config = ArchiveConfig::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_deadline(Duration::from_secs(5));

    let state = Arc::new(AppState {
        db: db.clone(),
        wayback: client,
        archive_config,
        api_key: TEST_API_KEY.to_string(),
    });

    TestApp {
        router: routes::router(state),
        db,
        wayback,
        _container: container,
    }
}

async fn retry_connect(url: &str) -> PgPool {
    for _ in 0..30 {
        if let Ok(pool) = PgPoolOptions::new().max_connections(5).connect(url).await {
            return pool;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to test database");
}
