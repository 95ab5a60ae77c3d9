use archivist_client::WaybackClient;
use archivist_core::{ArchiveConfig, CaptureOrchestrator, TaskConsumer, TaskDispatcher};
use archivist_db::{ArchiveTaskRepository, Database, EntryRepository};

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub wayback: WaybackClient,
    pub archive_config: ArchiveConfig,
    /// Bearer token required on every non-public route.
    pub api_key: String,
}

impl AppState {
    /// Consumer wired to the Wayback client and the entry table.
    pub fn consumer(&self) -> TaskConsumer<WaybackClient, EntryRepository> {
        let orchestrator =
            CaptureOrchestrator::new(self.wayback.clone(), self.archive_config.clone());
        TaskConsumer::new(orchestrator, self.db.entry_repo())
    }

    pub fn dispatcher(&self) -> TaskDispatcher<EntryRepository, ArchiveTaskRepository> {
        TaskDispatcher::new(self.db.entry_repo(), self.db.task_repo())
    }
}
