pub mod classify;
pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod error;
pub mod freshness;
pub mod models;
pub mod orchestrator;
pub mod poller;
pub mod report;
pub mod status;
pub mod task;
pub mod task_queue;
pub mod traits;
pub mod worker;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::ArchiveConfig;
pub use consumer::{TaskConsumer, TaskOutcome, TaskResponse};
pub use dispatch::TaskDispatcher;
pub use error::AppError;
pub use models::{ArchiveRequest, ArchiveResult, Entry, Link};
pub use orchestrator::CaptureOrchestrator;
pub use task::{ArchiveTask, RetryConfig, TaskStatus, WorkerConfig};
pub use task_queue::TaskQueue;
pub use traits::{CaptureApi, EntryStore};
