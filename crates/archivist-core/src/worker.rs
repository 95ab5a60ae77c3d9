use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::consumer::{TaskConsumer, TaskResponse};
use crate::error::AppError;
use crate::report::{ArchiveReporter, TracingArchiveReporter};
use crate::task::{ArchiveTask, WorkerConfig};
use crate::task_queue::TaskQueue;
use crate::traits::{CaptureApi, EntryStore};

/// Events emitted by the worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
    },
    Polling,
    TaskClaimed {
        task: &'a ArchiveTask,
    },
    TaskCompleted {
        task_id: Uuid,
        success: bool,
    },
    TaskRedelivered {
        task_id: Uuid,
        reason: &'a str,
        will_retry: bool,
    },
    ShuttingDown {
        worker_id: &'a str,
        tasks_released: u64,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::info!(%worker_id, "Worker started");
            }
            WorkerEvent::Polling => {
                tracing::debug!("Polling for archive tasks");
            }
            WorkerEvent::TaskClaimed { task } => {
                tracing::info!(
                    task_id = %task.id,
                    entry_id = %task.entry_id,
                    link_index = task.link_index,
                    attempt = task.attempts,
                    "Task claimed"
                );
            }
            WorkerEvent::TaskCompleted { task_id, success } => {
                tracing::info!(%task_id, %success, "Task completed");
            }
            WorkerEvent::TaskRedelivered {
                task_id,
                reason,
                will_retry,
            } => {
                tracing::warn!(%task_id, %reason, %will_retry, "Task asked for redelivery");
            }
            WorkerEvent::ShuttingDown {
                worker_id,
                tasks_released,
            } => {
                tracing::info!(%worker_id, %tasks_released, "Worker shutting down");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// Worker that delivers queued archive tasks to a [`TaskConsumer`].
///
/// Plays the part of the task system: a `Done` response completes the task,
/// `Redeliver` schedules another delivery until the attempt budget runs out.
pub struct WorkerService<Q, A, S, R = TracingArchiveReporter>
where
    Q: TaskQueue,
    A: CaptureApi,
    S: EntryStore,
    R: ArchiveReporter,
{
    queue: Q,
    consumer: TaskConsumer<A, S, R>,
    config: WorkerConfig,
}

impl<Q, A, S, R> WorkerService<Q, A, S, R>
where
    Q: TaskQueue,
    A: CaptureApi,
    S: EntryStore,
    R: ArchiveReporter,
{
    pub fn new(queue: Q, consumer: TaskConsumer<A, S, R>, config: WorkerConfig) -> Self {
        Self {
            queue,
            consumer,
            config,
        }
    }

    /// Run the worker loop until cancellation.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<(), AppError> {
        reporter.report(WorkerEvent::Started {
            worker_id: &self.config.worker_id,
        });

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            reporter.report(WorkerEvent::Polling);

            match self.queue.claim_task(&self.config.worker_id).await {
                Ok(Some(task)) => {
                    reporter.report(WorkerEvent::TaskClaimed { task: &task });
                    self.process_task(&task, reporter).await;
                }
                Ok(None) => {
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim task");
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval * 2) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
            }
        }

        let released = self
            .queue
            .release_worker_tasks(&self.config.worker_id)
            .await
            .unwrap_or(0);

        reporter.report(WorkerEvent::ShuttingDown {
            worker_id: &self.config.worker_id,
            tasks_released: released,
        });
        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.config.worker_id,
        });

        Ok(())
    }

    pub(crate) async fn process_task<WR: WorkerReporter>(&self, task: &ArchiveTask, reporter: &WR) {
        match self.consumer.handle(&task.request()).await {
            TaskResponse::Done(outcome) => {
                reporter.report(WorkerEvent::TaskCompleted {
                    task_id: task.id,
                    success: outcome.success,
                });
                if let Err(e) = self.queue.complete_task(task.id).await {
                    tracing::error!(task_id = %task.id, error = %e, "Failed to mark task completed");
                }
            }
            TaskResponse::Redeliver { reason } => {
                let will_retry = task.can_redeliver_within(&self.config.retry_config);
                reporter.report(WorkerEvent::TaskRedelivered {
                    task_id: task.id,
                    reason: &reason,
                    will_retry,
                });

                let next_retry = will_retry
                    .then(|| task.calculate_next_retry(&self.config.retry_config));

                if let Err(e) = self.queue.fail_task(task.id, &reason, next_retry).await {
                    tracing::error!(task_id = %task.id, error = %e, "Failed to record task failure");
                }
            }
        }
    }
}
