// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-size pool of pronunciation workers fed by a bounded queue.
//!
//! Intake pushes jobs through a [`JobQueue`]; `concurrency` tasks pull from
//! the shared receiver. Cancelling the pool's token stops new submissions,
//! lets the workers drain what is already queued, and gives them
//! `shutdown_grace` to finish before the remaining tasks are aborted. Jobs
//! that never ran stay `pending` in storage.

use std::sync::Arc;
use std::time::Duration;

use parlance_config::model::WorkerConfig;
use parlance_core::{ParlanceError, UnitOfWork};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::worker::{JobOutcome, PronunciationJob, PronunciationWorker};

/// Pool sizing and shutdown behavior.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub concurrency: usize,
    pub queue_capacity: usize,
    pub shutdown_grace: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            queue_capacity: config.queue_capacity,
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Sending half of the job queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<PronunciationJob>,
    cancel: CancellationToken,
}

impl JobQueue {
    /// A queue not attached to any pool; the caller owns the receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PronunciationJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                cancel: CancellationToken::new(),
            },
            rx,
        )
    }

    /// Enqueues a job, waiting for space when the queue is full.
    ///
    /// Fails once shutdown has begun.
    pub async fn submit(&self, job: PronunciationJob) -> Result<(), ParlanceError> {
        if self.cancel.is_cancelled() {
            return Err(ParlanceError::Internal(
                "worker pool is shutting down".into(),
            ));
        }
        let message_id = job.message_id.clone();
        self.tx
            .send(job)
            .await
            .map_err(|_| ParlanceError::Internal("worker pool has stopped".into()))?;
        debug!(message_id = %message_id, "pronunciation job queued");
        Ok(())
    }
}

/// What happened during [`WorkerPool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every worker finished within the grace period.
    pub drained: bool,
    /// Jobs still queued when the pool stopped.
    pub abandoned: usize,
}

/// Running pool of pronunciation workers.
pub struct WorkerPool {
    queue: JobQueue,
    rx: Arc<Mutex<mpsc::Receiver<PronunciationJob>>>,
    outcomes: broadcast::Sender<JobOutcome>,
    tasks: JoinSet<()>,
    cancel: CancellationToken,
    shutdown_grace: Duration,
}

impl WorkerPool {
    /// Spawns `settings.concurrency` workers. Cancelling `cancel` (or
    /// calling [`shutdown`](Self::shutdown)) begins the drain.
    pub fn start<U: UnitOfWork>(
        worker: PronunciationWorker<U>,
        settings: &PoolSettings,
        cancel: CancellationToken,
    ) -> Self {
        let capacity = settings.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let (outcomes, _) = broadcast::channel(capacity);

        let mut tasks = JoinSet::new();
        for worker_id in 0..settings.concurrency.max(1) {
            tasks.spawn(run_worker(
                worker_id,
                worker.clone(),
                Arc::clone(&rx),
                outcomes.clone(),
                cancel.clone(),
            ));
        }
        info!(
            concurrency = settings.concurrency.max(1),
            queue_capacity = capacity,
            "worker pool started"
        );

        Self {
            queue: JobQueue {
                tx,
                cancel: cancel.clone(),
            },
            rx,
            outcomes,
            tasks,
            cancel,
            shutdown_grace: settings.shutdown_grace,
        }
    }

    pub fn queue(&self) -> JobQueue {
        self.queue.clone()
    }

    /// Outcomes of jobs finished after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobOutcome> {
        self.outcomes.subscribe()
    }

    /// Stops intake, drains the queue within the grace period, then aborts
    /// whatever is still running.
    pub async fn shutdown(mut self) -> ShutdownReport {
        self.cancel.cancel();
        info!(grace = ?self.shutdown_grace, "draining worker pool");

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !drained {
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }

        let abandoned = self.rx.lock().await.len();
        if drained && abandoned == 0 {
            info!("worker pool drained");
        } else {
            warn!(abandoned, "grace period elapsed, pending jobs left in storage");
        }
        ShutdownReport { drained, abandoned }
    }
}

async fn run_worker<U: UnitOfWork>(
    worker_id: usize,
    worker: PronunciationWorker<U>,
    rx: Arc<Mutex<mpsc::Receiver<PronunciationJob>>>,
    outcomes: broadcast::Sender<JobOutcome>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            if cancel.is_cancelled() {
                rx.try_recv().ok()
            } else {
                tokio::select! {
                    job = rx.recv() => job,
                    _ = cancel.cancelled() => rx.try_recv().ok(),
                }
            }
        };
        let Some(job) = next else {
            break;
        };
        let outcome = worker.process(job).await;
        // No subscribers is fine.
        let _ = outcomes.send(outcome);
    }
    debug!(worker_id, "worker stopped");
}
