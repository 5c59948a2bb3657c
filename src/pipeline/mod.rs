//! The migration pipeline
//!
//! A run moves through three stages connected by two bounded queues:
//!
//! ```text
//! producer ──▶ [pull queue] ──▶ N pull workers ──▶ [push queue] ──▶ M push workers
//!                                    │                                   │
//!                              pull completion                     push completion
//!                                    ▼                                   ▼
//!                           pull coordinator:                  push coordinator:
//!                           N signals, then close               M signals, then
//!                           the push queue                      return the report
//! ```
//!
//! The producer fills the pull queue completely and closes it before any
//! worker starts. Pull workers are competing consumers of that queue; each
//! one drops its push-queue sender and then sends exactly one completion
//! signal. The pull coordinator holds the last push-queue sender and drops
//! it only after all N signals, so push workers see the queue close exactly
//! when no more images can arrive. Both pools run at the same time.
//!
//! Per-image failures are logged and counted, never propagated: a run with
//! failed images still returns `Ok`.

pub mod config;
mod puller;
mod pusher;
pub mod stats;

pub use config::{PipelineConfig, QueueGranularity};
pub use stats::{MigrationReport, PullTally, PushTally};

use crate::common::RegistryClient;
use crate::error::{ClientError, Result};
use crate::image::{MigrationBatch, PullJob, RenamedImage, TargetMap};
use crate::registry::Authorizer;
use puller::PullWorker;
use pusher::PushWorker;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Receiving end of a queue shared by competing consumers
pub(crate) type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Take the next item, holding the lock only while waiting for it. Returns
/// `None` once the queue is closed and drained.
pub(crate) async fn next_item<T>(queue: &SharedReceiver<T>) -> Option<T> {
    queue.lock().await.recv().await
}

/// Run `call`, retrying transient failures up to `config.retries` times.
pub(crate) async fn with_retries<F, Fut>(config: &PipelineConfig, mut call: F) -> std::result::Result<(), ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), ClientError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < config.retries && e.is_transient() => {
                attempt += 1;
                tracing::warn!(attempt, max = config.retries, error = %e, "transient failure, retrying");
                tokio::time::sleep(config.backoff(attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Migrates every (repository, tag) pair of a batch exactly once
pub struct MigrationPipeline {
    client: Arc<dyn RegistryClient>,
    config: PipelineConfig,
}

impl MigrationPipeline {
    pub fn new(client: Arc<dyn RegistryClient>, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline and wait for it to drain.
    ///
    /// Only an invalid configuration or an unencodable source credential
    /// fails the call, and both are detected before any task is spawned.
    pub async fn migrate(
        &self,
        batch: MigrationBatch,
        target_auth: String,
        targets: TargetMap,
    ) -> Result<MigrationReport> {
        self.config.validate()?;
        let started = Instant::now();
        let pullers = self.config.pullers;
        let pushers = self.config.pushers;

        let source_auth: Arc<str> = Authorizer::encode(&batch.auth)?.into();
        let target_auth: Arc<str> = target_auth.into();
        let targets = Arc::new(targets);

        let jobs = self.produce(&batch).await;

        // Sized for every image so pull workers never wait on push workers
        let (push_tx, push_rx) = mpsc::channel::<RenamedImage>(batch.total_image_count.max(1));
        let push_rx = Arc::new(Mutex::new(push_rx));
        let (pull_done_tx, pull_done_rx) = mpsc::channel::<PullTally>(1);
        let (push_done_tx, push_done_rx) = mpsc::channel::<PushTally>(1);

        tracing::info!(
            repositories = batch.repositories.len(),
            images = batch.total_image_count,
            pullers,
            pushers,
            granularity = %self.config.granularity,
            "starting migration"
        );

        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(pullers + pushers);
        for id in 0..pullers {
            let worker = PullWorker {
                id,
                client: Arc::clone(&self.client),
                auth: Arc::clone(&source_auth),
                targets: Arc::clone(&targets),
                config: self.config.clone(),
                jobs: Arc::clone(&jobs),
                renamed: push_tx.clone(),
                done: pull_done_tx.clone(),
            };
            workers.push(tokio::spawn(worker.run()));
        }
        drop(pull_done_tx);
        drop(jobs);

        let pull_coordinator = tokio::spawn(wait_for_pullers(pull_done_rx, pullers, push_tx));

        for id in 0..pushers {
            let worker = PushWorker {
                id,
                client: Arc::clone(&self.client),
                auth: Arc::clone(&target_auth),
                config: self.config.clone(),
                images: Arc::clone(&push_rx),
                done: push_done_tx.clone(),
            };
            workers.push(tokio::spawn(worker.run()));
        }
        drop(push_done_tx);
        drop(push_rx);

        let push = wait_for_pushers(push_done_rx, pushers).await;

        let pull = match pull_coordinator.await {
            Ok(tally) => tally,
            Err(e) => {
                tracing::error!(error = %e, "pull coordinator failed");
                PullTally::default()
            }
        };

        // Every worker has signalled (or died) by now; joining only reaps them
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "worker task failed");
            }
        }

        let report = MigrationReport {
            repositories: batch.repositories.len(),
            images: batch.total_image_count,
            pull,
            push,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            pushed = report.push.pushed,
            failures = report.failures(),
            skipped = report.pull.skipped,
            "migration finished"
        );
        Ok(report)
    }

    /// Fill the pull queue with every job of the batch, in batch order, and
    /// close it. The queue holds exactly as many jobs as there are, so no
    /// send ever waits.
    async fn produce(&self, batch: &MigrationBatch) -> SharedReceiver<PullJob> {
        let jobs: Vec<PullJob> = batch
            .repositories
            .iter()
            .cloned()
            .map(Arc::new)
            .flat_map(|repository| match self.config.granularity {
                QueueGranularity::Repository => PullJob::per_repository(repository),
                QueueGranularity::Tag => PullJob::per_tag(repository),
            })
            .collect();

        let (tx, rx) = mpsc::channel(jobs.len().max(1));
        for job in jobs {
            // rx is alive in this scope, so the queue cannot be closed
            if tx.send(job).await.is_err() {
                break;
            }
        }
        drop(tx);

        Arc::new(Mutex::new(rx))
    }
}

/// Wait for all pull workers, then close the push queue by dropping its
/// last sender.
async fn wait_for_pullers(
    mut done: mpsc::Receiver<PullTally>,
    pullers: usize,
    push_queue: mpsc::Sender<RenamedImage>,
) -> PullTally {
    let mut total = PullTally::default();
    for received in 0..pullers {
        match done.recv().await {
            Some(tally) => total += tally,
            None => {
                tracing::error!(received, expected = pullers, "pull workers exited without signalling");
                break;
            }
        }
    }

    drop(push_queue);
    tracing::debug!("all pullers finished, push queue closed");
    total
}

async fn wait_for_pushers(mut done: mpsc::Receiver<PushTally>, pushers: usize) -> PushTally {
    let mut total = PushTally::default();
    for received in 0..pushers {
        match done.recv().await {
            Some(tally) => total += tally,
            None => {
                tracing::error!(received, expected = pushers, "push workers exited without signalling");
                break;
            }
        }
    }

    tracing::debug!("all pushers finished");
    total
}
