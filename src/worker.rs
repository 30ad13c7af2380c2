// src/worker.rs
//! Dedicated pipeline task. Triggers send jobs over a channel and await the
//! report on a oneshot.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::{SyncOrchestrator, SyncReport, SyncRequest};

pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

pub struct SyncJob {
    pub request: SyncRequest,
    pub reply: Option<oneshot::Sender<SyncReport>>,
}

#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<SyncJob>,
}

impl PipelineHandle {
    /// Queue a request and wait for its report.
    pub async fn submit(&self, request: SyncRequest) -> Result<SyncReport, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SyncJob {
                request,
                reply: Some(reply),
            })
            .await
            .map_err(|_| PipelineError::Closed)?;
        rx.await.map_err(|_| PipelineError::Dropped)
    }

    /// Queue a request without waiting for the outcome.
    pub async fn enqueue(&self, request: SyncRequest) -> Result<(), PipelineError> {
        self.tx
            .send(SyncJob { request, reply: None })
            .await
            .map_err(|_| PipelineError::Closed)
    }
}

/// Jobs run one at a time in arrival order. The task ends when every handle is dropped.
pub fn spawn_pipeline_worker(
    orchestrator: Arc<SyncOrchestrator>,
    capacity: usize,
) -> (PipelineHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<SyncJob>(capacity.max(1));
    let task = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let report = orchestrator.run(&job.request).await;
            info!(
                trigger = %job.request.trigger,
                target = ?job.request.target,
                added = report.added,
                errors = report.errors.len(),
                "sync_job_completed"
            );
            if let Some(reply) = job.reply {
                if reply.send(report).is_err() {
                    warn!(trigger = %job.request.trigger, "sync_job_reply_dropped");
                }
            }
        }
        info!("pipeline_worker_stopped");
    });
    (PipelineHandle { tx }, task)
}
