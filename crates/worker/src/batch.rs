//! Drains the indexing queue and runs each job's documents concurrently,
//! bounded by `WORKER_BATCH_SIZE` (spec §4.2).

use std::sync::Arc;
use std::time::Duration;

use bridge_common::types::DocumentResult;
use bridge_common::BatchJob;
use tokio::sync::{watch, Semaphore};
use tracing::{info, instrument, warn};

use crate::pool::ServicePool;

const PER_DOC_EXPECTED_SECS: u64 = 30;
const JOB_TIMEOUT_SAFETY_FACTOR: u64 = 3;

fn job_timeout(batch_size: usize) -> Duration {
    Duration::from_secs(batch_size as u64 * PER_DOC_EXPECTED_SECS * JOB_TIMEOUT_SAFETY_FACTOR)
}

/// Runs until the queue closes or `shutdown` is signalled. On shutdown, the
/// in-flight job is allowed to drain before the loop exits; anything still
/// queued is left for another worker process (spec §4.2 "Cancellation").
pub async fn run(pool: Arc<ServicePool>, mut queue_rx: tokio::sync::mpsc::UnboundedReceiver<BatchJob>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("shutdown requested; batch worker will not pick up new jobs");
                    return;
                }
            }
            job = queue_rx.recv() => {
                match job {
                    Some(job) => process_job(&pool, job).await,
                    None => {
                        info!("indexing queue closed; batch worker exiting");
                        return;
                    }
                }
            }
        }
    }
}

#[instrument(skip(pool, job), fields(documents = job.documents.len(), crawl_id = job.crawl_id.as_deref().unwrap_or("none")))]
async fn process_job(pool: &Arc<ServicePool>, job: BatchJob) {
    let timeout = job_timeout(pool.worker_batch_size);
    match tokio::time::timeout(timeout, run_documents_concurrently(pool, job)).await {
        Ok(results) => {
            let failed = results.iter().filter(|r| !r.success).count();
            if failed > 0 {
                warn!(failed, total = results.len(), "batch job completed with per-document failures");
            } else {
                info!(total = results.len(), "batch job completed");
            }
        }
        Err(_) => warn!(?timeout, "batch job exceeded its timeout; documents may be partially indexed"),
    }
}

/// Schedules one task per document, bounded to `worker_batch_size`
/// concurrent tasks, and awaits all of them with per-task failure
/// isolation — one bad document never cancels its peers.
async fn run_documents_concurrently(pool: &Arc<ServicePool>, job: BatchJob) -> Vec<DocumentResult> {
    let semaphore = Arc::new(Semaphore::new(pool.worker_batch_size.max(1)));
    let crawl_id = job.crawl_id;
    let request_id = job.request_id;

    let tasks: Vec<_> = job
        .documents
        .into_iter()
        .map(|doc| {
            let pipeline = pool.pipeline.clone();
            let crawl_id = crawl_id.clone();
            let request_id = request_id.clone();
            let semaphore = semaphore.clone();
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                pipeline.index_document(doc, crawl_id.as_deref(), request_id.as_deref()).await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(result) => results.push(result),
            Err(join_err) => results.push(DocumentResult {
                success: false,
                url: "unknown".to_string(),
                error: Some(join_err.to_string()),
                error_type: Some("TaskPanicked".to_string()),
            }),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_timeout_scales_with_batch_size() {
        assert_eq!(job_timeout(4), Duration::from_secs(4 * 30 * 3));
        assert_eq!(job_timeout(1), Duration::from_secs(90));
    }
}
