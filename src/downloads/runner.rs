//! Per-job transfer task.
//!
//! One runner owns one job from `pending` to a terminal state. It streams
//! every source URL in order, publishing progress through the watch channel
//! and the ledger. Media entries are materialized only after the last URL
//! finishes, so a failed or aborted job leaves nothing behind. The runner
//! is the only writer of the media namespace.

use std::sync::Arc;

use bytes::BytesMut;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cache::{CacheStore, CachedResponse, MEDIA_NAMESPACE, request_key};
use crate::notify::{Notification, Notifier};

use super::fetcher::AssetFetcher;
use super::job::{JobRecord, JobState};
use super::ledger::JobLedger;

pub(super) struct RunnerContext {
    pub record: JobRecord,
    pub ledger: JobLedger,
    pub cache: CacheStore,
    pub notifier: Notifier,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub updates: watch::Sender<JobRecord>,
    pub abort: watch::Receiver<bool>,
}

enum TransferEnd {
    Aborted,
    Failed(String),
}

pub(super) async fn run(mut ctx: RunnerContext) {
    ctx.record.state = JobState::InProgress;
    publish(&ctx);

    let id = ctx.record.id.clone();
    match transfer(&mut ctx).await {
        Ok(()) => {
            ctx.record.state = JobState::Succeeded;
            publish(&ctx);
            info!(id = %id, bytes = ctx.record.downloaded_bytes, "Download succeeded");
            ctx.notifier.notify_all(Notification::DownloadCompleted { id });
        }
        Err(TransferEnd::Aborted) => {
            ctx.record.state = JobState::Aborted;
            publish(&ctx);
            info!(id = %id, "Download aborted");
            ctx.notifier.notify_all(Notification::DownloadAborted { id });
        }
        Err(TransferEnd::Failed(reason)) => {
            ctx.record.state = JobState::Failed;
            ctx.record.failure_reason = Some(reason.clone());
            publish(&ctx);
            error!(id = %id, reason = %reason, "Download failed");
            ctx.notifier
                .notify_all(Notification::DownloadFailed { id, error: reason });
        }
    }
}

async fn transfer(ctx: &mut RunnerContext) -> Result<(), TransferEnd> {
    let urls = ctx.record.source_urls.clone();
    let mut completed = Vec::with_capacity(urls.len());

    for url in &urls {
        let mut stream = ctx
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| TransferEnd::Failed(e.to_string()))?;

        let mut body = BytesMut::new();
        loop {
            // An abort signal interrupts even a stalled transfer
            let chunk = tokio::select! {
                _ = ctx.abort.changed() => return Err(TransferEnd::Aborted),
                chunk = stream.chunk() => chunk,
            };

            match chunk {
                Ok(Some(chunk)) => {
                    ctx.record.downloaded_bytes += chunk.len() as u64;
                    body.extend_from_slice(&chunk);
                    publish(ctx);
                }
                Ok(None) => break,
                Err(e) => return Err(TransferEnd::Failed(e.to_string())),
            }
        }

        completed.push(CachedResponse::new(
            stream.status,
            stream.headers.clone(),
            body.freeze(),
        ));
    }

    materialize(ctx, &urls, completed).await
}

/// Write one media entry per URL, all at once after the final transfer.
/// The completion write is what makes the asset available offline, so a
/// cache failure fails the job; entries written before the failure are
/// rolled back so the namespace never holds a partial set.
async fn materialize(
    ctx: &RunnerContext,
    urls: &[String],
    responses: Vec<CachedResponse>,
) -> Result<(), TransferEnd> {
    for (i, (url, response)) in urls.iter().zip(responses).enumerate() {
        if let Err(e) = ctx.cache.put(MEDIA_NAMESPACE, &request_key(url), response).await {
            for written in &urls[..i] {
                if let Err(e) = ctx.cache.delete(MEDIA_NAMESPACE, &request_key(written)).await {
                    warn!(id = %ctx.record.id, url = %written, error = %e, "Media rollback failed");
                }
            }
            return Err(TransferEnd::Failed(format!("cache write failed: {}", e)));
        }
        info!(id = %ctx.record.id, url = %url, "Media entry cached");
    }

    Ok(())
}

/// Push the current record to the ledger and the watch channel. A ledger
/// write failure degrades the fallback poll but not the event path.
fn publish(ctx: &RunnerContext) {
    let mut record = ctx.record.clone();
    record.updated_at = Utc::now();

    if let Err(e) = ctx.ledger.upsert(&record) {
        warn!(id = %record.id, error = %e, "Job record write failed");
    }
    let _ = ctx.updates.send(record);
}
