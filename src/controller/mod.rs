//! Page-facing offline controls.
//!
//! The controller mirrors what a media page shows the user: whether the
//! asset is available offline, how far a running download has come, and
//! whether a notification click asked for playback. It sits between the
//! download manager and the gateway routes and publishes one [`ViewState`]
//! over a watch channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::cache::{CacheError, CacheStore, MEDIA_NAMESPACE, request_key, request_url};
use crate::config::MediaConfig;
use crate::downloads::{
    DownloadError, DownloadManager, DownloadRequest, JobRecord, JobState, ProgressSubscription,
};
use crate::notify::{Notification, Notifier};
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, ControllerError>;

/// What the page renders. `progress_percentage` is -1 while no transfer is
/// running or the total is unknown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub cached: bool,
    pub progress_percentage: i64,
    pub error_text: Option<String>,
    pub success: bool,
    pub playback_requested: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            cached: false,
            progress_percentage: -1,
            error_text: None,
            success: false,
            playback_requested: false,
        }
    }
}

#[derive(Clone)]
pub struct DownloadController {
    manager: DownloadManager,
    cache: CacheStore,
    media: MediaConfig,
    media_extensions: Vec<String>,
    view: Arc<watch::Sender<ViewState>>,
    driving: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
}

impl DownloadController {
    pub fn new(
        manager: DownloadManager,
        cache: CacheStore,
        notifier: &Notifier,
        media: MediaConfig,
        media_extensions: Vec<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (view, _) = watch::channel(ViewState::default());
        let view = Arc::new(view);
        spawn_notification_listener(notifier, media.asset_id.clone(), view.clone());

        Self {
            manager,
            cache,
            media,
            media_extensions: media_extensions
                .into_iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            view,
            driving: Arc::new(AtomicBool::new(false)),
            metrics,
        }
    }

    /// Watch feed of the current view. Every mutation below publishes here.
    pub fn view(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    /// Re-check cache membership for the configured asset and publish the
    /// refreshed view. A job that is already running for the asset is
    /// re-attached first, so a page loading mid-download (or after a
    /// process restart with a persisted live record) shows its progress.
    /// The asset counts as cached only when every source URL has a
    /// materialized entry.
    pub async fn query_status(&self) -> Result<ViewState> {
        self.attach_existing_job().await?;

        let mut cached = !self.media.source_urls.is_empty();
        for url in &self.media.source_urls {
            if self
                .cache
                .match_key(MEDIA_NAMESPACE, &request_key(url))
                .await?
                .is_none()
            {
                cached = false;
                break;
            }
        }

        self.view.send_modify(|view| view.cached = cached);
        Ok(self.view.borrow().clone())
    }

    /// Start (or attach to) the background download for the configured
    /// asset and drive its progress into the view until it settles.
    pub async fn make_offline(&self) -> Result<JobRecord> {
        self.metrics.download_started();

        let request = DownloadRequest::builder()
            .id(self.media.asset_id.clone())
            .source_urls(self.media.source_urls.clone())
            .expected_total_bytes(self.media.expected_total_bytes.as_u64())
            .title(self.media.title.clone())
            .build();

        let record = self.manager.start_or_attach(request).await?;
        self.view.send_modify(|view| {
            view.error_text = None;
            view.success = record.state == JobState::Succeeded;
        });

        let subscription = self.manager.subscribe(&record.id).await?;
        self.spawn_drive(subscription);

        Ok(record)
    }

    /// Attach to a live job record nobody is driving yet. The `driving`
    /// flag keeps repeated status polls from stacking drive tasks.
    async fn attach_existing_job(&self) -> Result<()> {
        if self.driving.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(record) = self.manager.lookup(&self.media.asset_id)? {
            if !record.state.is_terminal() {
                let subscription = self.manager.subscribe(&record.id).await?;
                self.spawn_drive(subscription);
            }
        }
        Ok(())
    }

    fn spawn_drive(&self, subscription: ProgressSubscription) {
        self.driving.store(true, Ordering::SeqCst);
        let controller = self.clone();
        tokio::spawn(async move {
            controller.drive(subscription).await;
            controller.driving.store(false, Ordering::SeqCst);
        });
    }

    /// Remove the asset from the offline cache. The status requery runs
    /// whether or not removal succeeded, so the view never goes stale.
    pub async fn make_online_only(&self) -> Result<ViewState> {
        let removal = self.remove_media().await;
        let status = self.query_status().await;
        removal?;
        status
    }

    async fn remove_media(&self) -> Result<()> {
        let mut removed = 0usize;
        for key in self.cache.list_keys(MEDIA_NAMESPACE)? {
            let Some(url) = request_url(&key) else {
                continue;
            };
            if self.is_media_url(url) {
                self.cache.delete(MEDIA_NAMESPACE, &key).await?;
                removed += 1;
            }
        }
        info!(removed, "Offline media removed");

        self.view.send_modify(|view| {
            view.success = false;
            view.progress_percentage = -1;
        });
        Ok(())
    }

    fn is_media_url(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.media_extensions.iter().any(|ext| url.contains(ext))
    }

    async fn drive(&self, mut subscription: ProgressSubscription) {
        while let Some(record) = subscription.next().await {
            self.view.send_modify(|view| {
                if let Some(percentage) = record.progress_percentage() {
                    view.progress_percentage = percentage as i64;
                }
                match record.state {
                    JobState::Succeeded => {
                        view.success = true;
                        view.error_text = None;
                    }
                    JobState::Failed => {
                        view.error_text = Some(
                            record
                                .failure_reason
                                .clone()
                                .unwrap_or_else(|| "Download failed".to_string()),
                        );
                    }
                    JobState::Aborted => {
                        view.progress_percentage = -1;
                    }
                    JobState::Pending | JobState::InProgress => {}
                }
            });
        }

        if let Err(e) = self.query_status().await {
            warn!(error = %e, "Status requery after download failed");
        }
    }
}

/// Mirrors broadcast notifications for the configured asset into the view,
/// so downloads finished by another party still reach the page.
fn spawn_notification_listener(
    notifier: &Notifier,
    asset_id: String,
    view: Arc<watch::Sender<ViewState>>,
) {
    let mut messages = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            let message = match messages.recv().await {
                Ok(message) => message,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification listener lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if message.job_id() != asset_id {
                continue;
            }
            view.send_modify(|view| match message {
                Notification::DownloadCompleted { .. } => {
                    view.success = true;
                    view.error_text = None;
                }
                Notification::DownloadFailed { error, .. } => {
                    view.error_text = Some(error);
                }
                Notification::DownloadAborted { .. } => {
                    view.progress_percentage = -1;
                }
                Notification::DownloadNotificationClicked { .. } => {
                    view.playback_requested = true;
                }
            });
        }
    });
}
