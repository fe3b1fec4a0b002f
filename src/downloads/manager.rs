use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::notify::{Notification, Notifier};

use super::error::Result;
use super::fetcher::AssetFetcher;
use super::job::{DownloadRequest, JobRecord};
use super::ledger::JobLedger;
use super::progress::ProgressSubscription;

struct ActiveJob {
    updates: watch::Receiver<JobRecord>,
    abort: watch::Sender<bool>,
}

/// Background download manager.
///
/// Owns the persisted job ledger and one runner task per live job. All
/// start decisions are serialized through the `active` mutex, which is what
/// upholds the at-most-one-job-per-id invariant under concurrent callers.
#[derive(Clone)]
pub struct DownloadManager {
    ledger: JobLedger,
    cache: CacheStore,
    notifier: Notifier,
    fetcher: Arc<dyn AssetFetcher>,
    poll_interval: Duration,
    active: Arc<Mutex<HashMap<String, ActiveJob>>>,
}

impl DownloadManager {
    pub fn open<P: AsRef<Path>>(
        path: P,
        cache: CacheStore,
        notifier: Notifier,
        fetcher: Arc<dyn AssetFetcher>,
        poll_interval: Duration,
    ) -> Result<Self> {
        Ok(Self {
            ledger: JobLedger::open(path)?,
            cache,
            notifier,
            fetcher,
            poll_interval,
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Current record for `id`, whatever its state.
    pub fn lookup(&self, id: &str) -> Result<Option<JobRecord>> {
        self.ledger.get(id)
    }

    /// Attach to the existing job for this id, or register a fresh one.
    ///
    /// Attach rules: live (pending/in-progress) and succeeded records are
    /// returned unchanged; failed and aborted records are dead and are
    /// replaced by a fresh job. A non-terminal record with no runner (stale
    /// leftover from an earlier process) is restarted.
    pub async fn start_or_attach(&self, request: DownloadRequest) -> Result<JobRecord> {
        let mut active = self.active.lock().await;

        if let Some(existing) = self.ledger.get(&request.id)? {
            if existing.state.is_attachable()
                && (existing.state.is_terminal() || active.contains_key(&request.id))
            {
                debug!(id = %request.id, state = ?existing.state, "Attaching to existing job");
                return Ok(existing);
            }
            info!(id = %request.id, state = ?existing.state, "Replacing dead job record");
        }

        let record = JobRecord::new(&request);
        self.ledger.upsert(&record)?;

        let (updates_tx, updates_rx) = watch::channel(record.clone());
        let (abort_tx, abort_rx) = watch::channel(false);
        active.insert(
            request.id.clone(),
            ActiveJob {
                updates: updates_rx,
                abort: abort_tx,
            },
        );

        let ctx = super::runner::RunnerContext {
            record: record.clone(),
            ledger: self.ledger.clone(),
            cache: self.cache.clone(),
            notifier: self.notifier.clone(),
            fetcher: self.fetcher.clone(),
            updates: updates_tx,
            abort: abort_rx,
        };

        let registry = self.active.clone();
        let id = request.id.clone();
        tokio::spawn(async move {
            super::runner::run(ctx).await;
            registry.lock().await.remove(&id);
        });

        info!(id = %record.id, urls = record.source_urls.len(), "Download registered");
        Ok(record)
    }

    /// Progress feed for `id`: runner events plus the fallback ledger poll.
    pub async fn subscribe(&self, id: &str) -> Result<ProgressSubscription> {
        let updates = {
            let active = self.active.lock().await;
            active.get(id).map(|job| job.updates.clone())
        };

        let updates = match updates {
            Some(rx) => rx,
            None => {
                // No runner: seed a watch channel with the stored record so
                // the subscription delivers it (and, if terminal, ends).
                let record = self
                    .ledger
                    .get(id)?
                    .ok_or_else(|| super::error::DownloadError::JobNotFound(id.to_string()))?;
                let (_tx, rx) = watch::channel(record);
                rx
            }
        };

        Ok(ProgressSubscription::spawn(
            id.to_string(),
            updates,
            self.ledger.clone(),
            self.poll_interval,
        ))
    }

    /// Host-side abort signal (the user cancelling from the system download
    /// UI). Returns whether a live job was signalled.
    pub async fn abort(&self, id: &str) -> bool {
        let active = self.active.lock().await;
        match active.get(id) {
            Some(job) => {
                let _ = job.abort.send(true);
                info!(id, "Abort signalled");
                true
            }
            None => {
                warn!(id, "Abort requested for a job with no runner");
                false
            }
        }
    }

    /// Forward a system download-notification click to all page contexts.
    pub fn notification_clicked(&self, id: &str) {
        self.notifier
            .notify_all(Notification::DownloadNotificationClicked { id: id.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MEDIA_NAMESPACE, request_key};
    use crate::downloads::error::FetchError;
    use crate::downloads::fetcher::AssetStream;
    use crate::downloads::job::JobState;
    use crate::storage::BodyStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    /// Serves every URL as two chunks: 250 then 750 bytes.
    struct ScriptedFetcher {
        fetches: AtomicUsize,
        fail: bool,
    }

    impl ScriptedFetcher {
        fn ok() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl AssetFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<AssetStream, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::BadStatus {
                    status: 503,
                    url: url.to_string(),
                });
            }
            Ok(AssetStream::from_chunks(
                200,
                vec![("content-type".to_string(), "video/mp4".to_string())],
                vec![Bytes::from(vec![0u8; 250]), Bytes::from(vec![0u8; 750])],
            ))
        }
    }

    fn test_request(id: &str) -> DownloadRequest {
        DownloadRequest::builder()
            .id(id)
            .source_urls(vec!["https://example.com/bbb.mp4".to_string()])
            .expected_total_bytes(1000)
            .title("Big Buck Bunny")
            .build()
    }

    fn build_manager(fetcher: Arc<dyn AssetFetcher>) -> (DownloadManager, Notifier, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache =
            CacheStore::open(temp_dir.path().join("cache"), BodyStore::in_memory()).unwrap();
        let notifier = Notifier::new();
        let manager = DownloadManager::open(
            temp_dir.path().join("jobs"),
            cache,
            notifier.clone(),
            fetcher,
            Duration::from_millis(50),
        )
        .unwrap();
        (manager, notifier, temp_dir)
    }

    #[tokio::test]
    async fn completed_job_materializes_media_and_notifies() {
        let (manager, notifier, _temp) = build_manager(Arc::new(ScriptedFetcher::ok()));
        let mut messages = notifier.subscribe();

        let record = manager.start_or_attach(test_request("bbb")).await.unwrap();
        assert_eq!(record.state, JobState::Pending);

        let mut sub = manager.subscribe("bbb").await.unwrap();
        let terminal = sub.wait_terminal().await.unwrap();
        assert_eq!(terminal.state, JobState::Succeeded);
        assert_eq!(terminal.downloaded_bytes, 1000);
        assert_eq!(terminal.progress_percentage(), Some(100));

        assert_eq!(
            messages.recv().await.unwrap(),
            Notification::DownloadCompleted {
                id: "bbb".to_string()
            }
        );

        let cached = manager
            .cache
            .match_key(MEDIA_NAMESPACE, &request_key("https://example.com/bbb.mp4"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.body.len(), 1000);
    }

    #[tokio::test]
    async fn progress_is_monotonic_until_terminal() {
        let (manager, _notifier, _temp) = build_manager(Arc::new(ScriptedFetcher::ok()));
        manager.start_or_attach(test_request("bbb")).await.unwrap();

        let mut sub = manager.subscribe("bbb").await.unwrap();
        let mut observed = Vec::new();
        while let Some(record) = sub.next().await {
            observed.push((record.downloaded_bytes, record.state));
        }

        assert!(observed.windows(2).all(|w| w[0].0 <= w[1].0));
        let (_, last_state) = observed.last().unwrap();
        assert!(last_state.is_terminal());
    }

    #[tokio::test]
    async fn at_most_one_job_per_id() {
        let fetcher = Arc::new(ScriptedFetcher::ok());
        let (manager, _notifier, _temp) = build_manager(fetcher.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.start_or_attach(test_request("bbb")).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().id, "bbb");
        }

        let mut sub = manager.subscribe("bbb").await.unwrap();
        sub.wait_terminal().await.unwrap();

        // One underlying job: one fetch, one cached copy
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(manager.cache.list_keys(MEDIA_NAMESPACE).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_job_reports_reason_and_is_replaced_on_retry() {
        let (manager, notifier, _temp) = build_manager(Arc::new(ScriptedFetcher::failing()));
        let mut messages = notifier.subscribe();

        manager.start_or_attach(test_request("bbb")).await.unwrap();
        let mut sub = manager.subscribe("bbb").await.unwrap();
        let terminal = sub.wait_terminal().await.unwrap();
        assert_eq!(terminal.state, JobState::Failed);
        assert!(terminal.failure_reason.as_deref().unwrap().contains("503"));

        match messages.recv().await.unwrap() {
            Notification::DownloadFailed { id, error } => {
                assert_eq!(id, "bbb");
                assert!(error.contains("503"));
            }
            other => panic!("unexpected notification: {:?}", other),
        }

        // Dead record is non-attachable: a retry starts fresh
        let retried = manager.start_or_attach(test_request("bbb")).await.unwrap();
        assert_eq!(retried.state, JobState::Pending);
    }

    #[tokio::test]
    async fn succeeded_record_attaches_unchanged() {
        let (manager, _notifier, _temp) = build_manager(Arc::new(ScriptedFetcher::ok()));
        manager.start_or_attach(test_request("bbb")).await.unwrap();
        manager
            .subscribe("bbb")
            .await
            .unwrap()
            .wait_terminal()
            .await
            .unwrap();

        let attached = manager.start_or_attach(test_request("bbb")).await.unwrap();
        assert_eq!(attached.state, JobState::Succeeded);
        // Still exactly one cached copy
        assert_eq!(manager.cache.list_keys(MEDIA_NAMESPACE).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookup_returns_record_in_any_state() {
        let (manager, _notifier, _temp) = build_manager(Arc::new(ScriptedFetcher::failing()));
        assert!(manager.lookup("bbb").unwrap().is_none());

        manager.start_or_attach(test_request("bbb")).await.unwrap();
        manager
            .subscribe("bbb")
            .await
            .unwrap()
            .wait_terminal()
            .await
            .unwrap();

        let record = manager.lookup("bbb").unwrap().unwrap();
        assert_eq!(record.state, JobState::Failed);
    }

    /// First URL succeeds, every later fetch is refused.
    struct FirstUrlOnlyFetcher {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl AssetFetcher for FirstUrlOnlyFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<AssetStream, FetchError> {
            if self.fetches.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(FetchError::BadStatus {
                    status: 503,
                    url: url.to_string(),
                });
            }
            Ok(AssetStream::from_chunks(
                200,
                vec![("content-type".to_string(), "video/mp4".to_string())],
                vec![Bytes::from(vec![0u8; 250])],
            ))
        }
    }

    #[tokio::test]
    async fn failed_multi_url_job_materializes_nothing() {
        let (manager, _notifier, _temp) = build_manager(Arc::new(FirstUrlOnlyFetcher {
            fetches: AtomicUsize::new(0),
        }));

        let request = DownloadRequest::builder()
            .id("bbb")
            .source_urls(vec![
                "https://cdn.example.com/part1.mp4".to_string(),
                "https://cdn.example.com/part2.mp4".to_string(),
            ])
            .expected_total_bytes(500)
            .build();
        manager.start_or_attach(request).await.unwrap();

        let terminal = manager
            .subscribe("bbb")
            .await
            .unwrap()
            .wait_terminal()
            .await
            .unwrap();
        assert_eq!(terminal.state, JobState::Failed);

        // The finished first URL was not left behind
        assert!(manager.cache.list_keys(MEDIA_NAMESPACE).unwrap().is_empty());
    }

    /// Sends one chunk and then stalls until dropped.
    struct StallingFetcher {
        holds: std::sync::Mutex<Vec<mpsc::Sender<std::result::Result<Bytes, FetchError>>>>,
    }

    #[async_trait]
    impl AssetFetcher for StallingFetcher {
        async fn fetch(&self, _url: &str) -> std::result::Result<AssetStream, FetchError> {
            let (tx, rx) = mpsc::channel(4);
            tx.send(Ok(Bytes::from(vec![0u8; 250]))).await.unwrap();
            self.holds.lock().unwrap().push(tx);
            Ok(AssetStream::new(200, vec![], rx))
        }
    }

    #[tokio::test]
    async fn abort_interrupts_a_stalled_transfer() {
        let fetcher = Arc::new(StallingFetcher {
            holds: std::sync::Mutex::new(Vec::new()),
        });
        let (manager, notifier, _temp) = build_manager(fetcher);
        let mut messages = notifier.subscribe();

        manager.start_or_attach(test_request("bbb")).await.unwrap();
        let mut sub = manager.subscribe("bbb").await.unwrap();

        // Wait until the first chunk is visible, then pull the plug
        loop {
            let record = sub.next().await.unwrap();
            if record.downloaded_bytes == 250 {
                break;
            }
        }
        assert!(manager.abort("bbb").await);

        let terminal = sub.wait_terminal().await.unwrap();
        assert_eq!(terminal.state, JobState::Aborted);
        assert_eq!(
            messages.recv().await.unwrap(),
            Notification::DownloadAborted {
                id: "bbb".to_string()
            }
        );
        // Nothing was materialized
        assert!(manager.cache.list_keys(MEDIA_NAMESPACE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribe_unknown_job_is_an_error() {
        let (manager, _notifier, _temp) = build_manager(Arc::new(ScriptedFetcher::ok()));
        assert!(manager.subscribe("nope").await.is_err());
    }
}
