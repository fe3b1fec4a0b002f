use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a background download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Aborted,
}

impl JobState {
    /// Terminal states receive no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Aborted)
    }

    /// Failed and aborted records are non-attachable: a new start replaces
    /// them with a fresh job instead of attaching to the dead record.
    pub fn is_attachable(&self) -> bool {
        !matches!(self, JobState::Failed | JobState::Aborted)
    }
}

/// Display metadata forwarded to the system download surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IconDescriptor {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// A request to start (or attach to) a background download. The `id` is the
/// dedup key: at most one job exists per id at any time.
#[derive(Debug, Clone, Builder)]
pub struct DownloadRequest {
    #[builder(into)]
    pub id: String,
    pub source_urls: Vec<String>,
    /// Declared total size; advisory only, used for percentage display.
    pub expected_total_bytes: u64,
    #[builder(into, default)]
    pub title: String,
    #[builder(default)]
    pub icons: Vec<IconDescriptor>,
}

/// Persisted state of one background download job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub source_urls: Vec<String>,
    pub expected_total_bytes: u64,
    pub state: JobState,
    /// Monotonically non-decreasing while in progress.
    pub downloaded_bytes: u64,
    /// Set only when `state` is failed.
    pub failure_reason: Option<String>,
    pub title: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(request: &DownloadRequest) -> Self {
        let now = Utc::now();
        Self {
            id: request.id.clone(),
            source_urls: request.source_urls.clone(),
            expected_total_bytes: request.expected_total_bytes,
            state: JobState::Pending,
            downloaded_bytes: 0,
            failure_reason: None,
            title: request.title.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// `floor(100 * downloaded / expected)`. Deliberately unclamped: when
    /// the declared total is wrong the value can exceed 100, and consumers
    /// must tolerate that. `None` when no total was declared.
    pub fn progress_percentage(&self) -> Option<u64> {
        if self.expected_total_bytes == 0 {
            return None;
        }
        Some(100 * self.downloaded_bytes / self.expected_total_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request() -> DownloadRequest {
        DownloadRequest::builder()
            .id("bbb")
            .source_urls(vec!["https://example.com/bbb.mp4".to_string()])
            .expected_total_bytes(1000)
            .title("Big Buck Bunny")
            .build()
    }

    #[test]
    fn percentage_is_floored() {
        let mut record = JobRecord::new(&test_request());
        record.downloaded_bytes = 250;
        assert_eq!(record.progress_percentage(), Some(25));

        record.downloaded_bytes = 999;
        assert_eq!(record.progress_percentage(), Some(99));
    }

    #[test]
    fn percentage_unclamped_on_bad_total() {
        let mut record = JobRecord::new(&test_request());
        record.downloaded_bytes = 1500;
        assert_eq!(record.progress_percentage(), Some(150));
    }

    #[test]
    fn no_percentage_without_declared_total() {
        let request = DownloadRequest::builder()
            .id("bbb")
            .source_urls(vec!["https://example.com/bbb.mp4".to_string()])
            .expected_total_bytes(0)
            .build();
        assert_eq!(JobRecord::new(&request).progress_percentage(), None);
    }

    #[test]
    fn terminal_and_attachable_states() {
        assert!(!JobState::InProgress.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Succeeded.is_attachable());
        assert!(!JobState::Failed.is_attachable());
        assert!(!JobState::Aborted.is_attachable());
    }

    #[test]
    fn state_wire_format() {
        let json = serde_json::to_string(&JobState::InProgress).unwrap();
        assert_eq!(json, r#""in-progress""#);
    }
}
