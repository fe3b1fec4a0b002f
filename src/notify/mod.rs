//! Cross-context notification channel
//!
//! Fire-and-forget message bus from the privileged (gateway) side to every
//! page context currently listening. Delivery is at-most-once per listener
//! per call, with no acknowledgement and no retry; a listener that lags far
//! enough behind simply misses messages. The only ordering guarantee is
//! causal order per job: a job's terminal notification is sent after its
//! progress has stopped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Messages delivered to page contexts, dispatched on `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Notification {
    DownloadCompleted {
        id: String,
    },
    DownloadFailed {
        id: String,
        error: String,
    },
    DownloadAborted {
        id: String,
    },
    /// The user clicked the system download notification.
    DownloadNotificationClicked {
        id: String,
    },
}

impl Notification {
    pub fn job_id(&self) -> &str {
        match self {
            Notification::DownloadCompleted { id }
            | Notification::DownloadFailed { id, .. }
            | Notification::DownloadAborted { id }
            | Notification::DownloadNotificationClicked { id } => id,
        }
    }
}

const CHANNEL_CAPACITY: usize = 64;

/// Broadcast bus over all subscribed page contexts.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Deliver `message` to every current subscriber. Zero subscribers is
    /// not an error.
    pub fn notify_all(&self, message: Notification) {
        let delivered = self.tx.send(message.clone()).unwrap_or(0);
        debug!(?message, delivered, "Notification broadcast");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
