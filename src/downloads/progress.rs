//! Progress delivery for one job.
//!
//! Two producers feed a single consumer channel: the runner's watch channel
//! (event path) and a fixed-interval poll that re-reads the job ledger,
//! covering hosts that drop progress events. Updates are de-duplicated by
//! the last observed `(downloaded_bytes, state)` pair, so the redundant
//! producer never re-triggers work on unchanged state. The terminal record
//! is always the last item delivered.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::job::{JobRecord, JobState};
use super::ledger::JobLedger;

/// A live feed of job snapshots, ending at the terminal state.
pub struct ProgressSubscription {
    rx: mpsc::Receiver<JobRecord>,
    driver: JoinHandle<()>,
}

impl ProgressSubscription {
    pub(super) fn spawn(
        id: String,
        mut updates: watch::Receiver<JobRecord>,
        ledger: JobLedger,
        poll_interval: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(16);

        let driver = tokio::spawn(async move {
            let mut last: Option<(u64, JobState)> = None;
            let mut watch_live = true;

            let mut poll = tokio::time::interval(poll_interval);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the initial delivery below
            // already covers it
            poll.tick().await;

            // Deliver the current snapshot up front, then alternate between
            // event notifications and poll re-reads.
            let initial = updates.borrow_and_update().clone();
            if deliver(&tx, &mut last, initial).await {
                return;
            }

            loop {
                tokio::select! {
                    changed = updates.changed(), if watch_live => {
                        match changed {
                            Ok(()) => {
                                let snapshot = updates.borrow_and_update().clone();
                                if deliver(&tx, &mut last, snapshot).await {
                                    return;
                                }
                            }
                            // Producer gone; keep polling the ledger
                            Err(_) => watch_live = false,
                        }
                    }
                    _ = poll.tick() => {
                        if let Ok(Some(record)) = ledger.get(&id) {
                            if deliver(&tx, &mut last, record).await {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Self { rx, driver }
    }

    /// Next de-duplicated snapshot. `None` after the terminal snapshot has
    /// been consumed.
    pub async fn next(&mut self) -> Option<JobRecord> {
        self.rx.recv().await
    }

    /// Drive the subscription to its end and return the terminal record.
    pub async fn wait_terminal(&mut self) -> Option<JobRecord> {
        let mut terminal = None;
        while let Some(record) = self.next().await {
            let is_terminal = record.state.is_terminal();
            terminal = Some(record);
            if is_terminal {
                break;
            }
        }
        terminal
    }
}

impl Drop for ProgressSubscription {
    // The poll task must die with its owner, exactly once
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Send `record` unless it matches the last observed state. Returns true
/// when the subscription is complete (terminal sent, or consumer gone).
async fn deliver(
    tx: &mpsc::Sender<JobRecord>,
    last: &mut Option<(u64, JobState)>,
    record: JobRecord,
) -> bool {
    let observed = (record.downloaded_bytes, record.state);
    if *last == Some(observed) {
        return false;
    }
    *last = Some(observed);

    let terminal = record.state.is_terminal();
    tx.send(record).await.is_err() || terminal
}
