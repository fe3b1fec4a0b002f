//! Background download subsystem
//!
//! Wraps one named download job per asset id: registration, lookup,
//! progress delivery (events plus a fallback poll), and materialization of
//! the finished asset into the media cache namespace.
//!
//! Invariants upheld here:
//! - at most one job exists per id, under arbitrary concurrent starts
//! - `downloaded_bytes` is non-decreasing until a terminal state
//! - the terminal snapshot is the last progress item delivered
//! - the completion handler is the only writer of the media namespace

pub mod error;
pub mod fetcher;
pub mod http;
pub mod job;
pub mod ledger;
pub mod manager;
pub mod progress;
mod runner;

pub use error::{DownloadError, FetchError, Result};
pub use fetcher::{AssetFetcher, AssetStream, HttpAssetFetcher};
pub use http::{HttpClient, HttpConfig};
pub use job::{DownloadRequest, IconDescriptor, JobRecord, JobState};
pub use ledger::JobLedger;
pub use manager::DownloadManager;
pub use progress::ProgressSubscription;
