//! Namespaced persistent response cache
//!
//! Two namespace families exist at runtime:
//!
//! - `static-vN`: versioned namespace for ordinary GET responses. Rotating
//!   the version (via the lifecycle coordinator) replaces it wholesale.
//! - `media`: unversioned, long-lived namespace for downloaded media.
//!   It survives static rotation; only an explicit delete removes an entry.
//!
//! Entry metadata is JSON in a fjall partition per namespace; bodies live in
//! the [`crate::storage::BodyStore`].

pub mod error;
pub mod keys;
pub mod store;

pub use error::{CacheError, Result};
pub use keys::{request_key, request_url};
pub use store::{CacheStore, CachedResponse};

/// Name of the unversioned media namespace.
pub const MEDIA_NAMESPACE: &str = "media";
