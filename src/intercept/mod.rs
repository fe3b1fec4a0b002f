//! Request interception
//!
//! Every outgoing request from a controlled page flows through
//! [`Interceptor::resolve`], which applies the first matching rule:
//!
//! 1. non-GET / excluded URL → pass through untouched
//! 2. media URL → serve the media-namespace copy if present, else live
//! 3. anything else → cache-first against the static namespace, with a
//!    best-effort write-back and offline substitution on network failure

pub mod policy;
pub mod resolver;
pub mod substitute;

pub use policy::{InterceptPolicy, RequestClass};
pub use resolver::{
    InterceptError, InterceptedRequest, Interceptor, NetworkFetcher, Resolution, Result,
};
