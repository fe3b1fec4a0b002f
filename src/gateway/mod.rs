//! HTTP gateway
//!
//! One axum process exposes the offline controls (`/offline`,
//! `/downloads/{id}`) and intercepts every other request through the
//! cache-resolution policy. Startup runs the install/activate lifecycle
//! before the listener binds.

pub mod error;
pub mod proxy;
pub mod server;
pub mod services;
pub mod state;

pub use error::{ErrorResponse, GatewayError};
pub use proxy::ProxyNetworkFetcher;
pub use server::{router, run};
pub use state::AppState;
