//! Edge Forwarder - a thin reverse proxy in front of the content dashboard's backend.
//!
//! The static dashboard calls a single inbound route (by default `/api/proxy`) and
//! names the backend endpoint it wants in the `path` query parameter. The forwarder
//! rebuilds the call against `{origin}/api/{path}`, trying each configured backend
//! origin in priority order until one accepts the connection, and relays the answer.
//!
//! # Behaviour
//! - Ordered failover over `primary`, `fallback`, `dns_fallback` and `ip_fallback`
//!   origins; only transport failures advance to the next origin
//! - Allow-listed request headers (`Authorization`, `Content-Type`), or a
//!   copy-all-but-hop-by-hop policy when configured
//! - Redirects are never followed; `3xx` + `Location` goes back to the browser as is
//! - Every transport failure becomes `502 {"detail": "Proxy failed: ..."}`
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use edge_forwarder::{
//!     BackendCandidates, ForwardSettings, Forwarder, HttpClientAdapter, HttpHandler,
//!     config::ServerConfig,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg = ServerConfig::builder().primary("https://api.example.com").build();
//! let forwarder = Forwarder::new(
//!     Arc::new(ForwardSettings::from(&cfg)),
//!     Arc::new(BackendCandidates::from_config(&cfg.backends)?),
//!     Arc::new(HttpClientAdapter::new()?),
//! );
//! let app = HttpHandler::new(Arc::new(forwarder), cfg.max_body_bytes).router(&cfg.mount_path);
//! let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! **Ports** (traits) are separated from **adapters** (implementations); the
//! forwarding rules live in `core` and only talk to the outside world through the
//! [`HttpClient`] port, which keeps them testable without sockets.
//!
//! # Error Handling
//! Library errors are `thiserror` enums; the binary uses `eyre::Result` with
//! `WrapErr` context.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{HttpClientAdapter, HttpHandler},
    core::{BackendCandidates, BackendUrl, ForwardRequest, ForwardSettings, Forwarder},
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};
