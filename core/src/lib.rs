//! HTTP request session engine.
//!
//! # Overview
//! A `Session` creates requests from `Endpoint` descriptors, hands them to a
//! `Transport` and drives each one through authentication challenges,
//! redirects and response caching until it completes exactly once.
//!
//! # Design
//! - The network sits behind the `Transport` trait. `UreqTransport` is the
//!   default; tests plug in scripted or proxying transports.
//! - Policies (`Authenticator`, `Redirector`, `ResponseCacher`) are plain
//!   enums with a closure variant. A request-level policy always wins over
//!   the session's.
//! - Each request serializes its own state behind one mutex; no lock is held
//!   while calling the transport or user callbacks.
//! - Lifecycle notifications go to per-session `mpsc` subscribers.
//! - The crate logs through `log` and never installs a logger.

pub mod auth;
pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod notification;
pub mod redirect;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;
pub mod ureq_transport;

#[cfg(test)]
mod testing;

pub use auth::{
    AuthChallenge, AuthDisposition, AuthScheme, Authenticator, Credential, CredentialStore, InMemoryCredentialStore,
    Persistence, ProtectionSpace,
};
pub use cache::{CacheKey, CacheStore, CachedResponse, MemoryCacheStore, ResponseCacher, StoragePolicy};
pub use config::SessionConfig;
pub use endpoint::Endpoint;
pub use error::{CacheError, SessionError, TransportError};
pub use http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse};
pub use notification::{Notification, RequestEvent};
pub use redirect::{RedirectDecision, Redirector};
pub use request::{DataRequest, DownloadRequest, Phase, Request, RequestId, TypedRequest};
pub use response::{DataResponse, DownloadResponse, Response};
pub use session::{Session, SessionBuilder};
pub use transport::{EventSink, TaskHandle, TaskId, Transport, TransportEvent};
pub use ureq_transport::UreqTransport;
