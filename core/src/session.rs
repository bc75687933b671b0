//! Sessions: shared configuration, default policies and event routing.
//!
//! # Design
//! `Session` is a cheap handle around `SessionInner`. The inner value owns
//! the live requests strongly and indexes them twice: by request id (for
//! `active_requests`/`cancel_all`) and by task id (for routing transport
//! events). Requests point back weakly, so dropping every `Session` handle
//! leaves un-resumed requests to fail with `SessionDeinitialized`, while the
//! event sinks of in-flight tasks keep the inner value alive until those
//! tasks finish.
//!
//! Map locks are only ever taken briefly and never while calling into a
//! request.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, trace};

use crate::auth::{Authenticator, CredentialStore, InMemoryCredentialStore};
use crate::cache::{CacheKey, CacheStore, CachedResponse, MemoryCacheStore, ResponseCacher};
use crate::config::SessionConfig;
use crate::endpoint::Endpoint;
use crate::http::HttpRequest;
use crate::notification::{Notification, Observers};
use crate::redirect::Redirector;
use crate::request::{DataRequest, DownloadRequest, Request, RequestId, TypedRequest};
use crate::response::Delivery;
use crate::transport::{EventRouter, TaskId, Transport, TransportEvent};
use crate::ureq_transport::UreqTransport;

pub(crate) struct SessionInner {
    pub(crate) config: SessionConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) authenticator: Authenticator,
    pub(crate) redirector: Option<Redirector>,
    pub(crate) cacher: Option<ResponseCacher>,
    pub(crate) credential_store: Arc<dyn CredentialStore>,
    pub(crate) cache_store: Option<Arc<dyn CacheStore>>,
    pub(crate) observers: Observers,
    requests: RwLock<HashMap<RequestId, Request>>,
    tasks: RwLock<HashMap<TaskId, Request>>,
    next_task: AtomicU64,
}

impl SessionInner {
    /// The first request for `endpoint`, with session headers filled in.
    pub(crate) fn prepare(&self, endpoint: &Endpoint) -> HttpRequest {
        let mut request = endpoint.to_request();
        request.headers.merge_defaults(&self.config.headers);
        request
    }

    pub(crate) fn next_task_id(&self) -> TaskId {
        TaskId(self.next_task.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub(crate) fn register_task(&self, task: TaskId, request: &Request) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        tasks.insert(task, request.clone());
    }

    pub(crate) fn retire_task(&self, task: TaskId) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        tasks.remove(&task);
    }

    pub(crate) fn deregister(&self, id: RequestId) {
        let mut requests = self.requests.write().unwrap_or_else(PoisonError::into_inner);
        if requests.remove(&id).is_some() {
            trace!("{id} deregistered");
        }
    }

    fn register(&self, request: &Request) {
        let mut requests = self.requests.write().unwrap_or_else(PoisonError::into_inner);
        requests.insert(request.id(), request.clone());
    }
}

impl EventRouter for SessionInner {
    fn route(&self, task: TaskId, event: TransportEvent) {
        let request = {
            let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
            tasks.get(&task).cloned()
        };
        match request {
            Some(request) => request.handle_event(task, event),
            None => trace!("no live request for {task}, dropping event"),
        }
    }
}

/// Creates requests and holds the state they share.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// A session with default configuration and the ureq transport.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// A request whose body is buffered in memory.
    pub fn request(&self, endpoint: Endpoint) -> DataRequest {
        self.create(endpoint)
    }

    /// A request whose body is written to a file.
    pub fn download(&self, endpoint: Endpoint) -> DownloadRequest {
        self.create(endpoint)
    }

    fn create<D: Delivery>(&self, endpoint: Endpoint) -> TypedRequest<D> {
        let request = Request::new(endpoint, D::TO_FILE, &self.inner);
        self.inner.register(&request);
        debug!("{} created for {}", request.id(), request.endpoint().url());
        TypedRequest::new(request)
    }

    /// Lifecycle notifications for every request of this session, from now
    /// on.
    pub fn subscribe(&self) -> Receiver<Notification> {
        self.inner.observers.subscribe()
    }

    /// Requests created by this session that have not finished yet.
    pub fn active_requests(&self) -> Vec<Request> {
        let requests = self.inner.requests.read().unwrap_or_else(PoisonError::into_inner);
        requests.values().cloned().collect()
    }

    pub fn cancel_all(&self) {
        for request in self.active_requests() {
            request.cancel();
        }
    }

    /// The cache entry stored for the last request `request` sent.
    pub fn cached_response(&self, request: &Request) -> Option<CachedResponse> {
        let store = self.inner.cache_store.as_ref()?;
        let last = request.last_request()?;
        store.lookup(&CacheKey::for_request(&last))
    }

    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.credential_store
    }

    pub fn cache_store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.inner.cache_store.as_ref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("authenticator", &self.inner.authenticator)
            .field("redirector", &self.inner.redirector)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    transport: Option<Arc<dyn Transport>>,
    authenticator: Authenticator,
    redirector: Option<Redirector>,
    cacher: Option<ResponseCacher>,
    credential_store: Option<Arc<dyn CredentialStore>>,
    cache_store: Option<Arc<dyn CacheStore>>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Default redirect policy; requests may still override it.
    pub fn redirector(mut self, redirector: Redirector) -> Self {
        self.redirector = Some(redirector);
        self
    }

    pub fn cacher(mut self, cacher: ResponseCacher) -> Self {
        self.cacher = Some(cacher);
        self
    }

    pub fn credential_store<S: CredentialStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.credential_store = Some(store);
        self
    }

    pub fn cache_store<S: CacheStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn build(self) -> Session {
        let config = self.config;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(UreqTransport::new(&config)) as Arc<dyn Transport>);
        let cache_store = self.cache_store.or_else(|| {
            (config.cache_memory_capacity > 0).then(|| {
                Arc::new(MemoryCacheStore::with_capacity(config.cache_memory_capacity)) as Arc<dyn CacheStore>
            })
        });
        let credential_store = self
            .credential_store
            .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new()) as Arc<dyn CredentialStore>);
        Session {
            inner: Arc::new(SessionInner {
                config,
                transport,
                authenticator: self.authenticator,
                redirector: self.redirector,
                cacher: self.cacher,
                credential_store,
                cache_store,
                observers: Observers::default(),
                requests: RwLock::new(HashMap::new()),
                tasks: RwLock::new(HashMap::new()),
                next_task: AtomicU64::new(0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, Persistence, ProtectionSpace};
    use crate::error::SessionError;
    use crate::notification::RequestEvent;
    use crate::testing::{respond, Reply, ScriptedTransport};
    use std::sync::mpsc;
    use std::time::Duration;

    fn session(transport: &Arc<ScriptedTransport>) -> Session {
        Session::builder().transport(Arc::clone(transport)).build()
    }

    fn endpoint(path: &str) -> Endpoint {
        Endpoint::new(&format!("http://example.test{path}")).unwrap()
    }

    #[test]
    fn session_headers_are_added_to_every_request() {
        let transport = ScriptedTransport::new();
        transport.route("/get", |_| respond(200, &[], b"ok"));
        let mut config = SessionConfig::default();
        config.headers.insert("Session-Configuration-Header", "foo");
        let session = Session::builder().config(config).transport(Arc::clone(&transport)).build();

        let (tx, rx) = mpsc::channel();
        session
            .request(endpoint("/get").header("Request-Header", "foobar"))
            .response(move |r| tx.send(r).unwrap());
        rx.recv_timeout(Duration::from_secs(1)).unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].headers.get("session-configuration-header"), Some("foo"));
        assert_eq!(sent[0].headers.get("request-header"), Some("foobar"));
        assert!(sent[0].headers.contains("user-agent"));
    }

    #[test]
    fn finished_requests_leave_the_active_set() {
        let transport = ScriptedTransport::new();
        transport.route("/slow", |_| Reply::Hold);
        let session = session(&transport);

        let request = session.request(endpoint("/slow")).response(|_| {});
        assert_eq!(session.active_requests(), vec![request.request().clone()]);

        let held = transport.take_held();
        ScriptedTransport::deliver(&held[0], 200, b"done");
        assert!(request.is_finished());
        assert!(session.active_requests().is_empty());
    }

    #[test]
    fn cancel_all_cancels_in_flight_requests() {
        let transport = ScriptedTransport::new();
        transport.route("/slow", |_| Reply::Hold);
        let session = session(&transport);

        let (tx, rx) = mpsc::channel();
        for _ in 0..3 {
            let tx = tx.clone();
            session.request(endpoint("/slow")).response(move |r| tx.send(r.result).unwrap());
        }
        session.cancel_all();

        for _ in 0..3 {
            let result = rx.recv_timeout(Duration::from_secs(1)).unwrap();
            assert_eq!(result, Err(SessionError::ExplicitlyCancelled));
        }
        assert_eq!(transport.cancels(), 3);
        assert!(session.active_requests().is_empty());
    }

    #[test]
    fn dropped_session_fails_unstarted_requests() {
        let transport = ScriptedTransport::new();
        let config = SessionConfig {
            start_requests_immediately: false,
            ..SessionConfig::default()
        };
        let session = Session::builder().config(config).transport(Arc::clone(&transport)).build();
        let (tx, rx) = mpsc::channel();
        let request = session.request(endpoint("/get")).response(move |r| tx.send(r).unwrap());
        drop(session);

        request.resume();
        let response = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(response.result, Err(SessionError::SessionDeinitialized));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn stored_credentials_answer_challenges() {
        let transport = ScriptedTransport::new();
        transport.route("/basic-auth/user/password", |req| match req.headers.get("authorization") {
            Some(_) => respond(200, &[], b"authenticated"),
            None => respond(401, &[("WWW-Authenticate", r#"Basic realm="Fake Realm""#)], b""),
        });
        let session = session(&transport);
        session.credential_store().store(
            Credential::new("user", "password", Persistence::ForSession),
            ProtectionSpace {
                host: "example.test".to_string(),
                port: 80,
                protocol: "http".to_string(),
                realm: Some("Fake Realm".to_string()),
                scheme: crate::auth::AuthScheme::Basic,
                proxy: false,
            },
        );

        let (tx, rx) = mpsc::channel();
        session
            .request(endpoint("/basic-auth/user/password"))
            .response(move |r| tx.send(r).unwrap());
        let response = rx.recv_timeout(Duration::from_secs(1)).unwrap();

        assert_eq!(response.status(), Some(200));
        assert_eq!(response.data().map(|b| &b[..]), Some(&b"authenticated"[..]));
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn default_cache_keeps_successful_gets() {
        let transport = ScriptedTransport::new();
        transport.route("/get", |_| respond(200, &[], b"cached body"));
        let session = session(&transport);

        let (tx, rx) = mpsc::channel();
        let request = session.request(endpoint("/get")).response(move |r| tx.send(r).unwrap());
        rx.recv_timeout(Duration::from_secs(1)).unwrap();

        let cached = session.cached_response(&request).unwrap();
        assert_eq!(&cached.data[..], b"cached body");
        assert_eq!(cached.response.status, 200);
    }

    #[test]
    fn finished_sessions_are_freed() {
        let transport = ScriptedTransport::new();
        transport.route("/redirect", |_| respond(302, &[("Location", "/get")], b""));
        transport.route("/get", |_| respond(200, &[], b"ok"));
        transport.route("/slow", |_| Reply::Hold);
        let session = session(&transport);
        let notifications = session.subscribe();

        let (tx, rx) = mpsc::channel();
        let redirected = session.request(endpoint("/redirect")).response({
            let tx = tx.clone();
            move |r| tx.send(r.result.is_ok()).unwrap()
        });
        let held = session.request(endpoint("/slow")).response(move |r| tx.send(r.result.is_ok()).unwrap());
        for task in transport.take_held() {
            ScriptedTransport::deliver(&task, 200, b"late");
        }
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());

        let inner = Arc::downgrade(&session.inner);
        drop((session, redirected, held, notifications));
        assert!(inner.upgrade().is_none());
    }

    #[test]
    fn ephemeral_sessions_have_no_cache() {
        let transport = ScriptedTransport::new();
        let session = Session::builder()
            .config(SessionConfig::ephemeral())
            .transport(Arc::clone(&transport))
            .build();
        assert!(session.cache_store().is_none());
    }

    #[test]
    fn notifications_follow_the_lifecycle() {
        let transport = ScriptedTransport::new();
        transport.route("/get", |_| respond(200, &[], b"ok"));
        let config = SessionConfig {
            start_requests_immediately: false,
            ..SessionConfig::default()
        };
        let session = Session::builder().config(config).transport(Arc::clone(&transport)).build();
        let events = session.subscribe();

        let request = session.request(endpoint("/get")).response(|_| {});
        request.resume();

        let seen: Vec<RequestEvent> = events
            .try_iter()
            .filter(|n| n.request == request)
            .map(|n| n.event)
            .collect();
        assert_eq!(
            seen,
            vec![
                RequestEvent::Resumed,
                RequestEvent::TaskResumed,
                RequestEvent::TaskCompleted,
                RequestEvent::Finished,
            ]
        );
    }
}
