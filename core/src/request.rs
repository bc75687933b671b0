//! The request lifecycle state machine.
//!
//! # Design
//! A `Request` is a cheap handle (`Arc`) around one mutex-guarded `State`.
//! That mutex is the request's single serialization point: transport
//! events, explicit `finish`/`cancel` calls and handler registration all
//! pass through it. Policy decisions run under the lock; transport calls,
//! cache writes and completion handlers run outside it so synchronous
//! transports and re-entrant handlers cannot deadlock.
//!
//! Phases: `Initial → Resumed → TaskInFlight → (Challenged | Redirected →
//! TaskInFlight)* → Finishing → Finished`. `Finishing` is entered exactly
//! once; every later finish signal is ignored.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::ops::{Deref, Range};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;
use log::{debug, trace, warn};
use tempfile::NamedTempFile;
use url::Url;
use uuid::Uuid;

use crate::auth::{
    AuthChallenge, AuthDisposition, Authenticator, Credential, Persistence, ProtectionSpace, MAX_AUTHENTICATION_ATTEMPTS,
};
use crate::cache::{default_policy_allows, CacheKey, CachedResponse, ResponseCacher};
use crate::endpoint::Endpoint;
use crate::error::SessionError;
use crate::http::{HttpRequest, HttpResponse};
use crate::notification::RequestEvent;
use crate::redirect::{RedirectDecision, Redirector};
use crate::response::{Completion, DataResponse, Delivery, InMemory, Payload, Response, ToFile};
use crate::session::SessionInner;
use crate::transport::{EventRouter, EventSink, TaskHandle, TaskId, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request-{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Resumed,
    TaskInFlight,
    Challenged,
    Redirected,
    Finishing,
    Finished,
}

impl Phase {
    fn is_terminal(self) -> bool {
        matches!(self, Phase::Finishing | Phase::Finished)
    }
}

type Callback = Box<dyn FnOnce(&Completion) + Send>;

#[derive(Default)]
enum BodyBuffer {
    #[default]
    Empty,
    Memory(Vec<u8>),
    File(NamedTempFile),
}

impl BodyBuffer {
    fn append(&mut self, to_file: bool, chunk: &[u8]) -> io::Result<()> {
        if matches!(self, BodyBuffer::Empty) {
            *self = if to_file {
                BodyBuffer::File(NamedTempFile::new()?)
            } else {
                BodyBuffer::Memory(Vec::new())
            };
        }
        match self {
            BodyBuffer::Memory(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            BodyBuffer::File(file) => file.write_all(chunk),
            BodyBuffer::Empty => Ok(()),
        }
    }
}

struct State {
    phase: Phase,
    original_request: Option<HttpRequest>,
    current_request: Option<HttpRequest>,
    current_task: Option<TaskId>,
    task_handle: Option<Box<dyn TaskHandle>>,
    response: Option<HttpResponse>,
    body: BodyBuffer,
    /// Set when a challenge or redirect response becomes the result.
    discard_body: bool,
    redirect_count: u32,
    auth_attempts: u32,
    credential: Option<Credential>,
    /// Offered to the credential store once the server accepts it.
    pending_credential: Option<(Credential, ProtectionSpace)>,
    authenticator: Option<Authenticator>,
    redirector: Option<Redirector>,
    cacher: Option<ResponseCacher>,
    validation: Option<Range<u16>>,
    destination: Option<PathBuf>,
    error: Option<SessionError>,
    callbacks: Vec<Callback>,
    completion: Option<Arc<Completion>>,
}

struct RequestInner {
    id: RequestId,
    endpoint: Endpoint,
    to_file: bool,
    session: Weak<SessionInner>,
    state: Mutex<State>,
}

/// What to do after an event was applied under the lock.
enum Step {
    Continue,
    Retry(HttpRequest, Option<Box<dyn TaskHandle>>),
    Finish(Option<SessionError>),
}

/// Everything `finish` needs, taken out of the state in one go.
struct Snapshot {
    request: Option<HttpRequest>,
    response: Option<HttpResponse>,
    body: BodyBuffer,
    discard_body: bool,
    error: Option<SessionError>,
    validation: Option<Range<u16>>,
    cacher: Option<ResponseCacher>,
    destination: Option<PathBuf>,
}

/// Handle to one logical request. Clones refer to the same request;
/// equality and hashing use the request id.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl Request {
    pub(crate) fn new(endpoint: Endpoint, to_file: bool, session: &Arc<SessionInner>) -> Self {
        let validation = endpoint.expected_status().cloned();
        Self {
            inner: Arc::new(RequestInner {
                id: RequestId(Uuid::new_v4()),
                endpoint,
                to_file,
                session: Arc::downgrade(session),
                state: Mutex::new(State {
                    phase: Phase::Initial,
                    original_request: None,
                    current_request: None,
                    current_task: None,
                    task_handle: None,
                    response: None,
                    body: BodyBuffer::Empty,
                    discard_body: false,
                    redirect_count: 0,
                    auth_attempts: 0,
                    credential: None,
                    pending_credential: None,
                    authenticator: None,
                    redirector: None,
                    cacher: None,
                    validation,
                    destination: None,
                    error: None,
                    callbacks: Vec::new(),
                    completion: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == Phase::Finished
    }

    /// The most recent request handed to the transport.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.lock().current_request.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the request. No-op unless the request is still `Initial`.
    pub fn resume(&self) {
        let Some(session) = self.inner.session.upgrade() else {
            let initial = self.lock().phase == Phase::Initial;
            if initial {
                self.finish_with(Some(SessionError::SessionDeinitialized));
            }
            return;
        };
        let first = {
            let mut state = self.lock();
            if state.phase != Phase::Initial {
                return;
            }
            state.phase = Phase::Resumed;
            session.observers.emit(RequestEvent::Resumed, self);
            let request = session.prepare(&self.inner.endpoint);
            state.original_request = Some(request.clone());
            request
        };
        debug!("{} resumed", self.id());
        self.start_task(&session, first);
    }

    /// Stop the request with `ExplicitlyCancelled`. Idempotent; no-op once
    /// the request is finishing.
    pub fn cancel(&self) {
        let session = self.inner.session.upgrade();
        let (handle, snapshot) = {
            let mut state = self.lock();
            if state.phase.is_terminal() {
                return;
            }
            if let Some(session) = &session {
                session.observers.emit(RequestEvent::Cancelled, self);
            }
            self.begin_finish(&mut state, session.as_deref(), Some(SessionError::ExplicitlyCancelled))
        };
        debug!("{} cancelled", self.id());
        self.end_finish(session, handle, snapshot);
    }

    /// Complete the request with whatever it has received so far. Only the
    /// first call (from any thread, or from the transport) has an effect.
    pub fn finish(&self) {
        self.finish_with(None);
    }

    fn starts_immediately(&self) -> bool {
        self.inner
            .session
            .upgrade()
            .map_or(true, |s| s.config.start_requests_immediately)
    }

    pub(crate) fn add_callback(&self, callback: Callback) {
        let completion = {
            let mut state = self.lock();
            match state.completion.clone() {
                Some(completion) => completion,
                None => {
                    state.callbacks.push(callback);
                    return;
                }
            }
        };
        run_callback(self.id(), callback, &completion);
    }

    fn start_task(&self, session: &Arc<SessionInner>, request: HttpRequest) {
        let task = session.next_task_id();
        {
            let mut state = self.lock();
            if state.phase.is_terminal() {
                return;
            }
            state.phase = Phase::TaskInFlight;
            state.current_task = Some(task);
            state.current_request = Some(request.clone());
            state.response = None;
            state.body = BodyBuffer::Empty;
            session.register_task(task, self);
            session.observers.emit(RequestEvent::TaskResumed, self);
        }
        debug!("{} started {task}: {} {}", self.id(), request.method, request.url);

        let router: Arc<dyn EventRouter> = session.clone();
        let handle = session.transport.send(task, request, EventSink::new(task, router));

        let mut state = self.lock();
        if state.current_task == Some(task) {
            state.task_handle = Some(handle);
        } else {
            drop(state);
            handle.cancel();
        }
    }

    /// Detach the current task from this request. Must run under the lock
    /// so `TaskCompleted` is ordered before any later notification.
    fn retire_task(&self, state: &mut State, session: Option<&SessionInner>) -> Option<Box<dyn TaskHandle>> {
        let task = state.current_task.take()?;
        if let Some(session) = session {
            session.retire_task(task);
            session.observers.emit(RequestEvent::TaskCompleted, self);
        }
        trace!("{} retired {task}", self.id());
        state.task_handle.take()
    }

    pub(crate) fn handle_event(&self, task: TaskId, event: TransportEvent) {
        let session = self.inner.session.upgrade();
        let step = {
            let mut state = self.lock();
            if state.current_task != Some(task) || state.phase.is_terminal() {
                trace!("{} ignoring event for {task} in {:?}", self.id(), state.phase);
                return;
            }
            match (event, session.as_deref()) {
                (TransportEvent::HeadersReceived(response), session) => {
                    if let Some(session) = session {
                        accept_credential(&mut state, session);
                    }
                    state.response = Some(response);
                    Step::Continue
                }
                (TransportEvent::BodyChunk(chunk), _) => {
                    let to_file = self.inner.to_file;
                    match state.body.append(to_file, &chunk) {
                        Ok(()) => Step::Continue,
                        Err(e) => Step::Finish(Some(SessionError::DownloadFailed(e.to_string()))),
                    }
                }
                (TransportEvent::Completed(None), _) => Step::Finish(None),
                (TransportEvent::Completed(Some(error)), _) => {
                    debug!("{} {task} failed: {error}", self.id());
                    Step::Finish(Some(error.into()))
                }
                (_, None) => Step::Finish(Some(SessionError::SessionDeinitialized)),
                (TransportEvent::ChallengeReceived { response, challenge }, Some(session)) => {
                    self.on_challenge(&mut state, session, response, challenge)
                }
                (TransportEvent::RedirectProposed { response, proposed }, Some(session)) => {
                    accept_credential(&mut state, session);
                    self.on_redirect(&mut state, session, response, proposed)
                }
            }
        };

        match step {
            Step::Continue => {}
            Step::Retry(next, previous) => {
                if let Some(handle) = previous {
                    handle.cancel();
                }
                match &session {
                    Some(session) => self.start_task(session, next),
                    None => self.finish_with(Some(SessionError::SessionDeinitialized)),
                }
            }
            Step::Finish(error) => self.finish_with(error),
        }
    }

    fn on_challenge(
        &self,
        state: &mut State,
        session: &SessionInner,
        response: HttpResponse,
        mut challenge: AuthChallenge,
    ) -> Step {
        state.phase = Phase::Challenged;
        if state.pending_credential.take().is_some() {
            debug!("{} credential rejected, not storing it", self.id());
        }
        challenge.previous_failure_count = state.auth_attempts;
        if state.auth_attempts >= MAX_AUTHENTICATION_ATTEMPTS {
            debug!("{} giving up on {:?} challenge after {} attempt(s)", self.id(), challenge.scheme, state.auth_attempts);
            return settle(state, response);
        }

        let authenticator = state
            .authenticator
            .clone()
            .unwrap_or_else(|| session.authenticator.clone());
        let supplied = state.credential.clone();
        let disposition = match catch_unwind(AssertUnwindSafe(|| authenticator.decide(&challenge, supplied.as_ref()))) {
            Ok(disposition) => disposition,
            Err(payload) => return Step::Finish(Some(SessionError::panicked("authentication", payload))),
        };
        let credential = match disposition {
            AuthDisposition::UseCredential(credential) => {
                state.pending_credential = Some((credential.clone(), challenge.protection_space()));
                Some(credential)
            }
            AuthDisposition::UseStoredCredential => session.credential_store.lookup(&challenge.protection_space()),
            AuthDisposition::CancelAuthentication => None,
        };
        let (Some(credential), Some(current)) = (credential, state.current_request.clone()) else {
            debug!("{} not answering {:?} challenge", self.id(), challenge.scheme);
            return settle(state, response);
        };

        state.auth_attempts += 1;
        let mut next = current;
        let value = challenge.authorization_value(&next, &credential);
        next.headers.insert(challenge.authorization_header(), value);
        debug!("{} answering {:?} challenge for realm {:?}", self.id(), challenge.scheme, challenge.realm);
        let previous = self.retire_task(state, Some(session));
        Step::Retry(next, previous)
    }

    fn on_redirect(
        &self,
        state: &mut State,
        session: &SessionInner,
        response: HttpResponse,
        proposed: HttpRequest,
    ) -> Step {
        state.phase = Phase::Redirected;
        let limit = session.config.max_redirects;
        if state.redirect_count >= limit {
            state.response = Some(response);
            state.discard_body = true;
            return Step::Finish(Some(SessionError::TooManyRedirects { limit }));
        }

        let redirector = state.redirector.clone().or_else(|| session.redirector.clone());
        let decision = match &redirector {
            None => RedirectDecision::FollowAsIs,
            Some(redirector) => {
                let original = state.original_request.clone().unwrap_or_else(|| proposed.clone());
                match catch_unwind(AssertUnwindSafe(|| redirector.decide(&proposed, &response, &original))) {
                    Ok(decision) => decision,
                    Err(payload) => return Step::Finish(Some(SessionError::panicked("redirect", payload))),
                }
            }
        };
        let next = match decision {
            RedirectDecision::FollowAsIs => proposed,
            RedirectDecision::FollowWithModifiedRequest(modified) => {
                if let Err(e) = Url::parse(&modified.url) {
                    warn!("{} redirect handler produced unusable URL {:?}: {e}", self.id(), modified.url);
                    return settle(state, response);
                }
                modified
            }
            RedirectDecision::DoNotFollow => {
                debug!("{} not following {} redirect", self.id(), response.status);
                return settle(state, response);
            }
        };

        state.redirect_count += 1;
        debug!("{} following {} redirect to {}", self.id(), response.status, next.url);
        let previous = self.retire_task(state, Some(session));
        Step::Retry(next, previous)
    }

    fn finish_with(&self, error: Option<SessionError>) {
        let session = self.inner.session.upgrade();
        let (handle, snapshot) = {
            let mut state = self.lock();
            if state.phase.is_terminal() {
                trace!("{} finish ignored in {:?}", self.id(), state.phase);
                return;
            }
            self.begin_finish(&mut state, session.as_deref(), error)
        };
        self.end_finish(session, handle, snapshot);
    }

    /// Enter `Finishing` and take what completion needs. Callers hold the
    /// lock and have checked the phase is not terminal.
    fn begin_finish(
        &self,
        state: &mut State,
        session: Option<&SessionInner>,
        error: Option<SessionError>,
    ) -> (Option<Box<dyn TaskHandle>>, Snapshot) {
        state.phase = Phase::Finishing;
        let handle = self.retire_task(state, session);
        if let Some(error) = error {
            state.error.get_or_insert(error);
        }
        let snapshot = Snapshot {
            request: state.current_request.clone(),
            response: state.response.clone(),
            body: std::mem::take(&mut state.body),
            discard_body: state.discard_body,
            error: state.error.clone(),
            validation: state.validation.clone(),
            cacher: state.cacher.clone(),
            destination: state.destination.clone(),
        };
        (handle, snapshot)
    }

    fn end_finish(
        &self,
        session: Option<Arc<SessionInner>>,
        handle: Option<Box<dyn TaskHandle>>,
        snapshot: Snapshot,
    ) {
        if let Some(handle) = handle {
            handle.cancel();
        }

        let completion = Arc::new(self.complete(snapshot, session.as_deref()));
        let callbacks = {
            let mut state = self.lock();
            state.phase = Phase::Finished;
            state.completion = Some(Arc::clone(&completion));
            std::mem::take(&mut state.callbacks)
        };
        match &completion.result {
            Ok(_) => debug!("{} finished with status {:?}", self.id(), completion.response.as_ref().map(|r| r.status)),
            Err(e) => debug!("{} finished with error: {e}", self.id()),
        }

        for callback in callbacks {
            run_callback(self.id(), callback, &completion);
        }
        if let Some(session) = &session {
            session.deregister(self.id());
            session.observers.emit(RequestEvent::Finished, self);
        }
    }

    /// Build the terminal result: validation, body materialization and the
    /// cache write. Runs once per request.
    fn complete(&self, snapshot: Snapshot, session: Option<&SessionInner>) -> Completion {
        let Snapshot {
            request,
            response,
            body,
            discard_body,
            error,
            validation,
            cacher,
            destination,
        } = snapshot;

        let validated = match error {
            Some(error) => Err(error),
            None => match (&validation, &response) {
                (Some(range), Some(head)) if !range.contains(&head.status) => {
                    Err(SessionError::UnacceptableStatus { status: head.status })
                }
                _ => Ok(()),
            },
        };

        let to_file = self.inner.to_file;
        let has_response = response.is_some();
        let mut result = validated.and_then(|()| {
            if !to_file {
                let data = match body {
                    BodyBuffer::Memory(buf) if !discard_body && !buf.is_empty() => Some(Bytes::from(buf)),
                    _ => None,
                };
                Ok(Payload::Data(data))
            } else if discard_body || !has_response {
                Ok(Payload::File(None))
            } else {
                persist_download(body, destination).map(|path| Payload::File(Some(path)))
            }
        });

        let cache_error = match (&result, &request, &response, session) {
            (Ok(Payload::Data(data)), Some(request), Some(head), Some(session)) if !discard_body => {
                store_in_cache(session, cacher.as_ref(), request, head, data.clone()).err()
            }
            _ => None,
        };
        if let Some(error) = cache_error {
            result = Err(error);
        }

        Completion {
            request,
            response,
            result,
        }
    }
}

/// The retried task got past the challenge, so its credential worked.
fn accept_credential(state: &mut State, session: &SessionInner) {
    if let Some((credential, space)) = state.pending_credential.take() {
        session.credential_store.store(credential, space);
    }
}

/// Make `response` the terminal result without its body.
fn settle(state: &mut State, response: HttpResponse) -> Step {
    state.response = Some(response);
    state.discard_body = true;
    Step::Finish(None)
}

fn store_in_cache(
    session: &SessionInner,
    cacher: Option<&ResponseCacher>,
    request: &HttpRequest,
    response: &HttpResponse,
    data: Option<Bytes>,
) -> Result<(), SessionError> {
    let Some(store) = &session.cache_store else {
        return Ok(());
    };
    // Cachers only ever see responses that are cacheable in the first place.
    if !default_policy_allows(request, response) {
        trace!("{} {} not proposed for caching", response.status, request.url);
        return Ok(());
    }
    let proposed = CachedResponse::new(response.clone(), data.unwrap_or_default());
    let entry = match cacher.or(session.cacher.as_ref()) {
        Some(cacher) => catch_unwind(AssertUnwindSafe(|| cacher.apply(request, proposed)))
            .map_err(|payload| SessionError::panicked("cache", payload))?,
        None => Some(proposed),
    };
    if let Some(entry) = entry {
        if let Err(e) = store.insert(CacheKey::for_request(request), entry) {
            warn!("could not cache response for {}: {e}", request.url);
        }
    }
    Ok(())
}

fn persist_download(body: BodyBuffer, destination: Option<PathBuf>) -> Result<PathBuf, SessionError> {
    let failed = |e: io::Error| SessionError::DownloadFailed(e.to_string());
    let file = match body {
        BodyBuffer::File(file) => file,
        _ => NamedTempFile::new().map_err(failed)?,
    };
    match destination {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(failed)?;
            }
            if let Err(e) = file.persist(&path) {
                // Rename fails across filesystems; fall back to a copy.
                fs::copy(e.file.path(), &path).map_err(failed)?;
            }
            Ok(path)
        }
        None => {
            let (_, path) = file.keep().map_err(|e| failed(e.error))?;
            Ok(path)
        }
    }
}

fn run_callback(id: RequestId, callback: Callback, completion: &Completion) {
    if catch_unwind(AssertUnwindSafe(|| callback(completion))).is_err() {
        warn!("{id} completion handler panicked");
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Request {}

impl std::hash::Hash for Request {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.inner.id)
            .field("url", &self.inner.endpoint.url().as_str())
            .finish()
    }
}

/// A request whose body is delivered as `D::Output`. Configuration methods
/// consume and return the handle so they chain ahead of `response`.
pub struct TypedRequest<D: Delivery> {
    request: Request,
    _delivery: PhantomData<D>,
}

pub type DataRequest = TypedRequest<InMemory>;
pub type DownloadRequest = TypedRequest<ToFile>;

impl<D: Delivery> TypedRequest<D> {
    pub(crate) fn new(request: Request) -> Self {
        Self {
            request,
            _delivery: PhantomData,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Answer any challenge on this request with these credentials, once.
    pub fn authenticate(self, username: &str, password: &str) -> Self {
        self.authenticate_with(Credential::new(username, password, Persistence::None))
    }

    pub fn authenticate_with(self, credential: Credential) -> Self {
        self.request.lock().credential = Some(credential);
        self
    }

    pub fn authenticator(self, authenticator: Authenticator) -> Self {
        self.request.lock().authenticator = Some(authenticator);
        self
    }

    /// Override the session's redirect policy for this request.
    pub fn redirect(self, redirector: Redirector) -> Self {
        self.request.lock().redirector = Some(redirector);
        self
    }

    pub fn cache_response(self, cacher: ResponseCacher) -> Self {
        self.request.lock().cacher = Some(cacher);
        self
    }

    /// Fail with `UnacceptableStatus` outside 200..300, unless the endpoint
    /// already declares its acceptable range.
    pub fn validate(self) -> Self {
        self.request.lock().validation.get_or_insert(200..300);
        self
    }

    /// Register a completion handler. Handlers run once, in registration
    /// order; a handler added after completion runs immediately. Resumes the
    /// request when the session starts requests immediately.
    pub fn response<F>(self, handler: F) -> Self
    where
        F: FnOnce(Response<D::Output>) + Send + 'static,
    {
        self.request
            .add_callback(Box::new(move |completion: &Completion| handler(completion.to_response::<D>())));
        if self.request.starts_immediately() {
            self.request.resume();
        }
        self
    }
}

impl TypedRequest<ToFile> {
    /// Move the downloaded file here instead of leaving it in the temp dir.
    pub fn destination(self, path: impl Into<PathBuf>) -> Self {
        self.request.lock().destination = Some(path.into());
        self
    }
}

impl TypedRequest<InMemory> {
    /// Shorthand for handlers that only care about the data result.
    pub fn response_data<F>(self, handler: F) -> Self
    where
        F: FnOnce(Result<Option<Bytes>, SessionError>) + Send + 'static,
    {
        self.response(move |response: DataResponse| handler(response.result))
    }
}

impl<D: Delivery> Clone for TypedRequest<D> {
    fn clone(&self) -> Self {
        Self::new(self.request.clone())
    }
}

impl<D: Delivery> Deref for TypedRequest<D> {
    type Target = Request;

    fn deref(&self) -> &Request {
        &self.request
    }
}

impl<D: Delivery> fmt::Debug for TypedRequest<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.request, f)
    }
}

impl<D: Delivery> PartialEq<Request> for TypedRequest<D> {
    fn eq(&self, other: &Request) -> bool {
        &self.request == other
    }
}

impl<D: Delivery> PartialEq<TypedRequest<D>> for Request {
    fn eq(&self, other: &TypedRequest<D>) -> bool {
        self == &other.request
    }
}
