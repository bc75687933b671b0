//! The seam between the session and whatever moves bytes.
//!
//! # Design
//! A `Transport` receives a prepared `HttpRequest` together with an
//! `EventSink` and reports progress by pushing `TransportEvent`s into the
//! sink, from any thread and at any time, including synchronously from
//! inside `send`. The session routes every event to the owning request by
//! task id; events for tasks the request has already abandoned are dropped.
//!
//! Adapters call `classify` on each response head so challenge and redirect
//! detection is shared instead of reimplemented per transport.

use std::fmt;
use std::sync::Arc;

use crate::auth::AuthChallenge;
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};
use crate::redirect;

/// Identity of one transport task. Unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    HeadersReceived(HttpResponse),
    BodyChunk(Vec<u8>),
    ChallengeReceived {
        response: HttpResponse,
        challenge: AuthChallenge,
    },
    RedirectProposed {
        response: HttpResponse,
        proposed: HttpRequest,
    },
    /// Last event of every task. `None` means the body was fully delivered.
    Completed(Option<TransportError>),
}

/// Turn a response head into the event describing it.
pub fn classify(request: &HttpRequest, response: HttpResponse) -> TransportEvent {
    if let Some(challenge) = AuthChallenge::from_response(request, &response) {
        return TransportEvent::ChallengeReceived { response, challenge };
    }
    if let Some(proposed) = redirect::follow_up_request(request, &response) {
        return TransportEvent::RedirectProposed { response, proposed };
    }
    TransportEvent::HeadersReceived(response)
}

pub(crate) trait EventRouter: Send + Sync {
    fn route(&self, task: TaskId, event: TransportEvent);
}

/// Where a transport delivers the events of one task.
#[derive(Clone)]
pub struct EventSink {
    task: TaskId,
    router: Arc<dyn EventRouter>,
}

impl EventSink {
    pub(crate) fn new(task: TaskId, router: Arc<dyn EventRouter>) -> Self {
        Self { task, router }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn send(&self, event: TransportEvent) {
        self.router.route(self.task, event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").field("task", &self.task).finish()
    }
}

/// Control over a running task.
pub trait TaskHandle: Send {
    /// Best-effort: the transport should stop delivering events soon.
    fn cancel(&self);
}

pub trait Transport: Send + Sync {
    fn send(&self, task: TaskId, request: HttpRequest, events: EventSink) -> Box<dyn TaskHandle>;
}
