//! Scripted in-process transport for unit tests.
//!
//! Routes are keyed by URL path. A route answers synchronously from inside
//! `send`, fails, or holds the task until the test releases it, which lets
//! tests drive the state machine through every ordering without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use url::Url;

use crate::error::TransportError;
use crate::http::{HttpHeaders, HttpRequest, HttpResponse};
use crate::transport::{classify, EventSink, TaskHandle, TaskId, Transport, TransportEvent};

type Route = Arc<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

pub(crate) enum Reply {
    Respond {
        status: u16,
        headers: HttpHeaders,
        body: Vec<u8>,
    },
    Fail(TransportError),
    Hold,
}

pub(crate) fn respond(status: u16, headers: &[(&str, &str)], body: &[u8]) -> Reply {
    Reply::Respond {
        status,
        headers: headers.iter().copied().collect(),
        body: body.to_vec(),
    }
}

pub(crate) struct Held {
    pub(crate) request: HttpRequest,
    pub(crate) sink: EventSink,
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, Route>>,
    sent: Mutex<Vec<(TaskId, HttpRequest)>>,
    held: Mutex<Vec<Held>>,
    cancels: Arc<AtomicUsize>,
}

struct CountingHandle(Arc<AtomicUsize>);

impl TaskHandle for CountingHandle {
    fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn route<F>(&self, path: &str, f: F)
    where
        F: Fn(&HttpRequest) -> Reply + Send + Sync + 'static,
    {
        self.routes.lock().unwrap().insert(path.to_string(), Arc::new(f));
    }

    pub(crate) fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub(crate) fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Take every held task, oldest first.
    pub(crate) fn take_held(&self) -> Vec<Held> {
        std::mem::take(&mut *self.held.lock().unwrap())
    }

    /// Deliver a complete response on a held task.
    pub(crate) fn deliver(held: &Held, status: u16, body: &[u8]) {
        let head = HttpResponse {
            url: held.request.url.clone(),
            status,
            headers: HttpHeaders::new(),
        };
        held.sink.send(classify(&held.request, head));
        if !body.is_empty() {
            held.sink.send(TransportEvent::BodyChunk(body.to_vec()));
        }
        held.sink.send(TransportEvent::Completed(None));
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, task: TaskId, request: HttpRequest, events: EventSink) -> Box<dyn TaskHandle> {
        self.sent.lock().unwrap().push((task, request.clone()));
        let path = Url::parse(&request.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        let route = self.routes.lock().unwrap().get(&path).cloned();
        let reply = match route {
            Some(route) => route(&request),
            None => respond(404, &[], b""),
        };
        match reply {
            Reply::Respond { status, headers, body } => {
                let head = HttpResponse {
                    url: request.url.clone(),
                    status,
                    headers,
                };
                events.send(classify(&request, head));
                // Split so multi-chunk buffering is exercised.
                for chunk in body.chunks(4) {
                    events.send(TransportEvent::BodyChunk(chunk.to_vec()));
                }
                events.send(TransportEvent::Completed(None));
            }
            Reply::Fail(error) => events.send(TransportEvent::Completed(Some(error))),
            Reply::Hold => self.held.lock().unwrap().push(Held { request, sink: events }),
        }
        Box::new(CountingHandle(Arc::clone(&self.cancels)))
    }
}
