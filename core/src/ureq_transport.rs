//! Default blocking transport built on ureq.
//!
//! Each task runs on its own thread. ureq is configured to return every
//! status as data and to never follow redirects, so challenge and redirect
//! handling stay with the session's policies.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config::SessionConfig;
use crate::error::TransportError;
use crate::http::{HttpHeaders, HttpRequest, HttpResponse};
use crate::transport::{classify, EventSink, TaskHandle, TaskId, Transport, TransportEvent};

const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &SessionConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .timeout_global(config.timeout())
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

struct CancelFlag(Arc<AtomicBool>);

impl TaskHandle for CancelFlag {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Transport for UreqTransport {
    fn send(&self, task: TaskId, request: HttpRequest, events: EventSink) -> Box<dyn TaskHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let agent = self.agent.clone();
        let sink = events.clone();

        let spawned = thread::Builder::new()
            .name(format!("courier-{task}"))
            .spawn(move || {
                let outcome = execute(&agent, &request, &sink, &flag);
                if flag.load(Ordering::SeqCst) {
                    log::trace!("{task} cancelled, dropping completion");
                    return;
                }
                sink.send(TransportEvent::Completed(outcome.err()));
            });
        if let Err(e) = spawned {
            events.send(TransportEvent::Completed(Some(TransportError::Other(format!(
                "could not spawn transport thread: {e}"
            )))));
        }
        Box::new(CancelFlag(cancelled))
    }
}

fn execute(
    agent: &ureq::Agent,
    request: &HttpRequest,
    events: &EventSink,
    cancelled: &AtomicBool,
) -> Result<(), TransportError> {
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }
    let result = match &request.body {
        Some(body) => agent.run(
            builder
                .body(body.clone())
                .map_err(|e| TransportError::Other(e.to_string()))?,
        ),
        None => agent.run(builder.body(()).map_err(|e| TransportError::Other(e.to_string()))?),
    };
    let mut response = result.map_err(|e| map_error(e, &request.url))?;

    let headers: HttpHeaders = response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();
    let head = HttpResponse {
        url: request.url.clone(),
        status: response.status().as_u16(),
        headers,
    };
    events.send(classify(request, head));

    let mut reader = response.body_mut().as_reader();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Ok(());
        }
        let n = reader.read(&mut buf).map_err(map_io_error)?;
        if n == 0 {
            return Ok(());
        }
        events.send(TransportEvent::BodyChunk(buf[..n].to_vec()));
    }
}

fn map_error(error: ureq::Error, url: &str) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::TimedOut,
        ureq::Error::HostNotFound => TransportError::CannotFindHost(url.to_string()),
        ureq::Error::ConnectionFailed => TransportError::ConnectionFailed(url.to_string()),
        ureq::Error::Io(e) => map_io_error(e),
        other => TransportError::Other(other.to_string()),
    }
}

fn map_io_error(error: io::Error) -> TransportError {
    match error.kind() {
        io::ErrorKind::TimedOut => TransportError::TimedOut,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            TransportError::ConnectionFailed(error.to_string())
        }
        _ => TransportError::Io(error.to_string()),
    }
}
