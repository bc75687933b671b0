//! Terminal results handed to completion handlers.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::SessionError;
use crate::http::{HttpRequest, HttpResponse};

/// The single final outcome of a request.
///
/// `request` is the last request sent (after redirects and authentication
/// retries), `response` the head it produced. Either may be `None` when the
/// request finished before reaching the network.
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub request: Option<HttpRequest>,
    pub response: Option<HttpResponse>,
    pub result: Result<T, SessionError>,
}

pub type DataResponse = Response<Option<Bytes>>;
pub type DownloadResponse = Response<Option<PathBuf>>;

impl<T> Response<T> {
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.result.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl Response<Option<Bytes>> {
    pub fn data(&self) -> Option<&Bytes> {
        self.result.as_ref().ok().and_then(Option::as_ref)
    }
}

impl Response<Option<PathBuf>> {
    pub fn file(&self) -> Option<&Path> {
        self.result.as_ref().ok().and_then(|p| p.as_deref())
    }
}

/// A finished request's body as buffered by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Data(Option<Bytes>),
    File(Option<PathBuf>),
}

/// How a request delivers its body: in memory or to a file.
pub trait Delivery: Send + Sync + 'static {
    type Output: Send + 'static;
    const TO_FILE: bool;

    fn extract(payload: Payload) -> Self::Output;
}

/// Body buffered in memory.
#[derive(Debug, Clone, Copy)]
pub struct InMemory;

/// Body streamed to a file.
#[derive(Debug, Clone, Copy)]
pub struct ToFile;

impl Delivery for InMemory {
    type Output = Option<Bytes>;
    const TO_FILE: bool = false;

    fn extract(payload: Payload) -> Self::Output {
        match payload {
            Payload::Data(data) => data,
            Payload::File(_) => None,
        }
    }
}

impl Delivery for ToFile {
    type Output = Option<PathBuf>;
    const TO_FILE: bool = true;

    fn extract(payload: Payload) -> Self::Output {
        match payload {
            Payload::File(path) => path,
            Payload::Data(_) => None,
        }
    }
}

/// What the state machine stores once a request is finished.
#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) request: Option<HttpRequest>,
    pub(crate) response: Option<HttpResponse>,
    pub(crate) result: Result<Payload, SessionError>,
}

impl Completion {
    pub(crate) fn to_response<D: Delivery>(&self) -> Response<D::Output> {
        Response {
            request: self.request.clone(),
            response: self.response.clone(),
            result: self.result.clone().map(D::extract),
        }
    }
}
