//! Immutable request descriptors.
//!
//! An `Endpoint` names a target URL plus the method, headers and body of
//! one logical request. Builder methods consume and return the value, so a
//! descriptor never changes once handed to a `Session`.

use std::ops::Range;

use serde::Serialize;
use url::Url;

use crate::error::SessionError;
use crate::http::{HttpHeaders, HttpMethod, HttpRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    method: HttpMethod,
    headers: HttpHeaders,
    body: Option<Vec<u8>>,
    acceptable_status: Option<Range<u16>>,
}

impl Endpoint {
    /// Parse `url` into a GET endpoint.
    pub fn new(url: &str) -> Result<Self, SessionError> {
        let parsed = Url::parse(url).map_err(|e| SessionError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_url(parsed))
    }

    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::Get,
            headers: HttpHeaders::new(),
            body: None,
            acceptable_status: None,
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        self.body = Some(body.into());
        self.headers.insert("Content-Type", content_type);
        self
    }

    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, SessionError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| SessionError::InvalidConfiguration(format!("JSON body: {e}")))?;
        Ok(self.body(body, "application/json"))
    }

    /// Statuses outside `range` complete with `UnacceptableStatus`.
    pub fn acceptable_status(mut self, range: Range<u16>) -> Self {
        self.acceptable_status = Some(range);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn expected_status(&self) -> Option<&Range<u16>> {
        self.acceptable_status.as_ref()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    pub fn to_request(&self) -> HttpRequest {
        HttpRequest {
            method: self.method,
            url: self.url.to_string(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_get_without_body() {
        let endpoint = Endpoint::new("http://localhost:3000/get").unwrap();
        let req = endpoint.to_request();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/get");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = Endpoint::new("not a url").unwrap_err();
        assert!(matches!(err, SessionError::InvalidUrl { .. }));
    }

    #[test]
    fn json_body_sets_content_type() {
        let endpoint = Endpoint::new("http://localhost:3000/post")
            .unwrap()
            .method(HttpMethod::Post)
            .json(&serde_json::json!({"title": "Buy milk"}))
            .unwrap();
        let req = endpoint.to_request();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.headers.get("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["title"], "Buy milk");
    }

    #[test]
    fn query_pairs_are_encoded() {
        let endpoint = Endpoint::new("http://localhost:3000/redirect-to")
            .unwrap()
            .query("url", "http://localhost:3000/get?a=1")
            .query("status_code", "307");
        assert_eq!(
            endpoint.url().as_str(),
            "http://localhost:3000/redirect-to?url=http%3A%2F%2Flocalhost%3A3000%2Fget%3Fa%3D1&status_code=307"
        );
    }

    #[test]
    fn builders_leave_the_original_untouched() {
        let base = Endpoint::new("http://localhost:3000/get").unwrap();
        let modified = base.clone().header("Request-Header", "foobar");
        assert!(base.headers().is_empty());
        assert_eq!(modified.headers().get("request-header"), Some("foobar"));
    }

    #[test]
    fn port_falls_back_to_scheme_default() {
        let endpoint = Endpoint::new("https://example.com/basic-auth/user/pass").unwrap();
        assert_eq!(endpoint.host(), Some("example.com"));
        assert_eq!(endpoint.port(), Some(443));
    }
}
