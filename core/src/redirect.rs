//! Redirect policy and the rules for building the follow-up request.
//!
//! # Redirect rules
//! - 301, 302, 303, 307 and 308 with a resolvable `Location` are redirects;
//!   300, 304, 305 and 306 are final responses.
//! - 301/302 turn POST into GET without a body; other methods are kept.
//! - 303 turns every method except HEAD into GET without a body.
//! - 307/308 keep method and body.
//! - Credentials and cookies are dropped when the origin changes.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Redirects followed before a request fails with `TooManyRedirects`.
pub const DEFAULT_MAX_REDIRECTS: u32 = 16;

const ORIGIN_BOUND_HEADERS: [&str; 3] = ["Authorization", "Proxy-Authorization", "Cookie"];
const BODY_HEADERS: [&str; 2] = ["Content-Type", "Content-Length"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    FollowAsIs,
    FollowWithModifiedRequest(HttpRequest),
    DoNotFollow,
}

type ModifyFn = dyn Fn(&HttpRequest, &HttpResponse, &HttpRequest) -> Option<HttpRequest> + Send + Sync;

/// Redirect policy, resolved request-level first, then session-level.
#[derive(Clone)]
pub enum Redirector {
    Follow,
    DoNotFollow,
    /// Transform `(original, response, proposed)` into the request to send.
    /// `None` stops redirection.
    Modify(Arc<ModifyFn>),
}

impl Redirector {
    pub fn modify<F>(f: F) -> Self
    where
        F: Fn(&HttpRequest, &HttpResponse, &HttpRequest) -> Option<HttpRequest> + Send + Sync + 'static,
    {
        Redirector::Modify(Arc::new(f))
    }

    pub fn decide(
        &self,
        proposed: &HttpRequest,
        response: &HttpResponse,
        original: &HttpRequest,
    ) -> RedirectDecision {
        match self {
            Redirector::Follow => RedirectDecision::FollowAsIs,
            Redirector::DoNotFollow => RedirectDecision::DoNotFollow,
            Redirector::Modify(f) => match f(original, response, proposed) {
                Some(request) => RedirectDecision::FollowWithModifiedRequest(request),
                None => RedirectDecision::DoNotFollow,
            },
        }
    }
}

impl fmt::Debug for Redirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirector::Follow => f.write_str("Follow"),
            Redirector::DoNotFollow => f.write_str("DoNotFollow"),
            Redirector::Modify(_) => f.write_str("Modify(..)"),
        }
    }
}

pub fn is_redirect_status(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Build the request a client should send after `response` answered
/// `request`, or `None` when the response is not a followable redirect.
pub fn follow_up_request(request: &HttpRequest, response: &HttpResponse) -> Option<HttpRequest> {
    if !is_redirect_status(response.status) {
        return None;
    }
    let location = response.headers.get("Location")?;
    let base = Url::parse(&request.url).ok()?;
    let target = match base.join(location) {
        Ok(target) => target,
        Err(e) => {
            log::warn!("ignoring unusable redirect location {location:?}: {e}");
            return None;
        }
    };

    let mut next = request.clone();
    next.url = target.to_string();

    let rewrite_to_get = match response.status {
        301 | 302 => request.method == HttpMethod::Post,
        303 => request.method != HttpMethod::Head,
        _ => false,
    };
    if rewrite_to_get {
        next.method = HttpMethod::Get;
        next.body = None;
        for name in BODY_HEADERS {
            next.headers.remove(name);
        }
    }

    if base.origin() != target.origin() {
        for name in ORIGIN_BOUND_HEADERS {
            next.headers.remove(name);
        }
    }
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpHeaders;

    fn redirect(status: u16, location: &str) -> HttpResponse {
        HttpResponse {
            url: "http://localhost:3000/redirect/1".to_string(),
            status,
            headers: [("Location", location)].into_iter().collect(),
        }
    }

    fn post() -> HttpRequest {
        let mut req = HttpRequest::new(HttpMethod::Post, "http://localhost:3000/redirect/1");
        req.headers.insert("Content-Type", "application/json");
        req.headers.insert("Authorization", "Basic abc");
        req.body = Some(b"{}".to_vec());
        req
    }

    #[test]
    fn relative_location_resolves_against_request() {
        let req = HttpRequest::new(HttpMethod::Get, "http://localhost:3000/redirect/2");
        let next = follow_up_request(&req, &redirect(302, "/redirect/1")).unwrap();
        assert_eq!(next.url, "http://localhost:3000/redirect/1");
        assert_eq!(next.method, HttpMethod::Get);
    }

    #[test]
    fn found_rewrites_post_to_get() {
        let next = follow_up_request(&post(), &redirect(302, "/get")).unwrap();
        assert_eq!(next.method, HttpMethod::Get);
        assert!(next.body.is_none());
        assert!(!next.headers.contains("content-type"));
        assert_eq!(next.headers.get("authorization"), Some("Basic abc"));
    }

    #[test]
    fn see_other_rewrites_put_but_not_head() {
        let mut put = post();
        put.method = HttpMethod::Put;
        let next = follow_up_request(&put, &redirect(303, "/get")).unwrap();
        assert_eq!(next.method, HttpMethod::Get);

        let head = HttpRequest::new(HttpMethod::Head, "http://localhost:3000/redirect/1");
        let next = follow_up_request(&head, &redirect(303, "/get")).unwrap();
        assert_eq!(next.method, HttpMethod::Head);
    }

    #[test]
    fn temporary_redirect_preserves_method_and_body() {
        let next = follow_up_request(&post(), &redirect(307, "/post")).unwrap();
        assert_eq!(next.method, HttpMethod::Post);
        assert_eq!(next.body.as_deref(), Some(&b"{}"[..]));
        assert_eq!(next.headers.get("content-type"), Some("application/json"));
    }

    #[test]
    fn cross_origin_redirect_drops_credentials() {
        let next = follow_up_request(&post(), &redirect(308, "https://example.com/post")).unwrap();
        assert!(!next.headers.contains("authorization"));
        assert_eq!(next.url, "https://example.com/post");
    }

    #[test]
    fn non_redirect_statuses_are_final() {
        let req = HttpRequest::new(HttpMethod::Get, "http://localhost:3000/");
        for status in [200, 300, 304, 305, 306] {
            assert!(follow_up_request(&req, &redirect(status, "/get")).is_none(), "{status}");
        }
        let missing = HttpResponse {
            url: req.url.clone(),
            status: 302,
            headers: HttpHeaders::new(),
        };
        assert!(follow_up_request(&req, &missing).is_none());
    }

    #[test]
    fn modify_returning_none_does_not_follow() {
        let req = HttpRequest::new(HttpMethod::Get, "http://localhost:3000/redirect/1");
        let resp = redirect(302, "/get");
        let proposed = follow_up_request(&req, &resp).unwrap();

        let redirector = Redirector::modify(|_, _, _| None);
        assert_eq!(redirector.decide(&proposed, &resp, &req), RedirectDecision::DoNotFollow);

        let redirector = Redirector::modify(|original, _, _| {
            let mut patched = original.clone();
            patched.method = HttpMethod::Patch;
            Some(patched)
        });
        match redirector.decide(&proposed, &resp, &req) {
            RedirectDecision::FollowWithModifiedRequest(r) => assert_eq!(r.method, HttpMethod::Patch),
            other => panic!("unexpected decision {other:?}"),
        }
        assert_eq!(Redirector::Follow.decide(&proposed, &resp, &req), RedirectDecision::FollowAsIs);
    }
}
