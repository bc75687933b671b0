//! Session configuration.
//!
//! Plain serde data so a session can be configured from JSON as well as in
//! code. Every field has a default; an empty object is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_MEMORY_CAPACITY;
use crate::error::SessionError;
use crate::http::HttpHeaders;
use crate::redirect::DEFAULT_MAX_REDIRECTS;

pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Resume requests as soon as their first response handler is added.
    pub start_requests_immediately: bool,
    pub max_redirects: u32,
    /// Whole-task timeout in seconds; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// Added to every request unless the request sets the same header.
    pub headers: HttpHeaders,
    /// Byte capacity of the default in-memory response cache. Zero disables
    /// the default cache.
    pub cache_memory_capacity: usize,
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json).map_err(|e| SessionError::InvalidConfiguration(e.to_string()))
    }

    /// No response cache, no persistent state.
    pub fn ephemeral() -> Self {
        Self {
            cache_memory_capacity: 0,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut headers = HttpHeaders::new();
        headers.insert("User-Agent", DEFAULT_USER_AGENT);
        Self {
            start_requests_immediately: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            timeout_secs: Some(60),
            headers,
            cache_memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}
