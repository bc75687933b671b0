//! Response cache policy and stores.
//!
//! The cache is write-only from a request's point of view: once a response
//! completes, the resolved `ResponseCacher` decides what (if anything) is
//! written to the session's `CacheStore`. Store failures are logged by the
//! caller and never change the delivered result.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use crate::error::CacheError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub const DEFAULT_MEMORY_CAPACITY: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: HttpMethod,
    pub url: String,
}

impl CacheKey {
    pub fn for_request(request: &HttpRequest) -> Self {
        Self {
            method: request.method,
            url: request.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoragePolicy {
    #[default]
    Allowed,
    AllowedInMemoryOnly,
    NotAllowed,
}

/// A response as stored in a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub response: HttpResponse,
    pub data: Bytes,
    pub user_info: HashMap<String, String>,
    pub storage_policy: StoragePolicy,
}

impl CachedResponse {
    pub fn new(response: HttpResponse, data: Bytes) -> Self {
        Self {
            response,
            data,
            user_info: HashMap::new(),
            storage_policy: StoragePolicy::Allowed,
        }
    }

    fn cost(&self) -> usize {
        self.data.len()
    }
}

type ModifyFn = dyn Fn(&HttpRequest, &CachedResponse) -> Option<CachedResponse> + Send + Sync;

/// Cache policy, resolved request-level first, then session-level.
#[derive(Clone)]
pub enum ResponseCacher {
    Cache,
    DoNotCache,
    /// Produce the entry to store; `None` skips storage.
    Modify(Arc<ModifyFn>),
}

impl ResponseCacher {
    pub fn modify<F>(f: F) -> Self
    where
        F: Fn(&HttpRequest, &CachedResponse) -> Option<CachedResponse> + Send + Sync + 'static,
    {
        ResponseCacher::Modify(Arc::new(f))
    }

    /// The entry to store for `request`, if any.
    pub fn apply(&self, request: &HttpRequest, proposed: CachedResponse) -> Option<CachedResponse> {
        match self {
            ResponseCacher::Cache => Some(proposed),
            ResponseCacher::DoNotCache => None,
            ResponseCacher::Modify(f) => f(request, &proposed),
        }
    }
}

impl fmt::Debug for ResponseCacher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCacher::Cache => f.write_str("Cache"),
            ResponseCacher::DoNotCache => f.write_str("DoNotCache"),
            ResponseCacher::Modify(_) => f.write_str("Modify(..)"),
        }
    }
}

/// Whether a response is proposed for caching at all: successful GETs,
/// unless the server forbids it with `Cache-Control: no-store`. A configured
/// cacher only decides what happens to a proposed entry.
pub fn default_policy_allows(request: &HttpRequest, response: &HttpResponse) -> bool {
    let no_store = response.headers.get_all("Cache-Control").any(|value| {
        value
            .split(',')
            .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"))
    });
    request.method == HttpMethod::Get && response.status == 200 && !no_store
}

pub trait CacheStore: Send + Sync {
    fn insert(&self, key: CacheKey, entry: CachedResponse) -> Result<(), CacheError>;
    fn lookup(&self, key: &CacheKey) -> Option<CachedResponse>;
    fn remove(&self, key: &CacheKey) -> Option<CachedResponse>;
    fn clear(&self);
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<CacheKey, CachedResponse>,
    order: VecDeque<CacheKey>,
    used: usize,
}

impl MemoryState {
    fn evict(&mut self, key: &CacheKey) -> Option<CachedResponse> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.used -= entry.cost();
        Some(entry)
    }
}

/// Bounded in-memory store; the oldest entries are evicted first.
#[derive(Debug)]
pub struct MemoryCacheStore {
    capacity: usize,
    state: Mutex<MemoryState>,
}

impl MemoryCacheStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn used_bytes(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).used
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl CacheStore for MemoryCacheStore {
    fn insert(&self, key: CacheKey, entry: CachedResponse) -> Result<(), CacheError> {
        if entry.storage_policy == StoragePolicy::NotAllowed {
            return Err(CacheError::StorageNotAllowed);
        }
        let size = entry.cost();
        if size > self.capacity {
            return Err(CacheError::ExceedsCapacity {
                size,
                capacity: self.capacity,
            });
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.evict(&key);
        while state.used + size > self.capacity {
            let Some(oldest) = state.order.front().cloned() else {
                break;
            };
            log::debug!("evicting cached response for {}", oldest.url);
            state.evict(&oldest);
        }
        state.used += size;
        state.order.push_back(key.clone());
        state.entries.insert(key, entry);
        Ok(())
    }

    fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.get(key).cloned()
    }

    fn remove(&self, key: &CacheKey) -> Option<CachedResponse> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.evict(key)
    }

    fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = MemoryState::default();
    }
}
