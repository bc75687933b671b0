//! Authentication challenges, credentials and the policy that answers them.
//!
//! A 401 (or 407 from a proxy) carrying a `WWW-Authenticate`
//! (`Proxy-Authenticate`) header is turned into an `AuthChallenge`. The
//! resolved `Authenticator` decides how to answer it; the request state
//! machine enforces the attempt cap and rewrites the request with the
//! computed `Authorization` header.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};
use url::Url;
use uuid::Uuid;

use crate::http::{HttpRequest, HttpResponse};

/// Credential attempts allowed per request before the challenge response
/// becomes the terminal result.
pub const MAX_AUTHENTICATION_ATTEMPTS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    Basic,
    Digest,
}

impl AuthScheme {
    fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("basic") {
            Some(AuthScheme::Basic)
        } else if token.eq_ignore_ascii_case("digest") {
            Some(AuthScheme::Digest)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Persistence {
    /// Used for this request only, never retained by a store.
    None,
    #[default]
    ForSession,
    Permanent,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub persistence: Persistence,
}

impl Credential {
    pub fn new(username: &str, password: &str, persistence: Persistence) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            persistence,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("persistence", &self.persistence)
            .finish()
    }
}

/// The scope a credential applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtectionSpace {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub realm: Option<String>,
    pub scheme: AuthScheme,
    pub proxy: bool,
}

/// A server's demand for credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: AuthScheme,
    pub realm: Option<String>,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub proxy: bool,
    /// Credential attempts already made on this request.
    pub previous_failure_count: u32,
    /// Every auth-param of the challenge, keys lowercased.
    pub params: HashMap<String, String>,
}

impl AuthChallenge {
    /// Build a challenge from a 401/407 response to `request`. Returns `None`
    /// when the response carries no challenge with a supported scheme.
    pub fn from_response(request: &HttpRequest, response: &HttpResponse) -> Option<Self> {
        let (header, proxy) = match response.status {
            401 => ("WWW-Authenticate", false),
            407 => ("Proxy-Authenticate", true),
            _ => return None,
        };
        let url = Url::parse(&request.url).ok()?;
        let (scheme, params) = response
            .headers
            .get_all(header)
            .filter_map(parse_challenge)
            // Digest is preferred when a server offers both.
            .max_by_key(|(scheme, _)| *scheme == AuthScheme::Digest)?;
        Some(Self {
            scheme,
            realm: params.get("realm").cloned(),
            host: url.host_str()?.to_string(),
            port: url.port_or_known_default()?,
            protocol: url.scheme().to_string(),
            proxy,
            previous_failure_count: 0,
            params,
        })
    }

    pub fn protection_space(&self) -> ProtectionSpace {
        ProtectionSpace {
            host: self.host.clone(),
            port: self.port,
            protocol: self.protocol.clone(),
            realm: self.realm.clone(),
            scheme: self.scheme,
            proxy: self.proxy,
        }
    }

    /// Header name the answer to this challenge travels in.
    pub fn authorization_header(&self) -> &'static str {
        if self.proxy {
            "Proxy-Authorization"
        } else {
            "Authorization"
        }
    }

    /// Compute the authorization header value answering this challenge for
    /// `request` with `credential`.
    pub fn authorization_value(&self, request: &HttpRequest, credential: &Credential) -> String {
        match self.scheme {
            AuthScheme::Basic => basic_authorization(&credential.username, &credential.password),
            AuthScheme::Digest => self.digest_authorization(request, credential, &new_cnonce()),
        }
    }

    fn digest_authorization(&self, request: &HttpRequest, credential: &Credential, cnonce: &str) -> String {
        let realm = self.realm.as_deref().unwrap_or_default();
        let nonce = self.params.get("nonce").map(String::as_str).unwrap_or_default();
        let algorithm = self.params.get("algorithm").map(String::as_str).unwrap_or("MD5");
        let uri = request_uri(&request.url);
        let nc = "00000001";

        let mut ha1 = md5_hex(&format!("{}:{realm}:{}", credential.username, credential.password));
        if algorithm.eq_ignore_ascii_case("MD5-sess") {
            ha1 = md5_hex(&format!("{ha1}:{nonce}:{cnonce}"));
        }
        let ha2 = md5_hex(&format!("{}:{uri}", request.method));
        let qop_auth = self
            .params
            .get("qop")
            .is_some_and(|qop| qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")));

        let mut value = format!(
            "Digest username=\"{}\", realm=\"{realm}\", nonce=\"{nonce}\", uri=\"{uri}\"",
            credential.username
        );
        if qop_auth {
            let response = md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:auth:{ha2}"));
            value.push_str(&format!(
                ", qop=auth, nc={nc}, cnonce=\"{cnonce}\", response=\"{response}\""
            ));
        } else {
            let response = md5_hex(&format!("{ha1}:{nonce}:{ha2}"));
            value.push_str(&format!(", response=\"{response}\""));
        }
        if let Some(opaque) = self.params.get("opaque") {
            value.push_str(&format!(", opaque=\"{opaque}\""));
        }
        value.push_str(&format!(", algorithm={algorithm}"));
        value
    }
}

/// `Authorization` header value for HTTP Basic.
pub fn basic_authorization(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Parse one challenge (`Scheme k=v, k="v"`) from a header value.
pub fn parse_challenge(value: &str) -> Option<(AuthScheme, HashMap<String, String>)> {
    let value = value.trim();
    let (token, rest) = match value.find(char::is_whitespace) {
        Some(i) => (&value[..i], &value[i..]),
        None => (value, ""),
    };
    let scheme = AuthScheme::parse(token)?;
    Some((scheme, parse_auth_params(rest)))
}

/// Parse comma-separated auth-params, honoring quoted strings and
/// backslash escapes inside them.
pub fn parse_auth_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() && chars.peek().is_none() {
            break;
        }
        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            if chars.peek() == Some(&'"') {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => value.push(c),
                    }
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value = value.trim().to_string();
            }
        }
        if !key.is_empty() {
            params.insert(key, value);
        }
        if chars.peek().is_none() {
            break;
        }
    }
    params
}

fn request_uri(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

fn new_cnonce() -> String {
    Uuid::new_v4().simple().to_string()
}

fn md5_hex(input: &str) -> String {
    bytes_to_hex(&Md5::digest(input.as_bytes()))
}

fn bytes_to_hex(b: &[u8]) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut s = String::with_capacity(b.len() * 2);
    for &x in b {
        s.push(HEX[(x >> 4) as usize] as char);
        s.push(HEX[(x & 15) as usize] as char);
    }
    s
}

/// How to answer a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDisposition {
    UseCredential(Credential),
    /// Look the protection space up in the session's credential store.
    UseStoredCredential,
    /// Stop answering; the challenge response becomes the terminal result.
    CancelAuthentication,
}

type AuthFn = dyn Fn(&AuthChallenge, Option<&Credential>) -> AuthDisposition + Send + Sync;

/// Authentication policy, resolved request-level first, then session-level.
#[derive(Clone, Default)]
pub enum Authenticator {
    /// Explicit credential first, then the credential store, each once.
    #[default]
    Standard,
    DoNotAuthenticate,
    Custom(Arc<AuthFn>),
}

impl Authenticator {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&AuthChallenge, Option<&Credential>) -> AuthDisposition + Send + Sync + 'static,
    {
        Authenticator::Custom(Arc::new(f))
    }

    pub fn decide(&self, challenge: &AuthChallenge, supplied: Option<&Credential>) -> AuthDisposition {
        match self {
            Authenticator::Standard => {
                if challenge.previous_failure_count > 0 {
                    return AuthDisposition::CancelAuthentication;
                }
                match supplied {
                    Some(credential) => AuthDisposition::UseCredential(credential.clone()),
                    None => AuthDisposition::UseStoredCredential,
                }
            }
            Authenticator::DoNotAuthenticate => AuthDisposition::CancelAuthentication,
            Authenticator::Custom(f) => f(challenge, supplied),
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authenticator::Standard => f.write_str("Standard"),
            Authenticator::DoNotAuthenticate => f.write_str("DoNotAuthenticate"),
            Authenticator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Credential lookup, shared across requests of a session.
pub trait CredentialStore: Send + Sync {
    fn lookup(&self, space: &ProtectionSpace) -> Option<Credential>;
    fn store(&self, credential: Credential, space: ProtectionSpace);
    fn remove(&self, space: &ProtectionSpace) -> Option<Credential>;
}

/// Process-local credential store. `Persistence::None` credentials are
/// ignored by `store`.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: RwLock<HashMap<ProtectionSpace, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn lookup(&self, space: &ProtectionSpace) -> Option<Credential> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(space).cloned()
    }

    fn store(&self, credential: Credential, space: ProtectionSpace) {
        if credential.persistence == Persistence::None {
            log::debug!("not storing credential with no persistence for {}", space.host);
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(space, credential);
    }

    fn remove(&self, space: &ProtectionSpace) -> Option<Credential> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(space)
    }
}
