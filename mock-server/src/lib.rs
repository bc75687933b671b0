use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, delete, get, patch, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const BASIC_REALM: &str = "Fake Realm";
pub const DIGEST_REALM: &str = "me@kennethreitz.com";
const DIGEST_OPAQUE: &str = "5ccc069c403ebaf9f0171e9517f40e41";
const MAX_DELAY_SECS: u64 = 10;
const MAX_BYTES: usize = 100 * 1024;

/// What the echo endpoints report about the request they received.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub args: BTreeMap<String, String>,
    pub data: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Authenticated {
    pub authenticated: bool,
    pub user: String,
}

#[derive(Deserialize)]
pub struct RedirectTo {
    pub url: String,
    pub status_code: Option<u16>,
}

/// Digest nonces handed out and not yet answered.
pub type Nonces = Arc<RwLock<HashSet<String>>>;

pub fn app() -> Router {
    let nonces: Nonces = Arc::new(RwLock::new(HashSet::new()));
    Router::new()
        .route("/get", get(echo))
        .route("/post", post(echo))
        .route("/put", put(echo))
        .route("/patch", patch(echo))
        .route("/delete", delete(echo))
        .route("/anything", any(echo))
        .route("/anything/{*rest}", any(echo))
        .route("/status/{code}", any(status))
        .route("/redirect/{n}", get(redirect))
        .route("/redirect-to", any(redirect_to))
        .route("/response-headers", any(response_headers))
        .route("/basic-auth/{user}/{passwd}", get(basic_auth))
        .route("/hidden-basic-auth/{user}/{passwd}", get(hidden_basic_auth))
        .route("/digest-auth/{qop}/{user}/{passwd}", get(digest_auth))
        .route("/delay/{secs}", any(delay))
        .route("/bytes/{n}", get(random_bytes))
        .route("/cache", get(cache))
        .with_state(nonces)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn echo_of(method: &Method, uri: &Uri, headers: &HeaderMap, args: BTreeMap<String, String>, body: &[u8]) -> Echo {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    Echo {
        method: method.to_string(),
        url: format!("http://{host}{uri}"),
        headers: headers
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect(),
        args,
        data: String::from_utf8_lossy(body).into_owned(),
    }
}

async fn echo(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(args): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Json<Echo> {
    Json(echo_of(&method, &uri, &headers, args, &body))
}

async fn status(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn redirect(Path(n): Path<u32>) -> Response {
    let location = if n <= 1 { "/get".to_string() } else { format!("/redirect/{}", n - 1) };
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn redirect_to(Query(target): Query<RedirectTo>) -> Result<Response, StatusCode> {
    let status = StatusCode::from_u16(target.status_code.unwrap_or(302)).map_err(|_| StatusCode::BAD_REQUEST)?;
    if !status.is_redirection() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok((status, [(header::LOCATION, target.url)]).into_response())
}

/// Request headers and query arguments, reflected as response headers.
async fn response_headers(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(args): Query<BTreeMap<String, String>>,
) -> Response {
    let echo = echo_of(&method, &uri, &headers, args.clone(), b"");
    let mut reflected = HeaderMap::new();
    let request_headers = headers
        .iter()
        .filter(|(name, _)| !matches!(name.as_str(), "host" | "content-length" | "connection" | "transfer-encoding"))
        .map(|(name, value)| (name.clone(), value.clone()));
    let query_headers = args.iter().filter_map(|(name, value)| {
        Some((HeaderName::try_from(name.as_str()).ok()?, HeaderValue::try_from(value.as_str()).ok()?))
    });
    for (name, value) in request_headers.chain(query_headers) {
        reflected.append(name, value);
    }
    (reflected, Json(echo)).into_response()
}

fn basic_credentials_match(headers: &HeaderMap, user: &str, passwd: &str) -> bool {
    let expected = format!("Basic {}", STANDARD.encode(format!("{user}:{passwd}")));
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|value| value == expected)
}

async fn basic_auth(Path((user, passwd)): Path<(String, String)>, headers: HeaderMap) -> Response {
    if basic_credentials_match(&headers, &user, &passwd) {
        return Json(Authenticated {
            authenticated: true,
            user,
        })
        .into_response();
    }
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{BASIC_REALM}\""))],
    )
        .into_response()
}

/// Like `basic_auth`, but never challenges: only a preemptive header works.
async fn hidden_basic_auth(Path((user, passwd)): Path<(String, String)>, headers: HeaderMap) -> Response {
    if basic_credentials_match(&headers, &user, &passwd) {
        Json(Authenticated {
            authenticated: true,
            user,
        })
        .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn digest_auth(
    State(nonces): State<Nonces>,
    Path((qop, user, passwd)): Path<(String, String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Digest "));
    if let Some(params) = authorization.map(parse_params) {
        let nonce = params.get("nonce").cloned().unwrap_or_default();
        let known = nonces.write().await.remove(&nonce);
        if known && digest_matches(&params, &method, &uri, &user, &passwd) {
            return Json(Authenticated {
                authenticated: true,
                user,
            })
            .into_response();
        }
    }

    let nonce = Uuid::new_v4().simple().to_string();
    nonces.write().await.insert(nonce.clone());
    let challenge = format!(
        "Digest realm=\"{DIGEST_REALM}\", nonce=\"{nonce}\", qop=\"{qop}\", opaque=\"{DIGEST_OPAQUE}\", algorithm=MD5"
    );
    (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, challenge)]).into_response()
}

fn digest_matches(params: &HashMap<String, String>, method: &Method, uri: &Uri, user: &str, passwd: &str) -> bool {
    let field = |name: &str| params.get(name).map(String::as_str).unwrap_or_default();
    let requested_uri = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    if field("username") != user || field("uri") != requested_uri {
        return false;
    }
    let mut ha1 = md5_hex(&format!("{user}:{DIGEST_REALM}:{passwd}"));
    if field("algorithm").eq_ignore_ascii_case("MD5-sess") {
        ha1 = md5_hex(&format!("{ha1}:{}:{}", field("nonce"), field("cnonce")));
    }
    let ha2 = md5_hex(&format!("{method}:{requested_uri}"));
    let expected = match field("qop") {
        "" => md5_hex(&format!("{ha1}:{}:{ha2}", field("nonce"))),
        qop => md5_hex(&format!(
            "{ha1}:{}:{}:{}:{qop}:{ha2}",
            field("nonce"),
            field("nc"),
            field("cnonce")
        )),
    };
    field("response") == expected
}

fn md5_hex(input: &str) -> String {
    Md5::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// `key=value, key="quoted, value"` into a map with lowercased keys.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_ascii_lowercase();
        let after = after.trim_start();
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim(), &after[end..]),
                None => (after.trim(), ""),
            }
        };
        params.insert(key, value.to_string());
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }
    params
}

async fn delay(Path(secs): Path<u64>, method: Method, uri: Uri, headers: HeaderMap) -> Json<Echo> {
    tokio::time::sleep(Duration::from_secs(secs.min(MAX_DELAY_SECS))).await;
    Json(echo_of(&method, &uri, &headers, BTreeMap::new(), b""))
}

/// `n` pseudo-random bytes. Deterministic so tests can compare contents.
async fn random_bytes(Path(n): Path<usize>) -> Response {
    let body: Vec<u8> = (0..n.min(MAX_BYTES)).map(|i| (i * 31 % 251) as u8).collect();
    ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

/// A cacheable response; `?no_store=1` forbids storage.
async fn cache(Query(args): Query<BTreeMap<String, String>>) -> Response {
    let control = if args.contains_key("no_store") { "no-store" } else { "public, max-age=60" };
    ([(header::CACHE_CONTROL, control)], Json(Uuid::new_v4().to_string())).into_response()
}
