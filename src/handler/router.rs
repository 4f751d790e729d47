//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. The route is decided from the
//! method and path alone; each route yields an `Outcome` that is turned
//! into the wire response here.

use crate::config::AppState;
use crate::error::ServiceError;
use crate::handler::{blobs, manual};
use crate::http::{self, Outcome};
use crate::logger::{self, AccessLogEntry};
use crate::storage::BlobId;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, CONTENT_TYPE, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request routes of the share service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `GET /`
    Manual,
    /// `GET /<id>`; `None` when the path has no usable final component
    FetchBlob(Option<BlobId>),
    /// `POST` to any path
    StoreBlob,
    /// Every other method
    Reject,
}

impl Route {
    pub fn resolve(method: &Method, path: &str) -> Self {
        match method {
            &Method::GET if path == "/" => Self::Manual,
            &Method::GET => Self::FetchBlob(BlobId::from_request_path(path)),
            &Method::POST => Self::StoreBlob,
            _ => Self::Reject,
        }
    }
}

/// Main entry point for HTTP request handling
///
/// Never fails: errors the router cannot recover from are logged and
/// answered with a 500.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = access_entry(&req, peer_addr);
    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let route = Route::resolve(req.method(), req.uri().path());
    let response = match dispatch(route, req, &state).await {
        Ok(outcome) => outcome.into_response(),
        Err(e) => {
            logger::log_error(&format!("{} {}: {e}", entry.method, entry.path));
            http::build_500_response()
        }
    };

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_default();
        entry.content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Run one route to its outcome
async fn dispatch<B>(route: Route, req: Request<B>, state: &AppState) -> Result<Outcome, ServiceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match route {
        Route::Manual => manual::serve_manual(req.headers(), state).await,
        Route::FetchBlob(Some(id)) => blobs::fetch_blob(state, id).await,
        Route::FetchBlob(None) => Ok(Outcome::Fail),
        Route::StoreBlob => blobs::store_blob(req, state).await,
        Route::Reject => {
            logger::log_debug(&format!("Method not allowed: {}", req.method()));
            Ok(Outcome::Fail)
        }
    }
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = http_version(req.version()).to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}

const fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::{BlobStore, StoreError};
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use std::collections::HashSet;
    use std::path::Path;
    use tempfile::TempDir;

    const MANUAL: &str = "Upload:\n  curl -F 'file=@-' __URL__\nFetch:\n  curl __URL__<id>\n";
    const PEER: &str = "127.0.0.1:50000";

    struct Harness {
        _dir: TempDir,
        state: Arc<AppState>,
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::load_from("no-such-config-file").unwrap();
        config.storage.root = dir.join("blobs");
        config.manual.path = dir.join("HOWTO");
        config.logging.access_log = false;
        config
    }

    fn harness_with(configure: impl FnOnce(&mut Config)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("HOWTO"), MANUAL).unwrap();
        let mut config = test_config(dir.path());
        configure(&mut config);
        let state = Arc::new(AppState::new(&config).unwrap());
        Harness { _dir: dir, state }
    }

    fn harness() -> Harness {
        harness_with(|_| {})
    }

    fn request(method: &str, uri: &str) -> hyper::http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    fn empty(method: &str, uri: &str) -> Request<Full<Bytes>> {
        request(method, uri).body(Full::new(Bytes::new())).unwrap()
    }

    fn form(body: &str) -> Request<Full<Bytes>> {
        request("POST", "/")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    fn file_upload(content: &[u8]) -> Request<Full<Bytes>> {
        let boundary = "XyZzYbOuNdArY";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        request("POST", "/")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }

    async fn send(h: &Harness, req: Request<Full<Bytes>>) -> (StatusCode, hyper::HeaderMap, Bytes) {
        let resp = handle_request(req, Arc::clone(&h.state), PEER.parse().unwrap())
            .await
            .unwrap();
        let (parts, body) = resp.into_parts();
        let body = body.collect().await.unwrap().to_bytes();
        (parts.status, parts.headers, body)
    }

    /// Upload and return the redirect location
    async fn store(h: &Harness, req: Request<Full<Bytes>>) -> String {
        let (status, headers, _) = send(h, req).await;
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        headers["location"].to_str().unwrap().to_string()
    }

    #[test]
    fn test_route_resolution() {
        assert_eq!(Route::resolve(&Method::GET, "/"), Route::Manual);
        assert_eq!(
            Route::resolve(&Method::GET, "/abc"),
            Route::FetchBlob(BlobId::from_request_path("abc"))
        );
        assert_eq!(
            Route::resolve(&Method::GET, "/../../etc/passwd"),
            Route::FetchBlob(BlobId::from_request_path("passwd"))
        );
        assert_eq!(Route::resolve(&Method::POST, "/anything/here"), Route::StoreBlob);
        assert_eq!(Route::resolve(&Method::DELETE, "/abc"), Route::Reject);
        assert_eq!(Route::resolve(&Method::HEAD, "/"), Route::Reject);
        assert_eq!(Route::resolve(&Method::PUT, "/"), Route::Reject);
    }

    #[tokio::test]
    async fn test_store_then_fetch_text() {
        let h = harness();

        let (status, headers, body) = send(&h, form("file=hello")).await;
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(headers["content-type"], "text/plain");
        let location = headers["location"].to_str().unwrap().to_string();
        assert_eq!(location.len(), 9);
        assert!(location.starts_with('/'));
        assert_eq!(body, location[1..].as_bytes());

        let (status, headers, body) = send(&h, empty("GET", &location)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "text/plain");
        assert_eq!(headers["content-length"], "5");
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn test_binary_round_trip_keeps_type_and_bytes() {
        let h = harness();
        let png = [
            0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H',
            b'D', b'R', 0xFF, 0x00,
        ];

        let location = store(&h, file_upload(&png)).await;
        let (status, headers, body) = send(&h, empty("GET", &location)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "image/png");
        assert_eq!(body.as_ref(), png.as_slice());
    }

    #[tokio::test]
    async fn test_unknown_binary_served_as_text_plain() {
        let h = harness();
        let blob = [0x00, 0x01, 0x02, 0x03, 0xFE, 0xFF, 0x00, 0x10];

        let location = store(&h, file_upload(&blob)).await;
        let (_, headers, body) = send(&h, empty("GET", &location)).await;

        assert_eq!(headers["content-type"], "text/plain");
        assert_eq!(body.as_ref(), blob.as_slice());
    }

    #[tokio::test]
    async fn test_repeated_fetch_is_identical() {
        let h = harness();
        let location = store(&h, form("file=%3C%21DOCTYPE+html%3E%3Cp%3Ehi")).await;

        let first = send(&h, empty("GET", &location)).await;
        let second = send(&h, empty("GET", &location)).await;

        assert_eq!(first.0, StatusCode::OK);
        assert_eq!(first.1["content-type"], "text/plain");
        assert_eq!(first.1["content-type"], second.1["content-type"]);
        assert_eq!(first.2, second.2);
        assert_eq!(first.2, "<!DOCTYPE html><p>hi");
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let h = harness();
        let mut seen = HashSet::new();
        for i in 0..25 {
            let location = store(&h, form(&format!("file=blob{i}"))).await;
            assert!(seen.insert(location));
        }
    }

    #[tokio::test]
    async fn test_fetch_missing_is_451() {
        let h = harness();

        let (status, headers, body) = send(&h, empty("GET", "/doesnotexist")).await;

        assert_eq!(status.as_u16(), 451);
        assert_eq!(headers["content-type"], "text/plain");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_empty_blob_is_451() {
        let h = harness();
        std::fs::write(h.state.config.storage.root.join("emptyone"), b"").unwrap();

        let (status, _, body) = send(&h, empty("GET", "/emptyone")).await;

        assert_eq!(status.as_u16(), 451);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_cannot_leave_storage_root() {
        let h = harness();
        // HOWTO sits next to the storage root, one level up
        let (status, _, body) = send(&h, empty("GET", "/../HOWTO")).await;

        assert_eq!(status.as_u16(), 451);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_manual_substitutes_url() {
        let h = harness();
        let req = request("GET", "/")
            .header("host", "share.example.org")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let (status, headers, body) = send(&h, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "text/plain");
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("curl -F 'file=@-' http://share.example.org/\n"));
        assert!(text.contains("curl http://share.example.org/<id>"));
        assert!(!text.contains("__URL__"));
    }

    #[tokio::test]
    async fn test_missing_manual_is_server_error() {
        let h = harness_with(|config| config.manual.path = "/nonexistent/HOWTO".into());

        let (status, _, _) = send(&h, empty("GET", "/")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_other_methods_are_451() {
        let h = harness();
        let location = store(&h, form("file=keep")).await;

        for method in ["DELETE", "PUT", "HEAD", "PATCH", "OPTIONS"] {
            let (status, _, body) = send(&h, empty(method, &location)).await;
            assert_eq!(status.as_u16(), 451, "{method}");
            assert!(body.is_empty());
        }

        let (status, _, body) = send(&h, empty("GET", &location)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "keep");
    }

    #[tokio::test]
    async fn test_empty_upload_is_451() {
        let h = harness();

        for req in [empty("POST", "/"), form("file="), form("")] {
            let (status, _, body) = send(&h, req).await;
            assert_eq!(status.as_u16(), 451);
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_451() {
        let h = harness();
        let req = request("POST", "/")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(b"{\"file\":\"x\"}")))
            .unwrap();

        let (status, _, _) = send(&h, req).await;

        assert_eq!(status.as_u16(), 451);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_451() {
        let h = harness_with(|config| config.http.max_body_size = 16);

        let (status, _, _) = send(&h, form("file=this body is longer than sixteen bytes")).await;
        assert_eq!(status.as_u16(), 451);

        let (status, _, _) = send(&h, form("file=short")).await;
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    }

    #[tokio::test]
    async fn test_exclusive_create_round_trip() {
        let h = harness_with(|config| config.storage.exclusive_create = true);

        let location = store(&h, form("file=exclusive")).await;
        let (status, _, body) = send(&h, empty("GET", &location)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "exclusive");
    }

    /// Store whose every write is refused by the filesystem
    struct DenyingStore;

    impl BlobStore for DenyingStore {
        fn read(&self, id: &BlobId) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::NotFound {
                id: id.clone(),
                kind: std::io::ErrorKind::NotFound,
            })
        }

        fn write(&self, id: &BlobId, _content: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Denied { id: id.clone() })
        }

        fn exists(&self, _id: &BlobId) -> bool {
            false
        }
    }

    fn denying_harness(report_denied_writes: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.storage.report_denied_writes = report_denied_writes;
        let state = Arc::new(AppState::with_store(&config, Arc::new(DenyingStore)).unwrap());
        Harness { _dir: dir, state }
    }

    #[tokio::test]
    async fn test_denied_write_still_redirects_by_default() {
        let h = denying_harness(false);

        let location = store(&h, form("file=lost")).await;
        let (status, _, _) = send(&h, empty("GET", &location)).await;

        assert_eq!(status.as_u16(), 451);
    }

    #[tokio::test]
    async fn test_denied_write_reported_when_configured() {
        let h = denying_harness(true);

        let (status, _, _) = send(&h, form("file=lost")).await;

        assert_eq!(status.as_u16(), 451);
    }
}
