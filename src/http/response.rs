//! HTTP response building module
//!
//! Maps the logical request outcomes onto wire responses. Every failure the
//! service recognizes is answered with the same 451, whatever the cause.

use crate::http::mime::TEXT_PLAIN;
use crate::storage::BlobId;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

/// Logical result of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Content served with its MIME type
    Ok { content: Bytes, mime: &'static str },
    /// Uniform failure, no detail given to the client
    Fail,
    /// Upload stored, send the client to its new location
    Redirect(BlobId),
}

impl Outcome {
    pub fn ok(content: impl Into<Bytes>, mime: &'static str) -> Self {
        Self::Ok {
            content: content.into(),
            mime,
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        match self {
            Self::Ok { content, mime } => build_ok_response(content, mime),
            Self::Fail => build_451_response(),
            Self::Redirect(id) => build_redirect_response(&id),
        }
    }
}

/// Build 200 OK response
pub fn build_ok_response(content: Bytes, mime: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", mime)
        .header("Content-Length", content.len())
        .body(Full::new(content))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 451 Unavailable For Legal Reasons response
pub fn build_451_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS)
        .header("Content-Type", TEXT_PLAIN)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("451", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 301 redirect to a stored blob
pub fn build_redirect_response(id: &BlobId) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header("Content-Type", TEXT_PLAIN)
        .header("Location", format!("/{id}"))
        .body(Full::new(Bytes::from(id.to_string())))
        .unwrap_or_else(|e| {
            log_build_error("301", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 500 response for errors the service does not recover from
pub fn build_500_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("Content-Type", TEXT_PLAIN)
        .body(Full::new(Bytes::from("500 Internal Server Error")))
        .unwrap_or_else(|e| {
            log_build_error("500", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_bytes(resp: Response<Full<Bytes>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_ok_sets_type_and_length() {
        let resp = Outcome::ok(Bytes::from_static(b"hello"), "text/plain").into_response();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "text/plain");
        assert_eq!(resp.headers()["content-length"], "5");
        assert_eq!(body_bytes(resp).await, "hello");
    }

    #[tokio::test]
    async fn test_fail_is_451_with_empty_body() {
        let resp = Outcome::Fail.into_response();

        assert_eq!(resp.status().as_u16(), 451);
        assert_eq!(resp.headers()["content-type"], "text/plain");
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_redirect_points_at_blob() {
        let id = BlobId::from_request_path("/aB3dE9xZ").unwrap();
        let resp = Outcome::Redirect(id).into_response();

        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()["location"], "/aB3dE9xZ");
        assert_eq!(resp.headers()["content-type"], "text/plain");
        assert_eq!(body_bytes(resp).await, "aB3dE9xZ");
    }

    #[test]
    fn test_500_status() {
        assert_eq!(
            build_500_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
