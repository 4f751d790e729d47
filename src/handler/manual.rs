//! Manual page module
//!
//! Serves the instructional text on `GET /` with the service's own URL
//! filled in.

use crate::config::AppState;
use crate::error::ServiceError;
use crate::http::mime::TEXT_PLAIN;
use crate::http::Outcome;
use hyper::header::HOST;
use hyper::HeaderMap;

/// Token in the manual replaced by `<scheme>://<host>/`
pub const URL_PLACEHOLDER: &str = "__URL__";

/// Load the manual from disk and substitute the request's base URL
///
/// The file is read on every request; a missing manual is a deployment
/// error and surfaces as `ServiceError::Manual`.
pub async fn serve_manual(headers: &HeaderMap, state: &AppState) -> Result<Outcome, ServiceError> {
    let path = &state.config.manual.path;
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ServiceError::Manual {
            path: path.clone(),
            source,
        })?;

    let url = base_url(headers, &state.config.http.default_scheme);
    Ok(Outcome::ok(render(&text, &url), TEXT_PLAIN))
}

/// `<scheme>://<host>/` as seen by the client
pub fn base_url(headers: &HeaderMap, default_scheme: &str) -> String {
    let scheme = header_str(headers, "x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_scheme);
    let host = header_str(headers, HOST.as_str()).unwrap_or("localhost");
    format!("{scheme}://{host}/")
}

pub fn render(manual: &str, url: &str) -> String {
    manual.replace(URL_PLACEHOLDER, url)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_base_url_defaults() {
        let headers = HeaderMap::new();
        assert_eq!(base_url(&headers, "https"), "https://localhost/");
    }

    #[test]
    fn test_base_url_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("paste.example.org:8443"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));

        assert_eq!(base_url(&headers, "http"), "https://paste.example.org:8443/");
    }

    #[test]
    fn test_render_replaces_every_placeholder() {
        let manual = "curl -F 'f=@file' __URL__\nthen open __URL__<id>\n";
        assert_eq!(
            render(manual, "http://h/"),
            "curl -F 'f=@file' http://h/\nthen open http://h/<id>\n"
        );
    }
}
