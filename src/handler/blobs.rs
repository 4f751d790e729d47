//! Blob fetch and upload handlers
//!
//! Storage calls block, so they run on tokio's blocking pool together with
//! the content sniffing that follows a read.

use crate::config::AppState;
use crate::error::ServiceError;
use crate::http::{self, mime, Outcome};
use crate::logger;
use crate::storage::{BlobId, BlobStore, IdGenerator, StoreError};
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::Request;
use std::sync::Arc;

/// What happened to an upload that reached the store
#[derive(Debug)]
enum Persisted {
    Written(BlobId),
    Denied(BlobId),
}

/// Read a blob and classify it for serving
pub async fn fetch_blob(state: &AppState, id: BlobId) -> Result<Outcome, ServiceError> {
    let store = Arc::clone(&state.store);
    let read = tokio::task::spawn_blocking(move || {
        store.read(&id).map(|content| {
            let mime = mime::classify(&content);
            (content, mime)
        })
    })
    .await?;

    match read {
        // An empty blob is indistinguishable from a failed write
        Ok((content, _)) if content.is_empty() => {
            logger::log_debug("Blob is empty, not serving it");
            Ok(Outcome::Fail)
        }
        Ok((content, mime)) => Ok(Outcome::ok(content, mime)),
        Err(e @ StoreError::NotFound { .. }) => {
            logger::log_debug(&e.to_string());
            Ok(Outcome::Fail)
        }
        Err(e) => Err(e.into()),
    }
}

/// Decode an upload, store it under a fresh ID and redirect to it
pub async fn store_blob<B>(req: Request<B>, state: &AppState) -> Result<Outcome, ServiceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let max_body_size = state.config.http.max_body_size;
    if exceeds_declared_length(&req, max_body_size) {
        return Ok(Outcome::Fail);
    }

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let body = match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            logger::log_warning(&format!("Upload body rejected: {e}"));
            return Ok(Outcome::Fail);
        }
    };

    let payload = match http::extract_payload(content_type.as_deref(), &body) {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            logger::log_debug("Upload carried no non-empty field");
            return Ok(Outcome::Fail);
        }
        Err(e) => {
            logger::log_warning(&format!("Upload not decodable: {e}"));
            return Ok(Outcome::Fail);
        }
    };
    let content = payload.into_bytes();

    let store = Arc::clone(&state.store);
    let ids = state.ids;
    let persisted = tokio::task::spawn_blocking(move || persist(store.as_ref(), ids, &content)).await??;

    match persisted {
        Persisted::Written(id) => {
            logger::log_debug(&format!("Stored blob {id}"));
            Ok(Outcome::Redirect(id))
        }
        Persisted::Denied(id) => {
            logger::log_warning(&format!("Write denied for blob {id}"));
            if state.config.storage.report_denied_writes {
                Ok(Outcome::Fail)
            } else {
                Ok(Outcome::Redirect(id))
            }
        }
    }
}

/// Pick a free ID and write; only an exclusive-create collision is retried
fn persist(store: &dyn BlobStore, ids: IdGenerator, content: &[u8]) -> Result<Persisted, StoreError> {
    loop {
        let id = ids.generate_unique(store);
        match store.write(&id, content) {
            Ok(()) => return Ok(Persisted::Written(id)),
            Err(StoreError::Denied { id }) => return Ok(Persisted::Denied(id)),
            Err(StoreError::Collision { id }) => {
                logger::log_debug(&format!("Blob {id} created concurrently, picking another ID"));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check Content-Length against the upload limit before reading the body
fn exceeds_declared_length<B>(req: &Request<B>, max_body_size: u64) -> bool {
    let Some(content_length) = req.headers().get(CONTENT_LENGTH) else {
        return false;
    };
    match content_length.to_str().map(str::parse::<u64>) {
        Ok(Ok(size)) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            true
        }
        Ok(Ok(_)) => false,
        _ => {
            logger::log_warning("Invalid Content-Length header, relying on body limit");
            false
        }
    }
}
