//! Errors that escape request routing
//!
//! Everything the router can recover from is turned into an `Outcome`
//! before reaching this type; a `ServiceError` means the request could not
//! be answered at all and the connection layer replies with a 500.

use crate::storage::StoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to load manual {}: {source}", path.display())]
    Manual { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("blocking storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
