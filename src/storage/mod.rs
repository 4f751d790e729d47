//! Blob storage module
//!
//! Owns the mapping from blob ID to byte content:
//! - `BlobId` - a bare filename component naming one blob
//! - `BlobStore` - the storage contract (read, write, existence probe)
//! - `FsBlobStore` - flat single-directory implementation
//! - `IdGenerator` - random, collision-checked identifiers

mod fs;
mod id;

pub use fs::FsBlobStore;
pub use id::IdGenerator;

use std::fmt;
use std::io;
use std::path::{Component, Path};
use thiserror::Error;

/// Identifier of a stored blob
///
/// Always a single path component: it never contains a separator and is
/// never `.` or `..`, so joining it onto the storage root cannot escape it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobId(String);

impl BlobId {
    /// Reduce an inbound request path to its final component.
    ///
    /// `"/../../etc/passwd"` becomes `passwd`, `"/a/b"` becomes `b`.
    /// Returns `None` when nothing usable is left (`"/"`, `"/.."`).
    pub fn from_request_path(path: &str) -> Option<Self> {
        let name = match Path::new(path).components().next_back()? {
            Component::Normal(name) => name.to_str()?,
            _ => return None,
        };
        if name.is_empty() || name.contains('\\') {
            return None;
        }
        Some(Self(name.to_string()))
    }

    /// Wrap a freshly generated identifier
    pub(crate) const fn generated(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing, unreadable or not a regular file. Clients never see the kind.
    #[error("blob {id} not found ({kind})")]
    NotFound { id: BlobId, kind: io::ErrorKind },

    /// The filesystem refused the write
    #[error("write denied for blob {id}")]
    Denied { id: BlobId },

    /// Exclusive create found an object already present under this ID
    #[error("blob {id} already exists")]
    Collision { id: BlobId },

    /// Configured ID length cannot form a filename
    #[error("blob ID length must be between 1 and {max}, got {length}")]
    InvalidIdLength { length: usize, max: usize },

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Blob storage contract
///
/// All calls block; callers on an async runtime run them through
/// `tokio::task::spawn_blocking`.
pub trait BlobStore: Send + Sync {
    /// Return the full contents of a blob
    fn read(&self, id: &BlobId) -> Result<Vec<u8>, StoreError>;

    /// Persist `content` under `id`
    fn write(&self, id: &BlobId, content: &[u8]) -> Result<(), StoreError>;

    /// Whether an object already occupies `id`
    fn exists(&self, id: &BlobId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_reduced_to_final_component() {
        let id = BlobId::from_request_path("/../../etc/passwd").unwrap();
        assert_eq!(id.as_str(), "passwd");

        let id = BlobId::from_request_path("a/b").unwrap();
        assert_eq!(id.as_str(), "b");

        let id = BlobId::from_request_path("/Ab3dE9xZ").unwrap();
        assert_eq!(id.as_str(), "Ab3dE9xZ");
    }

    #[test]
    fn test_trailing_slash_keeps_last_name() {
        let id = BlobId::from_request_path("/abc/").unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn test_unusable_paths_rejected() {
        assert!(BlobId::from_request_path("/").is_none());
        assert!(BlobId::from_request_path("").is_none());
        assert!(BlobId::from_request_path("/..").is_none());
        assert!(BlobId::from_request_path("/foo/..").is_none());
        assert!(BlobId::from_request_path("/a\\..\\b").is_none());
    }
}
