//! Flat directory blob store
//!
//! Every blob is one file directly under the storage root, named by its ID
//! with no extension and no sidecar metadata.

use super::{BlobId, BlobStore, StoreError};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Filesystem-backed blob store
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    /// Create with `O_EXCL` and report `Collision` instead of overwriting
    exclusive_create: bool,
}

impl FsBlobStore {
    /// Open the store, creating the root directory if it does not exist
    pub fn open(root: impl AsRef<Path>, exclusive_create: bool) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        if !fs::metadata(&root)?.is_dir() {
            return Err(StoreError::Io(io::Error::new(
                ErrorKind::NotADirectory,
                format!("storage root is not a directory: {}", root.display()),
            )));
        }
        Ok(Self {
            root,
            exclusive_create,
        })
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

impl BlobStore for FsBlobStore {
    fn read(&self, id: &BlobId) -> Result<Vec<u8>, StoreError> {
        fs::read(self.blob_path(id)).map_err(|e| match e.kind() {
            kind @ (ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::IsADirectory) => {
                StoreError::NotFound {
                    id: id.clone(),
                    kind,
                }
            }
            _ => StoreError::Io(e),
        })
    }

    fn write(&self, id: &BlobId, content: &[u8]) -> Result<(), StoreError> {
        let mut options = OpenOptions::new();
        options.write(true);
        if self.exclusive_create {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }

        let mut file = options.open(self.blob_path(id)).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => StoreError::Denied { id: id.clone() },
            ErrorKind::AlreadyExists => StoreError::Collision { id: id.clone() },
            _ => StoreError::Io(e),
        })?;
        file.write_all(content)?;
        Ok(())
    }

    fn exists(&self, id: &BlobId) -> bool {
        // Only a definite NotFound frees the name
        match fs::symlink_metadata(self.blob_path(id)) {
            Ok(_) => true,
            Err(e) => e.kind() != ErrorKind::NotFound,
        }
    }
}
