// Application state module
// Built once at startup and shared by every connection

use std::sync::Arc;

use super::types::Config;
use crate::storage::{BlobStore, FsBlobStore, IdGenerator, StoreError};

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn BlobStore>,
    pub ids: IdGenerator,
}

impl AppState {
    /// Open the configured storage root and build the state around it
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let store = FsBlobStore::open(&config.storage.root, config.storage.exclusive_create)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Build state around an already opened store
    pub fn with_store(config: &Config, store: Arc<dyn BlobStore>) -> Result<Self, StoreError> {
        Ok(Self {
            config: config.clone(),
            store,
            ids: IdGenerator::new(config.storage.id_length)?,
        })
    }
}
