//! Blob ID generation
//!
//! IDs double as unguessable access tokens, so characters come from the OS
//! CSPRNG rather than a seeded generator.

use super::{BlobId, BlobStore, StoreError};
use rand::distributions::Uniform;
use rand::rngs::OsRng;
use rand::Rng;

/// Default number of characters in a generated ID (62^8 ≈ 2.18e14 names)
pub const DEFAULT_ID_LENGTH: usize = 8;

/// Longest ID that is still a single filename component on common filesystems
pub const MAX_ID_LENGTH: usize = 255;

/// Digits, then upper case, then lower case letters
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Random blob ID generator
#[derive(Debug, Clone, Copy)]
pub struct IdGenerator {
    length: usize,
}

impl IdGenerator {
    /// Reject lengths that cannot name a file under the storage root
    pub const fn new(length: usize) -> Result<Self, StoreError> {
        if length == 0 || length > MAX_ID_LENGTH {
            return Err(StoreError::InvalidIdLength {
                length,
                max: MAX_ID_LENGTH,
            });
        }
        Ok(Self { length })
    }

    /// Draw `length` characters uniformly from `ALPHABET`
    pub fn generate(&self) -> BlobId {
        let dist = Uniform::from(0..ALPHABET.len());
        let id = (0..self.length)
            .map(|_| char::from(ALPHABET[OsRng.sample(dist)]))
            .collect();
        BlobId::generated(id)
    }

    /// Generate IDs until one is not taken in `store`
    ///
    /// Not atomic with the subsequent write: two concurrent callers can
    /// both be handed the same free name.
    pub fn generate_unique(&self, store: &dyn BlobStore) -> BlobId {
        loop {
            let id = self.generate();
            if !store.exists(&id) {
                return id;
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_ID_LENGTH,
        }
    }
}
