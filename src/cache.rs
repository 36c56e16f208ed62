use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::LoadError;
use crate::models::Dataset;
use crate::normalize::{normalize, RawTable};

/// Hex SHA-256 of an uploaded file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized datasets keyed by the content of the input they came from.
///
/// Owned by the caller; there is no process-wide instance.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<ContentHash, Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Arc<Dataset>> {
        self.entries.get(hash).cloned()
    }

    pub fn insert(&mut self, hash: ContentHash, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        self.entries.insert(hash, Arc::clone(&dataset));
        dataset
    }

    /// Returns the cached dataset for `bytes`, parsing only on a miss.
    /// Failed loads are not cached.
    pub fn get_or_load(&mut self, bytes: &[u8]) -> Result<Arc<Dataset>, LoadError> {
        let hash = ContentHash::of(bytes);
        if let Some(dataset) = self.get(&hash) {
            debug!(hash = %hash, "dataset cache hit");
            return Ok(dataset);
        }

        info!(hash = %hash, bytes = bytes.len(), "dataset cache miss, normalizing input");
        let raw = RawTable::from_bytes(bytes)?;
        let dataset = normalize(&raw)?;
        Ok(self.insert(hash, dataset))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPLOAD: &[u8] = b"DATA E HORA DE ENTRADA,TIPO\n2023-01-15,PAD\n";

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        assert_eq!(ContentHash::of(UPLOAD), ContentHash::of(UPLOAD));
        assert_ne!(ContentHash::of(UPLOAD), ContentHash::of(b"other"));
        assert_eq!(ContentHash::of(b"").as_str().len(), 64);
    }

    #[test]
    fn repeated_loads_share_one_dataset() {
        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(UPLOAD).unwrap();
        let second = cache.get_or_load(UPLOAD).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn schema_errors_are_not_cached() {
        let mut cache = DatasetCache::new();
        let err = cache.get_or_load(b"TIPO\nPAD\n").unwrap_err();
        assert!(matches!(err, LoadError::Schema(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_forgets_entries() {
        let mut cache = DatasetCache::new();
        cache.get_or_load(UPLOAD).unwrap();
        assert!(cache.get(&ContentHash::of(UPLOAD)).is_some());

        cache.clear();
        assert!(cache.get(&ContentHash::of(UPLOAD)).is_none());
    }
}
