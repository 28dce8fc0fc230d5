//! In-memory media deduplication.
//!
//! Tracks content hashes of every media file downloaded during one scrape
//! run. The set is shared across channel tasks, so concurrent channels
//! deduplicate against each other. It lives only for the process lifetime;
//! restarting the scraper resets it. Cross-run deduplication would need a
//! persisted hash ledger, which this deliberately does not implement.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Mutex;

/// Run-scoped set of hex SHA-256 digests of downloaded media.
#[derive(Debug, Default)]
pub struct MediaDedup {
    seen: Mutex<HashSet<String>>,
}

impl MediaDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `hash`; returns `false` if it was already present.
    pub fn insert(&self, hash: &str) -> bool {
        self.seen.lock().unwrap().insert(hash.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hex SHA-256 digest of a byte buffer.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_is_new_second_is_duplicate() {
        let dedup = MediaDedup::new();
        let hash = content_hash(b"same bytes");
        assert!(dedup.insert(&hash));
        assert!(!dedup.insert(&hash));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn distinct_content_yields_distinct_hashes() {
        assert_ne!(content_hash(b"pill"), content_hash(b"cream"));
    }
}
