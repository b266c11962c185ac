//! Text embedding support for semantic search.
//!
//! This crate does not compute embeddings itself; the embedding model is an
//! external capability injected through the [`TextEmbedder`] trait. The
//! module also provides the bounded [`EmbeddingCache`] the engine uses to
//! avoid re-embedding repeated or FAQ-style queries.
//!
//! # Custom implementation
//!
//! ```
//! use async_trait::async_trait;
//! use arnika::embedding::TextEmbedder;
//! use arnika::error::Result;
//!
//! struct MyEmbedder {
//!     dimension: usize,
//! }
//!
//! #[async_trait]
//! impl TextEmbedder for MyEmbedder {
//!     async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
//!         Ok(vec![0.0; self.dimension])
//!     }
//!
//!     fn dimension(&self) -> usize {
//!         self.dimension
//!     }
//! }
//! ```

use std::collections::VecDeque;
use std::hash::{BuildHasher, Hash, Hasher};

use ahash::{AHashMap, RandomState};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

/// Trait for converting text to vector embeddings.
///
/// Implementations must be deterministic for a fixed text and model
/// version, and must return normalized vectors of [`dimension`](Self::dimension)
/// length. Calls are potentially slow, blocking operations; implementors
/// should not hold locks across them.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed a single text into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The dimensionality of vectors this embedder produces.
    fn dimension(&self) -> usize;
}

/// A bounded query-vector cache with oldest-first eviction.
///
/// Keyed by a hash of the lower-cased, trimmed query text so that trivial
/// casing/spacing variants of the same question share an entry. A capacity
/// of `0` disables caching entirely.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hasher: RandomState,
}

struct CacheInner {
    entries: AHashMap<u64, Vec<f32>>,
    order: VecDeque<u64>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` vectors.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: AHashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
            // Fixed keys so the same query hashes identically across calls.
            hasher: RandomState::with_seeds(7, 31, 127, 8191),
        }
    }

    fn key(&self, text: &str) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        text.trim().to_lowercase().hash(&mut hasher);
        hasher.finish()
    }

    /// Look up the vector for a query, if cached.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        if self.capacity == 0 {
            return None;
        }
        let key = self.key(text);
        self.inner.lock().entries.get(&key).cloned()
    }

    /// Insert a query vector, evicting the oldest entry when full.
    pub fn put(&self, text: &str, vector: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        let key = self.key(text);
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            return;
        }
        if inner.entries.len() >= self.capacity
            && let Some(oldest) = inner.order.pop_front()
        {
            inner.entries.remove(&oldest);
        }
        inner.entries.insert(key, vector);
        inner.order.push_back(key);
    }

    /// Number of cached vectors.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put() {
        let cache = EmbeddingCache::new(4);
        assert!(cache.get("Wie funktioniert Osteopathie?").is_none());

        cache.put("Wie funktioniert Osteopathie?", vec![0.1, 0.2]);
        assert_eq!(
            cache.get("Wie funktioniert Osteopathie?"),
            Some(vec![0.1, 0.2])
        );
    }

    #[test]
    fn test_key_ignores_case_and_edges() {
        let cache = EmbeddingCache::new(4);
        cache.put("  Wie funktioniert Osteopathie?  ", vec![1.0]);
        assert_eq!(cache.get("wie funktioniert osteopathie?"), Some(vec![1.0]));
    }

    #[test]
    fn test_oldest_first_eviction() {
        let cache = EmbeddingCache::new(2);
        cache.put("first", vec![1.0]);
        cache.put("second", vec![2.0]);
        cache.put("third", vec![3.0]);

        assert!(cache.get("first").is_none());
        assert_eq!(cache.get("second"), Some(vec![2.0]));
        assert_eq!(cache.get("third"), Some(vec![3.0]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = EmbeddingCache::new(0);
        cache.put("anything", vec![1.0]);
        assert!(cache.get("anything").is_none());
        assert!(cache.is_empty());
    }
}
