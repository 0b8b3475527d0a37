//! Token storage for the simulated tracking processor.
//!
//! The processor commits its position here after each batch and restores it
//! on start, so a restarted processor resumes where it left off.

#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use helix_catchup::CatchupResult;
use helix_core::{Position, SegmentId};

/// Token store trait for persistence.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Gets the committed position of a processor segment.
    ///
    /// Returns `None` if the segment has never committed.
    async fn fetch_token(
        &self,
        processor: &str,
        segment: SegmentId,
    ) -> CatchupResult<Option<Position>>;

    /// Commits the position of a processor segment.
    async fn store_token(
        &self,
        processor: &str,
        segment: SegmentId,
        position: &Position,
    ) -> CatchupResult<()>;

    /// Forgets the position of a processor segment.
    async fn reset_token(&self, processor: &str, segment: SegmentId) -> CatchupResult<()>;
}

/// In-memory token store.
///
/// Clones share state via `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<Mutex<HashMap<(String, SegmentId), Position>>>,
}

impl MemoryTokenStore {
    /// Creates an empty token store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn fetch_token(
        &self,
        processor: &str,
        segment: SegmentId,
    ) -> CatchupResult<Option<Position>> {
        let tokens = self.tokens.lock().expect("tokens lock poisoned");
        Ok(tokens.get(&(processor.to_string(), segment)).cloned())
    }

    async fn store_token(
        &self,
        processor: &str,
        segment: SegmentId,
        position: &Position,
    ) -> CatchupResult<()> {
        let mut tokens = self.tokens.lock().expect("tokens lock poisoned");
        tokens.insert((processor.to_string(), segment), position.clone());
        Ok(())
    }

    async fn reset_token(&self, processor: &str, segment: SegmentId) -> CatchupResult<()> {
        let mut tokens = self.tokens.lock().expect("tokens lock poisoned");
        tokens.remove(&(processor.to_string(), segment));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_fetch() {
        let store = MemoryTokenStore::new();
        let segment = SegmentId::new(0);

        assert!(store.fetch_token("p", segment).await.unwrap().is_none());

        let position = Position::with_gaps(10, [7]).unwrap();
        store.store_token("p", segment, &position).await.unwrap();

        let fetched = store.fetch_token("p", segment).await.unwrap().unwrap();
        assert_eq!(fetched.index(), 10);
        assert!(fetched.gaps().contains(7));

        // Other processors are unaffected.
        assert!(store.fetch_token("q", segment).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset() {
        let store = MemoryTokenStore::new();
        let segment = SegmentId::new(1);
        store
            .store_token("p", segment, &Position::new(3))
            .await
            .unwrap();

        store.reset_token("p", segment).await.unwrap();
        assert!(store.fetch_token("p", segment).await.unwrap().is_none());
    }
}
