//! Head-of-log oracle abstraction.
//!
//! Provides the `HeadOracle` trait through which the status facade asks the
//! storage engine for the newest position and its event timestamp.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CatchupResult;
use crate::types::HeadState;

/// Source of the current head of the event log.
///
/// Implementations query the storage engine on every call; the head is never
/// cached here because a stale head would understate lag.
#[async_trait]
pub trait HeadOracle: Send + Sync {
    /// Fetches the newest position and the timestamp of its event.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` if the storage engine cannot be reached,
    /// or with cause `EmptyLog` if it holds no events yet.
    async fn fetch_head(&self) -> CatchupResult<HeadState>;
}

#[async_trait]
impl<T: HeadOracle + ?Sized> HeadOracle for Arc<T> {
    async fn fetch_head(&self) -> CatchupResult<HeadState> {
        (**self).fetch_head().await
    }
}
