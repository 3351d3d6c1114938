use crate::error::Result;
use crate::record::ShortUrl;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Aggregate counters over the live (non-deleted) records of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of live shortened URLs.
    pub urls: u64,
    /// Number of distinct owners among the live URLs.
    pub users: u64,
}

/// The storage contract shared by every backend.
///
/// Operations are cancelled by dropping the returned future; callers bound
/// them with `tokio::time::timeout` where a deadline applies.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Persists every record of `batch` as one unit.
    ///
    /// The returned records mirror the input order. When a backend already
    /// holds a record for the same URL, the returned record carries the
    /// pre-existing id instead of the submitted one, which is how callers
    /// detect a conflict.
    async fn add(&self, batch: &[ShortUrl]) -> Result<Vec<ShortUrl>>;

    /// Retrieves the record for `id`.
    /// Fails with `UrlNotFound` when the id does not exist.
    async fn get(&self, id: &str) -> Result<ShortUrl>;

    /// Returns every record owned by `uid`, deleted ones included.
    async fn get_all(&self, uid: &str) -> Result<Vec<ShortUrl>>;

    /// Checks whether `id` is already taken.
    async fn has(&self, id: &str) -> Result<bool>;

    /// Soft-deletes the records named by `batch`.
    ///
    /// An entry only takes effect when the stored owner matches the entry's
    /// `uid`; unknown ids and foreign records are skipped without error.
    async fn delete(&self, batch: &[ShortUrl]) -> Result<()>;

    /// Counts live records and their distinct owners.
    async fn stats(&self) -> Result<Stats>;

    /// Reports whether the backend is reachable.
    async fn ping(&self) -> bool;

    /// Administrative wipe. Backends differ: some erase, some soft-delete everything.
    async fn clear(&self) -> Result<()>;

    /// Releases backend resources.
    async fn close(&self) -> Result<()>;
}
