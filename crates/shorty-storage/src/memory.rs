use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shorty_core::{Repository, Result, ShortUrl, Stats, StorageError};
use std::collections::HashSet;
use tracing::debug;

/// In-memory implementation of the Repository trait using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks, allowing concurrent reads and writes to different
/// buckets without blocking.
///
/// Records are keyed by id. A second map indexes ids by URL so that adding
/// an already-shortened URL resolves to the existing id. Writing an id that
/// is already present overwrites it; avoiding id collisions is the job of
/// the id generator.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: DashMap<String, ShortUrl>,
    ids_by_url: DashMap<String, String>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, record: &ShortUrl) -> ShortUrl {
        // The url shard stays locked until the record is in place, so two
        // concurrent adds of the same URL agree on one id.
        let replaced = match self.ids_by_url.entry(record.url.clone()) {
            Entry::Occupied(existing) => {
                return ShortUrl {
                    id: existing.get().clone(),
                    ..record.clone()
                };
            }
            Entry::Vacant(slot) => {
                let replaced = self.records.insert(record.id.clone(), record.clone());
                slot.insert(record.id.clone());
                replaced
            }
        };

        if let Some(replaced) = replaced {
            self.ids_by_url
                .remove_if(&replaced.url, |_, id| *id == replaced.id);
        }
        record.clone()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn add(&self, batch: &[ShortUrl]) -> Result<Vec<ShortUrl>> {
        let stored: Vec<ShortUrl> = batch.iter().map(|record| self.store(record)).collect();
        debug!(count = stored.len(), "stored records in memory");
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<ShortUrl> {
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::UrlNotFound(id.to_string()))
    }

    async fn get_all(&self, uid: &str) -> Result<Vec<ShortUrl>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.uid == uid)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn has(&self, id: &str) -> Result<bool> {
        Ok(self.records.contains_key(id))
    }

    async fn delete(&self, batch: &[ShortUrl]) -> Result<()> {
        for request in batch {
            if let Some(mut record) = self.records.get_mut(&request.id) {
                if record.uid == request.uid {
                    record.deleted = true;
                }
            }
        }
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let mut urls = 0;
        let mut users = HashSet::new();
        for entry in self.records.iter().filter(|entry| !entry.deleted) {
            urls += 1;
            users.insert(entry.uid.clone());
        }

        Ok(Stats {
            urls,
            users: users.len() as u64,
        })
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn clear(&self) -> Result<()> {
        self.records.clear();
        self.ids_by_url.clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(id: &str, url: &str, uid: &str) -> ShortUrl {
        ShortUrl::new(id, url, uid)
    }

    #[tokio::test]
    async fn add_and_get() {
        let repo = InMemoryRepository::new();

        let stored = repo
            .add(&[record("abc1234", "https://example.com", "u1")])
            .await
            .unwrap();
        assert_eq!(stored, vec![record("abc1234", "https://example.com", "u1")]);

        let got = repo.get("abc1234").await.unwrap();
        assert_eq!(got.url, "https://example.com");
        assert!(!got.deleted);
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();

        let err = repo.get("nope").await.unwrap_err();
        assert_eq!(err, StorageError::UrlNotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn add_known_url_returns_existing_id() {
        let repo = InMemoryRepository::new();

        repo.add(&[record("a1b2c3d", "https://example.com", "u1")])
            .await
            .unwrap();
        let second = repo
            .add(&[record("z9y8x7w", "https://example.com", "u2")])
            .await
            .unwrap();

        assert_eq!(second[0].id, "a1b2c3d");
        assert!(!repo.has("z9y8x7w").await.unwrap());
    }

    #[tokio::test]
    async fn add_same_id_overwrites() {
        let repo = InMemoryRepository::new();

        repo.add(&[record("abc1234", "https://old.example", "u1")])
            .await
            .unwrap();
        repo.add(&[record("abc1234", "https://new.example", "u1")])
            .await
            .unwrap();

        assert_eq!(repo.get("abc1234").await.unwrap().url, "https://new.example");

        // The replaced URL is free again.
        let again = repo
            .add(&[record("fresh00", "https://old.example", "u1")])
            .await
            .unwrap();
        assert_eq!(again[0].id, "fresh00");
    }

    #[tokio::test]
    async fn has_on_fresh_repository() {
        let repo = InMemoryRepository::new();
        assert!(!repo.has("missing").await.unwrap());
    }

    #[tokio::test]
    async fn get_all_filters_by_owner() {
        let repo = InMemoryRepository::new();
        repo.add(&[
            record("aaaaaaa", "https://a.example", "u1"),
            record("bbbbbbb", "https://b.example", "u2"),
            record("ccccccc", "https://c.example", "u1"),
        ])
        .await
        .unwrap();

        let mut owned = repo.get_all("u1").await.unwrap();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        let ids: Vec<&str> = owned.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["aaaaaaa", "ccccccc"]);

        assert!(repo.get_all("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let repo = InMemoryRepository::new();
        repo.add(&[record("x", "https://example.com", "B")])
            .await
            .unwrap();

        repo.delete(&[ShortUrl::owned_by("x", "A")]).await.unwrap();
        assert!(!repo.get("x").await.unwrap().deleted);

        repo.delete(&[ShortUrl::owned_by("x", "B")]).await.unwrap();
        assert!(repo.get("x").await.unwrap().deleted);
    }

    #[tokio::test]
    async fn delete_is_monotonic() {
        let repo = InMemoryRepository::new();
        repo.add(&[record("x", "https://example.com", "u1")])
            .await
            .unwrap();

        repo.delete(&[ShortUrl::owned_by("x", "u1")]).await.unwrap();
        repo.delete(&[ShortUrl::owned_by("x", "u1")]).await.unwrap();

        let got = repo.get("x").await.unwrap();
        assert!(got.deleted);
        assert!(repo.has("x").await.unwrap());
    }

    #[tokio::test]
    async fn delete_empty_batch_is_noop() {
        let repo = InMemoryRepository::new();
        repo.add(&[record("x", "https://example.com", "u1")])
            .await
            .unwrap();

        repo.delete(&[]).await.unwrap();
        assert!(!repo.get("x").await.unwrap().deleted);
    }

    #[tokio::test]
    async fn delete_unknown_id_is_noop() {
        let repo = InMemoryRepository::new();
        repo.delete(&[ShortUrl::owned_by("ghost", "u1")]).await.unwrap();
        assert!(!repo.has("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn stats_count_live_records() {
        let repo = InMemoryRepository::new();
        repo.add(&[
            record("aaaaaaa", "https://a.example", "u1"),
            record("bbbbbbb", "https://b.example", "u2"),
            record("ccccccc", "https://c.example", "u1"),
        ])
        .await
        .unwrap();
        repo.delete(&[ShortUrl::owned_by("bbbbbbb", "u2")])
            .await
            .unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats, Stats { urls: 2, users: 1 });
    }

    #[tokio::test]
    async fn clear_erases_everything() {
        let repo = InMemoryRepository::new();
        repo.add(&[record("x", "https://example.com", "u1")])
            .await
            .unwrap();

        repo.clear().await.unwrap();

        assert!(!repo.has("x").await.unwrap());
        assert!(repo.get_all("u1").await.unwrap().is_empty());
        assert!(repo.ping().await);
    }

    #[tokio::test]
    async fn concurrent_access() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let r = ShortUrl::new(
                    format!("code{:03}", i),
                    format!("https://example{}.com", i),
                    "u1",
                );
                repo.add(&[r]).await.unwrap();
            }));
        }

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let _ = repo.get(&format!("code{:03}", i)).await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..10u64 {
            let result = repo.get(&format!("code{:03}", i)).await.unwrap();
            assert_eq!(result.url, format!("https://example{}.com", i));
        }
    }

    #[tokio::test]
    async fn concurrent_adds_of_one_url_agree_on_id() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..16u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let r = ShortUrl::new(format!("id{:05}", i), "https://same.example", "u1");
                repo.add(&[r]).await.unwrap().remove(0).id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1);
    }
}
