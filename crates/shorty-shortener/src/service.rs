use crate::deletion::{DeletionQueue, DeletionRequest};
use crate::error::{Result, ShortenerError};
use crate::subnet::TrustedSubnet;
use serde::{Deserialize, Serialize};
use shorty_core::{Repository, ShortUrl, Stats, StorageError};
use shorty_generator::{Generator, RandomGenerator, UniqueIdGenerator};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Outcome of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortened {
    pub record: ShortUrl,
    pub short_url: String,
    /// The URL was already shortened; `record` carries the existing id.
    pub conflict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchShortened {
    pub correlation_id: String,
    pub short_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    pub short_url: String,
    pub original_url: String,
}

/// The operations request handlers call.
///
/// Wraps a `Repository`, a uniqueness-checked id generator and the producer
/// side of the deletion pool. Deletions are queued and applied later.
pub struct ShortenerService<R: ?Sized, G = RandomGenerator> {
    repository: Arc<R>,
    ids: UniqueIdGenerator<G>,
    deletions: DeletionQueue,
    base_url: String,
    trusted_subnet: Option<TrustedSubnet>,
}

impl<R: ?Sized, G: Clone> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            ids: self.ids.clone(),
            deletions: self.deletions.clone(),
            base_url: self.base_url.clone(),
            trusted_subnet: self.trusted_subnet,
        }
    }
}

impl<R, G> ShortenerService<R, G>
where
    R: Repository + ?Sized,
    G: Generator,
{
    pub fn new(
        repository: Arc<R>,
        ids: UniqueIdGenerator<G>,
        deletions: DeletionQueue,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            ids,
            deletions,
            base_url: base_url.into(),
            trusted_subnet: None,
        }
    }

    /// Lets callers inside `subnet` read statistics. Without one, nobody can.
    pub fn with_trusted_subnet(mut self, subnet: Option<TrustedSubnet>) -> Self {
        self.trusted_subnet = subnet;
        self
    }

    /// Accepts absolute http(s) URLs with a host and returns them normalized.
    ///
    /// The normalized form is what gets stored: spaces are percent-encoded and
    /// tabs or line breaks are gone.
    fn validate_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url).map_err(|e| ShortenerError::InvalidUrl(format!("{url}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a host: {url}"
            )));
        }

        Ok(parsed)
    }

    /// Shortens `url` on behalf of `uid`.
    ///
    /// A URL that is already stored keeps its id; the result then has
    /// `conflict` set, which handlers answer with 409.
    pub async fn shorten(&self, url: &str, uid: &str) -> Result<Shortened> {
        let url = Self::validate_url(url)?;

        let id = self.ids.next_id(self.repository.as_ref()).await?;
        let stored = self
            .repository
            .add(&[ShortUrl::new(id.as_str(), url.as_str(), uid)])
            .await?;
        let record = stored
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::InvalidData(format!("no record stored for {id}")))?;

        let conflict = record.id != id;
        if conflict {
            debug!(id = %record.id, url = %url, "url already shortened");
        }

        Ok(Shortened {
            short_url: record.short_link(&self.base_url),
            record,
            conflict,
        })
    }

    /// Shortens every item in one storage call. Results follow the input
    /// order.
    pub async fn shorten_batch(&self, items: &[BatchItem], uid: &str) -> Result<Vec<BatchShortened>> {
        if items.is_empty() {
            return Err(ShortenerError::EmptyBatch);
        }

        let urls = items
            .iter()
            .map(|item| Self::validate_url(&item.original_url))
            .collect::<Result<Vec<_>>>()?;

        let mut chosen = HashSet::with_capacity(items.len());
        let mut batch = Vec::with_capacity(items.len());
        for url in urls {
            let id = self
                .ids
                .next_id_excluding(self.repository.as_ref(), &chosen)
                .await?;
            chosen.insert(id.clone());
            batch.push(ShortUrl::new(id, url.as_str(), uid));
        }

        let stored = self.repository.add(&batch).await?;
        debug!(uid, size = stored.len(), "batch shortened");

        Ok(items
            .iter()
            .zip(stored)
            .map(|(item, record)| BatchShortened {
                correlation_id: item.correlation_id.clone(),
                short_url: record.short_link(&self.base_url),
            })
            .collect())
    }

    /// Looks up the record behind a short id.
    ///
    /// Soft-deleted records yield [`ShortenerError::UrlGone`].
    pub async fn resolve(&self, id: &str) -> Result<ShortUrl> {
        let record = self.repository.get(id).await?;
        if record.deleted {
            return Err(ShortenerError::UrlGone(record.id));
        }
        Ok(record)
    }

    /// Every URL owned by `uid`, soft-deleted ones included.
    pub async fn user_urls(&self, uid: &str) -> Result<Vec<UserUrl>> {
        let records = self.repository.get_all(uid).await?;
        Ok(records
            .into_iter()
            .map(|record| UserUrl {
                short_url: record.short_link(&self.base_url),
                original_url: record.url,
            })
            .collect())
    }

    /// Queues deletion of `ids` owned by `uid` and returns once queued.
    pub async fn delete_urls(&self, uid: &str, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Err(ShortenerError::EmptyIdList);
        }

        info!(uid, ids = ids.len(), "deletion accepted");
        self.deletions.submit(DeletionRequest::new(uid, ids)).await
    }

    /// Store-wide counters, only for callers inside the trusted subnet.
    pub async fn stats(&self, caller: IpAddr) -> Result<Stats> {
        let subnet = self.trusted_subnet.ok_or(ShortenerError::NoTrustedSubnet)?;
        if !subnet.contains(caller) {
            debug!(caller = %caller, subnet = %subnet, "statistics refused");
            return Err(ShortenerError::UntrustedIp(caller));
        }

        Ok(self.repository.stats().await?)
    }

    pub async fn ping(&self) -> bool {
        self.repository.ping().await
    }
}
