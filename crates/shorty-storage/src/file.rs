use async_trait::async_trait;
use shorty_core::{Repository, Result, ShortUrl, Stats, StorageError};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

/// Flat-file implementation of the repository contract.
///
/// One record per line in the [`ShortUrl`] line form. Writes append; a
/// deletion rewrites the whole file. All operations on one instance run under
/// a single lock because the read-modify-rewrite in [`Repository::delete`] is
/// not atomic on its own.
///
/// This backend does not resolve URL conflicts: adding a URL that is already
/// stored appends a second line and returns the submitted record unchanged.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRepository {
    /// Opens a repository backed by `path`, creating the file or truncating
    /// any previous content.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(StorageError::FilenameMissing);
        }

        File::create(path).await?;
        debug!(path = %path.display(), "opened file storage");

        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, batch: &[ShortUrl]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // Check and serialize first so a failing record never leaves half a
        // batch behind.
        let buffer = serialize(batch)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Opens the file for reading. A missing file reads as an empty store.
    async fn reader(&self) -> Result<Option<BufReader<File>>> {
        match File::open(&self.path).await {
            Ok(file) => Ok(Some(BufReader::new(file))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads every stored record, aborting on the first malformed line.
    async fn load(&self) -> Result<Vec<ShortUrl>> {
        let Some(reader) = self.reader().await? else {
            return Ok(Vec::new());
        };

        let mut records: Vec<ShortUrl> = Vec::new();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            records.push(line.parse()?);
        }
        Ok(records)
    }

    async fn find(&self, id: &str) -> Result<Option<ShortUrl>> {
        let Some(reader) = self.reader().await? else {
            return Ok(None);
        };

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let record: ShortUrl = line.parse()?;
            if record.id == id {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn rewrite(&self, records: &[ShortUrl]) -> Result<()> {
        let buffer = serialize(records)?;

        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        fs::write(&staging, buffer.as_bytes()).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

fn serialize(records: &[ShortUrl]) -> Result<String> {
    let mut buffer = String::new();
    for record in records {
        record.check_line_safe()?;
        buffer.push_str(&record.to_line());
    }
    Ok(buffer)
}

#[async_trait]
impl Repository for FileRepository {
    async fn add(&self, batch: &[ShortUrl]) -> Result<Vec<ShortUrl>> {
        let _guard = self.lock.lock().await;
        self.append(batch).await?;
        debug!(count = batch.len(), "appended records to file storage");
        Ok(batch.to_vec())
    }

    async fn get(&self, id: &str) -> Result<ShortUrl> {
        let _guard = self.lock.lock().await;
        self.find(id)
            .await?
            .ok_or_else(|| StorageError::UrlNotFound(id.to_string()))
    }

    async fn get_all(&self, uid: &str) -> Result<Vec<ShortUrl>> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.retain(|record| record.uid == uid);
        Ok(records)
    }

    async fn has(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        match fs::metadata(&self.path).await {
            Ok(meta) if meta.len() == 0 => return Ok(false),
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        }
        Ok(self.find(id).await?.is_some())
    }

    async fn delete(&self, batch: &[ShortUrl]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let owners: HashMap<&str, &str> = batch
            .iter()
            .map(|request| (request.id.as_str(), request.uid.as_str()))
            .collect();

        let mut records = self.load().await?;
        let mut changed = 0usize;
        for record in records.iter_mut().filter(|record| !record.deleted) {
            if owners.get(record.id.as_str()) == Some(&record.uid.as_str()) {
                record.deleted = true;
                changed += 1;
            }
        }

        if changed == 0 {
            return Ok(());
        }

        self.rewrite(&records).await?;
        debug!(changed, "rewrote file storage after deletion");
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let _guard = self.lock.lock().await;
        let records = self.load().await?;

        let mut urls = HashSet::new();
        let mut users = HashSet::new();
        for record in records.iter().filter(|record| !record.deleted) {
            urls.insert(record.id.as_str());
            users.insert(record.uid.as_str());
        }

        Ok(Stats {
            urls: urls.len() as u64,
            users: users.len() as u64,
        })
    }

    async fn ping(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "file storage already cleared");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
