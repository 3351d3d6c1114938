use crate::{FileRepository, InMemoryRepository, PostgresRepository};
use shorty_core::{Repository, Result};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// The storage backend chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL, addressed by a connection string.
    Postgres(String),
    /// A flat file at the given path.
    File(PathBuf),
    /// Process memory; nothing survives a restart.
    InMemory,
}

impl StorageBackend {
    /// Picks the backend by precedence: a non-empty database DSN wins, then a
    /// non-empty file path, then memory.
    pub fn select(database_dsn: Option<&str>, file_path: Option<&str>) -> Self {
        match (database_dsn, file_path) {
            (Some(dsn), _) if !dsn.is_empty() => StorageBackend::Postgres(dsn.to_string()),
            (_, Some(path)) if !path.is_empty() => StorageBackend::File(PathBuf::from(path)),
            _ => StorageBackend::InMemory,
        }
    }

    /// Opens the backend and returns it behind the storage contract.
    pub async fn open(&self) -> Result<Arc<dyn Repository>> {
        info!(backend = %self, "opening storage");

        let repository: Arc<dyn Repository> = match self {
            StorageBackend::Postgres(dsn) => Arc::new(PostgresRepository::connect(dsn).await?),
            StorageBackend::File(path) => Arc::new(FileRepository::open(path).await?),
            StorageBackend::InMemory => Arc::new(InMemoryRepository::new()),
        };
        Ok(repository)
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Postgres(_) => write!(f, "postgres"),
            StorageBackend::File(path) => write!(f, "file ({})", path.display()),
            StorageBackend::InMemory => write!(f, "in-memory"),
        }
    }
}
