use clap::{Parser, ValueEnum};
use shorty_shortener::{PoolSettings, TrustedSubnet};
use shorty_storage::StorageBackend;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const BASE_URL_ENV: &str = "SHORTY_BASE_URL";
pub const DATABASE_DSN_ENV: &str = "SHORTY_DATABASE_DSN";
pub const FILE_STORAGE_PATH_ENV: &str = "SHORTY_FILE_STORAGE_PATH";
pub const DELETION_WORKERS_ENV: &str = "SHORTY_DELETION_WORKERS";
pub const DELETION_TIMEOUT_ENV: &str = "SHORTY_DELETION_TIMEOUT_SECS";
pub const SHUTDOWN_TIMEOUT_ENV: &str = "SHORTY_SHUTDOWN_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "SHORTY_LOG_FORMAT";
pub const TRUSTED_SUBNET_ENV: &str = "SHORTY_TRUSTED_SUBNET";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shorty-shortener")]
pub struct CLI {
    /// Prefix of every returned short link.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// PostgreSQL connection string; selects the database backend.
    #[arg(long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Storage file; selects the file backend when no DSN is given.
    #[arg(long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<String>,

    #[arg(long, env = DELETION_WORKERS_ENV, default_value_t = 10)]
    pub deletion_workers: usize,

    #[arg(long, env = DELETION_TIMEOUT_ENV, default_value_t = 30)]
    pub deletion_timeout_secs: u64,

    /// How long pending deletions may take to drain on exit.
    #[arg(long, env = SHUTDOWN_TIMEOUT_ENV, default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// CIDR allowed to read statistics; unset refuses everyone.
    #[arg(long, env = TRUSTED_SUBNET_ENV)]
    pub trusted_subnet: Option<TrustedSubnet>,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl CLI {
    /// A DSN wins over a file path; with neither, records stay in memory.
    pub fn storage_backend(&self) -> StorageBackend {
        StorageBackend::select(
            self.database_dsn.as_deref(),
            self.file_storage_path.as_deref(),
        )
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings::builder()
            .workers(self.deletion_workers)
            .task_timeout(Duration::from_secs(self.deletion_timeout_secs))
            .build()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
