pub mod backend;
pub mod file;
pub mod memory;
pub mod postgres;

pub use backend::StorageBackend;
pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use shorty_core::{Repository, Result, ShortUrl, Stats, StorageError};
