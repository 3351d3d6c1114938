//! URL shortening service.
//!
//! This crate wires a storage backend, the unique id generator and the
//! background deletion pool into [`ShortenerService`], the layer request
//! handlers talk to. Core types are re-exported from `shorty_core`.

pub mod deletion;
pub mod error;
pub mod service;
pub mod subnet;

pub use deletion::{DeletionPool, DeletionQueue, DeletionRequest, PoolSettings};
pub use error::{Result, ShortenerError};
pub use service::{BatchItem, BatchShortened, ShortenerService, Shortened, UserUrl};
pub use subnet::TrustedSubnet;
pub use shorty_core::{Repository, ShortUrl, Stats};
