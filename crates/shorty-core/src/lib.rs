//! Core types and traits for the Shorty URL shortener.
//!
//! This crate provides the record model, the storage contract every backend
//! implements, and the storage error taxonomy shared by the storage,
//! generator and shortener crates.

pub mod error;
pub mod record;
pub mod repository;

pub use error::{Result, StorageError};
pub use record::{ShortUrl, FIELD_SEPARATOR};
pub use repository::{Repository, Stats};
