//! Short id generation.
//!
//! A [`Generator`] produces candidate ids without touching storage;
//! [`UniqueIdGenerator`] pairs one with a [`Repository`](shorty_core::Repository)
//! and retries a bounded number of times until a candidate is free.

pub mod error;
pub mod random;
pub mod unique;

pub use error::{GeneratorError, Result};
pub use random::RandomGenerator;
pub use unique::{generate_id, UniqueIdGenerator, DEFAULT_ID_SIZE, MAX_ATTEMPTS};

/// Trait for generating short id candidates.
///
/// Implementations are pure generators that don't interact with storage.
pub trait Generator: Send + Sync + 'static {
    /// Generates a candidate of exactly `size` symbols.
    fn generate(&self, size: usize) -> String;
}
