use crate::error::{GeneratorError, Result};
use crate::random::RandomGenerator;
use crate::Generator;
use shorty_core::Repository;
use std::collections::HashSet;
use tracing::debug;
use typed_builder::TypedBuilder;

/// Length of generated short ids.
pub const DEFAULT_ID_SIZE: usize = 7;

/// Total number of candidates tried before giving up.
pub const MAX_ATTEMPTS: usize = 10;

/// Generates ids that are not yet taken in a repository.
///
/// This retry loop is the only guard against id collisions for backends
/// that overwrite on a repeated id.
#[derive(Debug, Clone, TypedBuilder)]
pub struct UniqueIdGenerator<G> {
    generator: G,
    #[builder(default = DEFAULT_ID_SIZE)]
    size: usize,
    #[builder(default = MAX_ATTEMPTS)]
    max_attempts: usize,
}

impl UniqueIdGenerator<RandomGenerator> {
    /// Random 7-letter ids with 10 attempts.
    pub fn random() -> Self {
        Self::builder().generator(RandomGenerator::new()).build()
    }
}

impl<G: Generator> UniqueIdGenerator<G> {
    /// Returns a candidate that `repository` does not hold yet.
    ///
    /// Fails with [`GeneratorError::IdSize`] before any attempt when the size
    /// is zero, and with [`GeneratorError::IdGeneration`] once every attempt
    /// collided.
    pub async fn next_id<R>(&self, repository: &R) -> Result<String>
    where
        R: Repository + ?Sized,
    {
        self.next_id_excluding(repository, &HashSet::new()).await
    }

    /// Like [`next_id`](Self::next_id), but also treats every id in `reserved`
    /// as taken. Batches use it to keep their not-yet-stored ids apart.
    pub async fn next_id_excluding<R>(
        &self,
        repository: &R,
        reserved: &HashSet<String>,
    ) -> Result<String>
    where
        R: Repository + ?Sized,
    {
        if self.size == 0 {
            return Err(GeneratorError::IdSize);
        }

        for attempt in 1..=self.max_attempts {
            let candidate = self.generator.generate(self.size);
            if !reserved.contains(&candidate) && !repository.has(&candidate).await? {
                return Ok(candidate);
            }
            debug!(attempt, candidate = %candidate, "short id collision");
        }

        Err(GeneratorError::IdGeneration {
            attempts: self.max_attempts,
        })
    }
}

/// Generates a random id of `size` letters that `repository` does not hold yet.
pub async fn generate_id<R>(repository: &R, size: usize) -> Result<String>
where
    R: Repository + ?Sized,
{
    UniqueIdGenerator::builder()
        .generator(RandomGenerator::new())
        .size(size)
        .build()
        .next_id(repository)
        .await
}
