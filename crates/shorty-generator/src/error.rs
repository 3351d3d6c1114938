use shorty_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeneratorError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("the ID size is missing")]
    IdSize,
    #[error("cannot generate the ID after {attempts} attempts")]
    IdGeneration { attempts: usize },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
