use shorty_core::StorageError;
use shorty_generator::GeneratorError;
use std::net::IpAddr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("url is gone: {0}")]
    UrlGone(String),
    #[error("url not found: {0}")]
    NotFound(String),
    #[error("the id list is empty")]
    EmptyIdList,
    #[error("the batch is empty")]
    EmptyBatch,
    #[error("caller is outside the trusted subnet: {0}")]
    UntrustedIp(IpAddr),
    #[error("trusted subnet is not configured")]
    NoTrustedSubnet,
    #[error("invalid trusted subnet: {0:?}")]
    InvalidSubnet(String),
    #[error("the deletion queue is closed")]
    DeletionQueueClosed,
    #[error("generator error: {0}")]
    Generator(GeneratorError),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl ShortenerError {
    /// HTTP status a handler answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidUrl(_) | Self::NotFound(_) | Self::EmptyIdList | Self::EmptyBatch => 400,
            Self::UntrustedIp(_) | Self::NoTrustedSubnet => 403,
            Self::UrlGone(_) => 410,
            Self::DeletionQueueClosed => 503,
            Self::InvalidSubnet(_) | Self::Generator(_) | Self::Storage(_) => 500,
        }
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::UrlNotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}

impl From<GeneratorError> for ShortenerError {
    fn from(value: GeneratorError) -> Self {
        match value {
            GeneratorError::Storage(err) => Self::from(err),
            other => Self::Generator(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_maps_to_not_found() {
        let err = ShortenerError::from(StorageError::UrlNotFound("abc".to_string()));
        assert_eq!(err, ShortenerError::NotFound("abc".to_string()));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn generator_storage_errors_are_unwrapped() {
        let err = ShortenerError::from(GeneratorError::Storage(StorageError::Timeout(
            "has".to_string(),
        )));
        assert_eq!(
            err,
            ShortenerError::Storage(StorageError::Timeout("has".to_string()))
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(ShortenerError::InvalidUrl("x".into()).status_code(), 400);
        assert_eq!(ShortenerError::UrlGone("x".into()).status_code(), 410);
        assert_eq!(ShortenerError::EmptyIdList.status_code(), 400);
        assert_eq!(ShortenerError::EmptyBatch.status_code(), 400);
        assert_eq!(ShortenerError::DeletionQueueClosed.status_code(), 503);
        assert_eq!(
            ShortenerError::UntrustedIp("203.0.113.7".parse().unwrap()).status_code(),
            403
        );
        assert_eq!(ShortenerError::NoTrustedSubnet.status_code(), 403);
        assert_eq!(
            ShortenerError::Generator(GeneratorError::IdGeneration { attempts: 10 }).status_code(),
            500
        );
        assert_eq!(
            ShortenerError::Storage(StorageError::Conflict("x".into())).status_code(),
            500
        );
    }
}
