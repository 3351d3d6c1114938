use thiserror::Error;

pub type Result<T> = std::result::Result<T, TestInfraError>;

#[derive(Debug, Error)]
pub enum TestInfraError {
    /// Starting or inspecting a container failed.
    #[error("container failed: {0}")]
    Container(#[from] testcontainers::TestcontainersError),
}
