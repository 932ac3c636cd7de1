use taskflow_core::error::CoreError;

/// Failure reported by a persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The write lost a race with another writer.
    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Application-level error type for service operations.
///
/// Wraps [`CoreError`] for domain errors and adds collaborator failures.
/// [`ServiceError::code`] gives a stable, transport-neutral code the
/// presentation layer can map to its own status vocabulary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A domain-level error from `taskflow_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A persistence collaborator failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Convenience type alias for service return values.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Core(core) => match core {
                CoreError::NotFound { .. } => "NOT_FOUND",
                CoreError::Forbidden(_) => "FORBIDDEN",
                CoreError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
                CoreError::InvalidDependency(_) => "INVALID_DEPENDENCY",
                CoreError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
                CoreError::Validation(_) => "VALIDATION_ERROR",
            },
            ServiceError::Repository(RepositoryError::Conflict(_)) => "CONFLICT",
            ServiceError::Repository(RepositoryError::Storage(_)) => "INTERNAL_ERROR",
        }
    }
}
