use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Illegal transition for {entity}: {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Invalid dependency: {0}")]
    InvalidDependency(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Build an [`CoreError::IllegalTransition`] from any displayable states.
    pub fn illegal_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::IllegalTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
