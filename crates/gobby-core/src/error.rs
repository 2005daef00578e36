//! The error taxonomy shared by every gobby crate.
//!
//! One variant per failure mode the daemon needs to distinguish when
//! translating an internal error into a hook response or CLI exit code.

#[derive(thiserror::Error, Debug)]
pub enum GobbyError {
    #[error("No {kind} matching reference '{reference}'")]
    NotFound { kind: &'static str, reference: String },

    #[error("Ambiguous {kind} reference '{reference}': matches multiple entities")]
    AmbiguousReference { kind: &'static str, reference: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("LLM provider error: {0}")]
    ProviderError(String),

    #[error("Git operation failed: {0}")]
    GitError(String),

    #[error("Store integrity error: {0}")]
    IntegrityError(String),

    #[error("Blocked by workflow: {reason}")]
    UserBlocked { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GobbyError {
    pub fn not_found(kind: &'static str, reference: impl Into<String>) -> Self {
        Self::NotFound { kind, reference: reference.into() }
    }

    pub fn ambiguous(kind: &'static str, reference: impl Into<String>) -> Self {
        Self::AmbiguousReference { kind, reference: reference.into() }
    }

    pub fn cycle(path: impl Into<String>) -> Self {
        Self::ConstraintViolation(format!("cycle: {}", path.into()))
    }

    /// CLI exit code for this error, per the `gobby` exit code contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 3,
            Self::AmbiguousReference { .. } => 1,
            Self::ConstraintViolation(_) => 2,
            Self::PermissionDenied(_) => 1,
            Self::Timeout(_) => 4,
            Self::Cancelled => 4,
            Self::ProviderError(_) | Self::GitError(_) | Self::IntegrityError(_) => 5,
            Self::UserBlocked { .. } => 1,
            Self::Internal(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_not_found() {
        let err = GobbyError::not_found("task", "gt-ab12cd");
        assert_eq!(err.to_string(), "No task matching reference 'gt-ab12cd'");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_display_ambiguous() {
        let err = GobbyError::ambiguous("session", "#1");
        assert_eq!(
            err.to_string(),
            "Ambiguous session reference '#1': matches multiple entities"
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_cycle_helper() {
        let err = GobbyError::cycle("A -> B -> A");
        assert_eq!(err.to_string(), "Constraint violation: cycle: A -> B -> A");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_user_blocked_exit_code() {
        let err = GobbyError::UserBlocked { reason: "Edit not allowed in plan phase".into() };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("Edit not allowed"));
    }

    #[test]
    fn test_internal_exit_code() {
        assert_eq!(GobbyError::Internal("boom".into()).exit_code(), 5);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GobbyError>();
    }
}
