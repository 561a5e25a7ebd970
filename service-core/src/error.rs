use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Stable label used for error metrics and log fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InternalError(_) => "internal",
            AppError::ServiceUnavailable => "unavailable",
            AppError::ConfigError(_) => "config",
        }
    }

    /// Whether the caller can fix the request and retry it.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::BadRequest(_) | AppError::NotFound(_) | AppError::Conflict(_)
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_labels() {
        assert_eq!(
            AppError::NotFound(anyhow::anyhow!("bundle")).error_type(),
            "not_found"
        );
        assert_eq!(AppError::ServiceUnavailable.error_type(), "unavailable");
    }

    #[test]
    fn test_client_errors() {
        assert!(AppError::Conflict(anyhow::anyhow!("key")).is_client_error());
        assert!(!AppError::InternalError(anyhow::anyhow!("boom")).is_client_error());
    }

    #[test]
    fn test_io_error_is_internal() {
        let err: AppError = std::io::Error::other("disk").into();
        assert_eq!(err.error_type(), "internal");
    }
}
