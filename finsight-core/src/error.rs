//! Error types for the Finsight core library.
//!
//! Uses `thiserror` for public API error types. `ApiError` carries only string
//! payloads so it can be cloned into the poller's observable snapshot.

/// Top-level error type for the Finsight core library.
#[derive(Debug, thiserror::Error)]
pub enum FinsightError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from talking to the analysis backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Not authorized")]
    Unauthorized,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request failed: {message}")]
    Transport { message: String },

    #[error("Response decode error: {message}")]
    Decode { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// A 404 from the backend. For job status this means "not initialized yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Network-level failures and 5xx responses, which are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `FinsightError`.
pub type Result<T> = std::result::Result<T, FinsightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_api() {
        let err = FinsightError::Api(ApiError::Http {
            status: 502,
            message: "bad gateway".into(),
        });
        assert_eq!(err.to_string(), "API error: HTTP 502: bad gateway");
    }

    #[test]
    fn test_error_display_not_found() {
        let err = ApiError::not_found("/analysis/doc-1/status");
        assert_eq!(err.to_string(), "Not found: /analysis/doc-1/status");
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::transport("connection refused").is_transient());
        assert!(ApiError::Timeout { timeout_secs: 30 }.is_transient());
        assert!(
            ApiError::Http {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !ApiError::Http {
                status: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!ApiError::Unauthorized.is_transient());
    }

    #[test]
    fn test_error_display_config() {
        let err = FinsightError::Config(ConfigError::Invalid {
            message: "polling.interval_ms must be positive".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration: polling.interval_ms must be positive"
        );
    }
}
