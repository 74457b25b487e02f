//! Backend access. The analysis service is an opaque producer of job status
//! and analysis results.

pub mod batch;
pub mod http;
pub mod mock;

pub use batch::fetch_many;
pub use http::HttpBackend;
pub use mock::MockBackend;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{AnalysisResponse, AnalysisStatus};

/// Read side of the analysis backend consumed by the poller and batch fetch.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Current status of the job for `document_id`.
    ///
    /// `ApiError::NotFound` means the job record does not exist yet.
    async fn get_status(&self, document_id: &str) -> Result<AnalysisStatus, ApiError>;

    /// Full analysis for `document_id`, or `None` when no analysis exists yet.
    async fn get_analysis(&self, document_id: &str)
    -> Result<Option<AnalysisResponse>, ApiError>;
}

/// Caller identity passed explicitly to the API layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Value for the `Cookie` header, if authenticated.
    pub fn cookie_header(&self) -> Option<String> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| format!("auth_token={t}"))
    }
}
