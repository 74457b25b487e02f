//! HTTP/JSON implementation of the analysis backend.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{AnalysisBackend, Session};
use crate::config::ApiConfig;
use crate::error::{ApiError, ConfigError, FinsightError};
use crate::types::{
    AnalysisRequest, AnalysisResponse, AnalysisStatus, Credentials, DashboardStats,
    DocumentIngestResponse, DocumentResponse, ErrorBody, TokenResponse, UserResponse,
};

/// Client for the analysis backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    session: Session,
    timeout_secs: u64,
    analysis_timeout_secs: u64,
    upload_timeout_secs: u64,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig, session: Session) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ConfigError::Invalid {
            message: format!("api.base_url '{}': {e}", config.base_url),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                message: format!("api.base_url '{}' cannot be a base URL", config.base_url),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url,
            session,
            timeout_secs: config.timeout_secs,
            analysis_timeout_secs: config.analysis_timeout_secs,
            upload_timeout_secs: config.upload_timeout_secs,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Replace the session, e.g. after `login`.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.session.cookie_header() {
            Some(cookie) => builder.header(reqwest::header::COOKIE, cookie),
            None => builder,
        }
    }

    /// Map a non-success HTTP status to the appropriate ApiError.
    fn map_http_error(status: StatusCode, body: &str, resource: &str) -> ApiError {
        match status.as_u16() {
            404 => ApiError::not_found(resource),
            401 => {
                debug!(resource = %resource, "Backend rejected session (401)");
                ApiError::Unauthorized
            }
            code => {
                let message = serde_json::from_str::<ErrorBody>(body)
                    .map(|b| b.detail)
                    .unwrap_or_else(|_| body.to_string());
                ApiError::Http {
                    status: code,
                    message,
                }
            }
        }
    }

    fn map_send_error(err: reqwest::Error, timeout_secs: u64) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout { timeout_secs }
        } else {
            ApiError::transport(err.to_string())
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        url: &Url,
        timeout_secs: u64,
    ) -> Result<T, ApiError> {
        debug!(url = %url, "Sending backend request");
        let response = builder
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_send_error(e, timeout_secs))?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body, url.path()));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            message: format!("{}: {e}", url.path()),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments);
        let builder = self.request(Method::GET, url.clone());
        self.execute(builder, &url, self.timeout_secs).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
        timeout_secs: u64,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments);
        let builder = self.request(Method::POST, url.clone()).json(body);
        self.execute(builder, &url, timeout_secs).await
    }

    /// Request an analysis of `document_id` answering `query`.
    pub async fn analyze(
        &self,
        document_id: &str,
        query: &str,
    ) -> Result<AnalysisResponse, ApiError> {
        let request = AnalysisRequest {
            query: query.to_string(),
        };
        self.post_json(
            &["analysis", document_id],
            &request,
            self.analysis_timeout_secs,
        )
        .await
    }

    /// Upload a PDF for ingestion under `ticker`.
    pub async fn upload(
        &self,
        path: &Path,
        ticker: &str,
    ) -> Result<DocumentIngestResponse, FinsightError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| ApiError::transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("ticker", ticker.to_string());

        let url = self.endpoint(&["documents", "upload"]);
        let builder = self.request(Method::POST, url.clone()).multipart(form);
        Ok(self
            .execute(builder, &url, self.upload_timeout_secs)
            .await?)
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentResponse>, ApiError> {
        self.get_json(&["documents", ""]).await
    }

    pub async fn get_document(&self, document_id: &str) -> Result<DocumentResponse, ApiError> {
        self.get_json(&["documents", document_id]).await
    }

    /// Dashboard counters. Falls back to zeroed stats when the backend fails.
    pub async fn dashboard_stats(&self) -> DashboardStats {
        match self.get_json(&["api", "dashboard", "stats"]).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Failed to fetch dashboard stats");
                DashboardStats::default()
            }
        }
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        self.post_json(&["auth", "register"], credentials, self.timeout_secs)
            .await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        self.post_json(&["auth", "login"], credentials, self.timeout_secs)
            .await
    }

    pub async fn me(&self) -> Result<UserResponse, ApiError> {
        self.get_json(&["auth", "me"]).await
    }

    /// End the server-side session. Failures are logged, not returned.
    pub async fn logout(&self) {
        let url = self.endpoint(&["auth", "logout"]);
        let result = self
            .request(Method::POST, url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(status = %resp.status(), "Logout rejected by backend"),
            Err(e) => warn!(error = %e, "Logout request failed"),
        }
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn get_status(&self, document_id: &str) -> Result<AnalysisStatus, ApiError> {
        self.get_json(&["analysis", document_id, "status"]).await
    }

    async fn get_analysis(
        &self,
        document_id: &str,
    ) -> Result<Option<AnalysisResponse>, ApiError> {
        match self
            .get_json(&["api", "documents", document_id, "analysis"])
            .await
        {
            Ok(analysis) => Ok(Some(analysis)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
