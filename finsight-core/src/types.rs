//! Wire-level data contracts shared with the analysis backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a server-side analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Response of the job status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub status: JobStatus,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub stage_index: i64,
    #[serde(default)]
    pub total_stages: i64,
    #[serde(default)]
    pub message: Option<String>,
}

impl AnalysisStatus {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            current_stage: None,
            stage_index: 0,
            total_stages: 0,
            message: None,
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.current_stage = Some(stage.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Per-request verification verdict produced by the backend pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskSeverity {
    Low,
    Med,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyHighlight {
    pub icon: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub icon: String,
    pub name: String,
    pub severity: RiskSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentData {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskData {
    pub level: RiskLevel,
    pub description: String,
}

/// Sentiment, risk and highlight data extracted from a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceHub {
    #[serde(default)]
    pub key_highlights: Vec<KeyHighlight>,
    pub sentiment: SentimentData,
    pub risk: RiskData,
    #[serde(default)]
    pub risk_factors: Vec<RiskFactor>,
    #[serde(default)]
    pub suggested_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub document_id: String,
}

/// A generated token with its model probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfidence {
    pub token: String,
    #[serde(default)]
    pub logprob: f64,
    pub probability: f64,
}

/// Full analysis result for a document.
///
/// `retrieval_scores` and `generation_logprobs` default to empty so an older
/// backend without groundedness signals still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub answer: String,
    pub verification_status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intelligence_hub: Option<IntelligenceHub>,
    pub metadata: AnalysisMetadata,
    #[serde(default)]
    pub retrieval_scores: Vec<f64>,
    #[serde(default)]
    pub generation_logprobs: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_confidences: Option<Vec<TokenConfidence>>,
    #[serde(default)]
    pub retrieved_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub query: String,
}

/// Document metadata as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub document_id: String,
    pub ticker: String,
    pub filename: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
}

/// Result of a document upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentIngestResponse {
    pub document_id: String,
    pub num_chunks: u64,
    pub num_pages: u64,
    pub s3_key: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_reports: u64,
    #[serde(default)]
    pub last_analysis: Option<String>,
    pub ai_accuracy_score: f64,
    #[serde(default)]
    pub sentiment_distribution: std::collections::BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

/// Error body returned by the backend on failure.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_deserializes_snake_case() {
        let json = r#"{"status":"in_progress","current_stage":"research","stage_index":1,"total_stages":4,"message":"Retrieving"}"#;
        let status: AnalysisStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.status, JobStatus::InProgress);
        assert_eq!(status.current_stage.as_deref(), Some("research"));
        assert_eq!(status.stage_index, 1);
        assert_eq!(status.message.as_deref(), Some("Retrieving"));
    }

    #[test]
    fn test_status_tolerates_missing_fields() {
        let status: AnalysisStatus = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(status, AnalysisStatus::new(JobStatus::Pending));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert_eq!(JobStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn test_analysis_response_without_signals() {
        let json = r#"{
            "answer": "Revenue grew 12%.",
            "verification_status": "PASS",
            "metadata": {"document_id": "doc-1"}
        }"#;
        let resp: AnalysisResponse = serde_json::from_str(json).unwrap();
        assert!(resp.retrieval_scores.is_empty());
        assert!(resp.generation_logprobs.is_empty());
        assert!(resp.intelligence_hub.is_none());
        assert_eq!(resp.verification_status, VerificationStatus::Pass);
    }

    #[test]
    fn test_intelligence_hub_decodes() {
        let json = r#"{
            "key_highlights": [{"icon": "trending-up", "text": "Margins up", "metric_value": "+3pp"}],
            "sentiment": {"score": 72, "description": "Positive"},
            "risk": {"level": "Moderate", "description": "FX exposure"},
            "risk_factors": [{"icon": "globe", "name": "Currency", "severity": "MED"}],
            "suggested_questions": ["What drove margin growth?"]
        }"#;
        let hub: IntelligenceHub = serde_json::from_str(json).unwrap();
        assert_eq!(hub.risk.level, RiskLevel::Moderate);
        assert_eq!(hub.risk_factors[0].severity, RiskSeverity::Med);
        assert_eq!(hub.key_highlights[0].metric_value.as_deref(), Some("+3pp"));
    }
}
