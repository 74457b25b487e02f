//! Scripted in-memory backend for tests and offline demos.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::AnalysisBackend;
use crate::error::ApiError;
use crate::types::{AnalysisResponse, AnalysisStatus};

/// Backend that replays queued status responses.
///
/// Once the queue is down to its last entry, that entry is repeated for every
/// further call. An empty queue answers `NotFound`.
#[derive(Default)]
pub struct MockBackend {
    statuses: Mutex<VecDeque<Result<AnalysisStatus, ApiError>>>,
    analyses: Mutex<HashMap<String, Result<Option<AnalysisResponse>, ApiError>>>,
    status_calls: AtomicUsize,
    analysis_calls: AtomicUsize,
    latency: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency` (honours paused tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a status response.
    pub fn queue_status(&self, response: Result<AnalysisStatus, ApiError>) {
        self.statuses
            .lock()
            .expect("mock status queue poisoned")
            .push_back(response);
    }

    /// Queue the same status response `n` times.
    pub fn queue_status_n(&self, response: Result<AnalysisStatus, ApiError>, n: usize) {
        for _ in 0..n {
            self.queue_status(response.clone());
        }
    }

    /// Set the answer for `get_analysis(document_id)`.
    pub fn set_analysis(
        &self,
        document_id: impl Into<String>,
        response: Result<Option<AnalysisResponse>, ApiError>,
    ) {
        self.analyses
            .lock()
            .expect("mock analysis map poisoned")
            .insert(document_id.into(), response);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn analysis_calls(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl AnalysisBackend for MockBackend {
    async fn get_status(&self, document_id: &str) -> Result<AnalysisStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut queue = self.statuses.lock().expect("mock status queue poisoned");
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };
        self.delay().await;
        next.unwrap_or_else(|| Err(ApiError::not_found(format!("/analysis/{document_id}/status"))))
    }

    async fn get_analysis(
        &self,
        document_id: &str,
    ) -> Result<Option<AnalysisResponse>, ApiError> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .analyses
            .lock()
            .expect("mock analysis map poisoned")
            .get(document_id)
            .cloned();
        self.delay().await;
        answer.unwrap_or(Ok(None))
    }
}
