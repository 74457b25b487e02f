//! Fan-out fetch of analyses for many documents.

use std::collections::HashMap;
use tracing::warn;

use super::AnalysisBackend;
use crate::types::AnalysisResponse;

/// Fetch the analysis of every document concurrently.
///
/// Every requested id gets an entry. A failed fetch maps to `None` and does
/// not affect its siblings.
pub async fn fetch_many<B, S>(backend: &B, ids: &[S]) -> HashMap<String, Option<AnalysisResponse>>
where
    B: AnalysisBackend + ?Sized,
    S: AsRef<str>,
{
    let futures = ids.iter().map(|id| async move {
        let id = id.as_ref();
        let analysis = match backend.get_analysis(id).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(document_id = id, error = %e, "Batch analysis fetch failed");
                None
            }
        };
        (id.to_string(), analysis)
    });

    futures::future::join_all(futures)
        .await
        .into_iter()
        .collect()
}
