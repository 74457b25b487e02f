//! Groundedness diagnostics over the numeric signals of an analysis response.

pub mod confidence;
pub mod consensus;
pub mod groundedness;

pub use confidence::{
    SentenceConfidence, high_confidence_text, sentence_confidences, split_sentences,
    token_confidences,
};
pub use consensus::{
    ConsensusKind, RankedChunk, RetrievalConsensus, ScoreBand, analyze_retrieval_consensus,
    rank_chunks,
};
pub use groundedness::{
    GroundednessResult, GroundednessScorer, GroundednessStatus, GroundednessThresholds,
    calculate_groundedness,
};

use crate::types::AnalysisResponse;
use serde::{Deserialize, Serialize};

/// Groundedness verdict and retrieval consensus for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingReport {
    pub document_id: String,
    pub groundedness: GroundednessResult,
    pub consensus: RetrievalConsensus,
    pub chunks: Vec<RankedChunk>,
}

impl GroundingReport {
    /// Score an analysis response. Recomputed on every call; never cached.
    pub fn from_analysis(scorer: &GroundednessScorer, analysis: &AnalysisResponse) -> Self {
        Self {
            document_id: analysis.metadata.document_id.clone(),
            groundedness: scorer.score(&analysis.retrieval_scores, &analysis.generation_logprobs),
            consensus: analyze_retrieval_consensus(&analysis.retrieval_scores),
            chunks: rank_chunks(&analysis.retrieval_scores),
        }
    }
}
