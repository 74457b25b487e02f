//! Retrieval consensus: do several sources agree, or does the answer lean on one?

use serde::{Deserialize, Serialize};
use std::fmt;

/// A retrieval score above this counts as a high-quality source.
pub const HIGH_QUALITY_SCORE: f64 = 0.7;
/// A retrieval score above this (and not high) counts as medium quality.
pub const MEDIUM_QUALITY_SCORE: f64 = 0.4;
/// At least this many high-quality sources form a consensus.
pub const CONSENSUS_MIN_SOURCES: usize = 4;
/// Up to this many high-quality sources is single-source reliance.
pub const SINGLE_SOURCE_MAX_SOURCES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsensusKind {
    Consensus,
    SingleSource,
    Weak,
}

impl ConsensusKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Consensus => "Consensus",
            Self::SingleSource => "Single Source",
            Self::Weak => "Weak Retrieval",
        }
    }
}

impl fmt::Display for ConsensusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Consensus => "consensus",
            Self::SingleSource => "single-source",
            Self::Weak => "weak",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConsensus {
    #[serde(rename = "type")]
    pub kind: ConsensusKind,
    pub description: String,
    pub top_scores_count: usize,
}

/// Classify how retrieval quality is distributed across sources.
///
/// Exactly three high-quality sources match neither the consensus nor the
/// single-source range and fall through to `Weak`. `Weak` always reports a
/// `top_scores_count` of 0.
pub fn analyze_retrieval_consensus(retrieval_scores: &[f64]) -> RetrievalConsensus {
    if retrieval_scores.is_empty() {
        return RetrievalConsensus {
            kind: ConsensusKind::Weak,
            description: "No retrieval data available".to_string(),
            top_scores_count: 0,
        };
    }

    let high_quality = high_quality_count(retrieval_scores);

    if high_quality >= CONSENSUS_MIN_SOURCES {
        RetrievalConsensus {
            kind: ConsensusKind::Consensus,
            description: format!("Strong consensus across {high_quality} sources"),
            top_scores_count: high_quality,
        }
    } else if (1..=SINGLE_SOURCE_MAX_SOURCES).contains(&high_quality) {
        RetrievalConsensus {
            kind: ConsensusKind::SingleSource,
            description: format!("Relying on {high_quality} primary source(s)"),
            top_scores_count: high_quality,
        }
    } else {
        RetrievalConsensus {
            kind: ConsensusKind::Weak,
            description: "Weak retrieval quality across all sources".to_string(),
            top_scores_count: 0,
        }
    }
}

/// Number of scores strictly above [`HIGH_QUALITY_SCORE`].
pub fn high_quality_count(retrieval_scores: &[f64]) -> usize {
    retrieval_scores
        .iter()
        .filter(|&&s| s > HIGH_QUALITY_SCORE)
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

/// One retrieved chunk, labelled by rank (`C1`, `C2`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    pub label: String,
    pub score: f64,
    pub percentage: i64,
    pub band: ScoreBand,
}

pub fn score_band(score: f64) -> ScoreBand {
    if score > HIGH_QUALITY_SCORE {
        ScoreBand::High
    } else if score > MEDIUM_QUALITY_SCORE {
        ScoreBand::Medium
    } else {
        ScoreBand::Low
    }
}

/// Label and band every retrieval score in rank order.
pub fn rank_chunks(retrieval_scores: &[f64]) -> Vec<RankedChunk> {
    retrieval_scores
        .iter()
        .enumerate()
        .map(|(i, &score)| RankedChunk {
            label: format!("C{}", i + 1),
            score,
            percentage: (score * 100.0).round() as i64,
            band: score_band(score),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_high_scores_is_consensus() {
        let result = analyze_retrieval_consensus(&[0.8, 0.8, 0.8, 0.8, 0.1]);
        assert_eq!(result.kind, ConsensusKind::Consensus);
        assert_eq!(result.top_scores_count, 4);
        assert_eq!(result.description, "Strong consensus across 4 sources");
    }

    #[test]
    fn test_one_high_score_is_single_source() {
        let result = analyze_retrieval_consensus(&[0.8, 0.1, 0.1]);
        assert_eq!(result.kind, ConsensusKind::SingleSource);
        assert_eq!(result.top_scores_count, 1);
        assert_eq!(result.description, "Relying on 1 primary source(s)");
    }

    #[test]
    fn test_two_high_scores_is_single_source() {
        let result = analyze_retrieval_consensus(&[0.9, 0.75, 0.3]);
        assert_eq!(result.kind, ConsensusKind::SingleSource);
        assert_eq!(result.top_scores_count, 2);
    }

    #[test]
    fn test_three_high_scores_falls_through_to_weak() {
        let result = analyze_retrieval_consensus(&[0.8, 0.8, 0.8, 0.1, 0.1]);
        assert_eq!(high_quality_count(&[0.8, 0.8, 0.8, 0.1, 0.1]), 3);
        assert_eq!(result.kind, ConsensusKind::Weak);
        assert_eq!(result.top_scores_count, 0);
        assert_eq!(
            result.description,
            "Weak retrieval quality across all sources"
        );
    }

    #[test]
    fn test_no_high_scores_is_weak() {
        let result = analyze_retrieval_consensus(&[0.5, 0.6, 0.7]);
        assert_eq!(result.kind, ConsensusKind::Weak);
        assert_eq!(result.top_scores_count, 0);
    }

    #[test]
    fn test_empty_scores() {
        let result = analyze_retrieval_consensus(&[]);
        assert_eq!(result.kind, ConsensusKind::Weak);
        assert_eq!(result.description, "No retrieval data available");
    }

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(high_quality_count(&[0.7, 0.7, 0.7, 0.7]), 0);
        assert_eq!(score_band(0.7), ScoreBand::Medium);
        assert_eq!(score_band(0.4), ScoreBand::Low);
        assert_eq!(score_band(0.71), ScoreBand::High);
    }

    #[test]
    fn test_rank_chunks() {
        let chunks = rank_chunks(&[0.914, 0.45, 0.1]);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].label, "C1");
        assert_eq!(chunks[0].percentage, 91);
        assert_eq!(chunks[0].band, ScoreBand::High);
        assert_eq!(chunks[1].band, ScoreBand::Medium);
        assert_eq!(chunks[2].label, "C3");
        assert_eq!(chunks[2].band, ScoreBand::Low);
    }

    #[test]
    fn test_serialized_kind_names() {
        let result = analyze_retrieval_consensus(&[0.8]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "single-source");
        assert_eq!(ConsensusKind::SingleSource.to_string(), "single-source");
        assert_eq!(ConsensusKind::Weak.label(), "Weak Retrieval");
    }
}
