//! Groundedness scoring — compare retrieval evidence against generation confidence.
//!
//! `R` is the mean retrieval similarity, `G` is `exp(mean(logprobs))`. When the
//! model is markedly more confident than the evidence supports (`G - R` above
//! the gap threshold) the answer is flagged as a hallucination risk.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gap between generation confidence and retrieval evidence that flags a risk.
pub const HALLUCINATION_GAP_THRESHOLD: f64 = 0.15;
/// Both signals above this count as well grounded.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// Retrieval below this is weak evidence.
pub const LOW_RETRIEVAL_THRESHOLD: f64 = 0.6;
/// Generation above this with weak retrieval is a warning.
pub const HIGH_GENERATION_THRESHOLD: f64 = 0.8;

/// Thresholds used by [`GroundednessScorer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundednessThresholds {
    #[serde(default = "default_hallucination_gap")]
    pub hallucination_gap: f64,
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
    #[serde(default = "default_low_retrieval")]
    pub low_retrieval: f64,
    #[serde(default = "default_high_generation")]
    pub high_generation: f64,
}

impl Default for GroundednessThresholds {
    fn default() -> Self {
        Self {
            hallucination_gap: HALLUCINATION_GAP_THRESHOLD,
            high_confidence: HIGH_CONFIDENCE_THRESHOLD,
            low_retrieval: LOW_RETRIEVAL_THRESHOLD,
            high_generation: HIGH_GENERATION_THRESHOLD,
        }
    }
}

fn default_hallucination_gap() -> f64 {
    HALLUCINATION_GAP_THRESHOLD
}

fn default_high_confidence() -> f64 {
    HIGH_CONFIDENCE_THRESHOLD
}

fn default_low_retrieval() -> f64 {
    LOW_RETRIEVAL_THRESHOLD
}

fn default_high_generation() -> f64 {
    HIGH_GENERATION_THRESHOLD
}

impl GroundednessThresholds {
    /// Return the names of any thresholds that are NaN or infinite.
    pub fn non_finite(&self) -> Vec<&'static str> {
        [
            ("hallucination_gap", self.hallucination_gap),
            ("high_confidence", self.high_confidence),
            ("low_retrieval", self.low_retrieval),
            ("high_generation", self.high_generation),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Overall groundedness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroundednessStatus {
    Pass,
    Warning,
    Incomplete,
}

impl fmt::Display for GroundednessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Warning => "WARNING",
            Self::Incomplete => "INCOMPLETE",
        };
        f.write_str(s)
    }
}

/// Groundedness metrics for one analysis response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundednessResult {
    /// Mean retrieval score.
    #[serde(rename = "R")]
    pub retrieval: f64,
    /// Generation confidence, `exp(mean(logprobs))`.
    #[serde(rename = "G")]
    pub generation: f64,
    /// `generation - retrieval`, signed.
    pub gap: f64,
    pub is_hallucination_risk: bool,
    pub status: GroundednessStatus,
    pub status_reason: String,
}

/// Pure groundedness scorer parameterised by its thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroundednessScorer {
    thresholds: GroundednessThresholds,
}

impl GroundednessScorer {
    pub fn new(thresholds: GroundednessThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &GroundednessThresholds {
        &self.thresholds
    }

    /// Score retrieval similarities against generation log-probabilities.
    ///
    /// Never fails: empty inputs degrade to `R = 0` / `G = 0`. Positive
    /// log-probabilities are not rejected, so `G` can exceed 1.
    pub fn score(&self, retrieval_scores: &[f64], logprobs: &[f64]) -> GroundednessResult {
        let retrieval = mean(retrieval_scores);
        let generation = logprobs_to_confidence(logprobs);
        let gap = generation - retrieval;
        let is_hallucination_risk = gap > self.thresholds.hallucination_gap;
        let (status, status_reason) = self.classify(retrieval, generation, gap);

        GroundednessResult {
            retrieval,
            generation,
            gap,
            is_hallucination_risk,
            status,
            status_reason,
        }
    }

    /// First matching rule wins.
    fn classify(&self, r: f64, g: f64, gap: f64) -> (GroundednessStatus, String) {
        let t = &self.thresholds;
        let (rp, gp) = (percent(r), percent(g));

        if r < t.low_retrieval && g > t.high_generation {
            return (
                GroundednessStatus::Warning,
                format!(
                    "High hallucination risk detected. AI confidence ({gp}%) significantly exceeds document evidence ({rp}%)."
                ),
            );
        }

        if r < t.low_retrieval && g < t.low_retrieval {
            return (
                GroundednessStatus::Incomplete,
                format!(
                    "Insufficient data. Both retrieval quality ({rp}%) and AI confidence ({gp}%) are low."
                ),
            );
        }

        if r > t.high_confidence && g > t.high_confidence {
            return (
                GroundednessStatus::Pass,
                format!(
                    "Well-grounded response. High retrieval quality ({rp}%) matches strong AI confidence ({gp}%)."
                ),
            );
        }

        if gap > t.hallucination_gap {
            return (
                GroundednessStatus::Warning,
                format!(
                    "Confidence gap detected. AI confidence ({gp}%) may exceed available evidence ({rp}%)."
                ),
            );
        }

        (
            GroundednessStatus::Pass,
            format!("Acceptable groundedness. Retrieval quality: {rp}%, AI confidence: {gp}%."),
        )
    }
}

/// Score with the default thresholds.
pub fn calculate_groundedness(retrieval_scores: &[f64], logprobs: &[f64]) -> GroundednessResult {
    GroundednessScorer::default().score(retrieval_scores, logprobs)
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `exp` of the mean log-probability; 0 for an empty slice.
pub fn logprobs_to_confidence(logprobs: &[f64]) -> f64 {
    if logprobs.is_empty() {
        return 0.0;
    }
    mean(logprobs).exp()
}

/// Whole percentage with exact halves rounded away from zero (12.5 -> 13).
///
/// `{:.0}` rounds halves to even, which would print 12.5 as 12.
pub fn percent(value: f64) -> String {
    format!("{}", (value * 100.0).round())
}
