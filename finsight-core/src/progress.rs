//! Analysis stage tracking.

use crate::types::{AnalysisStatus, JobStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Progress is capped below 100% until the job reports `completed`.
pub const MAX_IN_FLIGHT_PERCENT: i64 = 95;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Uploading,
    Research,
    Analysis,
    Validation,
    Intelligence,
}

impl AnalysisStage {
    pub const ALL: [AnalysisStage; 5] = [
        Self::Uploading,
        Self::Research,
        Self::Analysis,
        Self::Validation,
        Self::Intelligence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Validation => "validation",
            Self::Intelligence => "intelligence",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Uploading => "Upload",
            Self::Research => "Research",
            Self::Analysis => "Analysis",
            Self::Validation => "Validation",
            Self::Intelligence => "Intelligence",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Uploading => "Uploading and processing document",
            Self::Research => "Retrieving relevant documents and data",
            Self::Analysis => "Analyzing financial data and extracting insights",
            Self::Validation => "Verifying results against source documents",
            Self::Intelligence => "Generating final intelligence report",
        }
    }

    pub fn position(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or_default()
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown analysis stage: {s}"))
    }
}

/// Display state of a single stage relative to the job's current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageState {
    Complete,
    InProgress,
    Pending,
    Failed,
}

/// Position of the server's `current_stage` in [`AnalysisStage::ALL`].
///
/// The server's own `stage_index` is ignored because its sequence omits
/// the upload stage.
pub fn stage_position(status: &AnalysisStatus) -> Option<usize> {
    status
        .current_stage
        .as_deref()
        .and_then(|s| s.parse::<AnalysisStage>().ok())
        .map(|stage| stage.position())
}

/// Overall completion percentage in `[0, 100]`.
pub fn progress_percentage(status: Option<&AnalysisStatus>) -> u8 {
    let Some(status) = status else {
        return 0;
    };
    if status.status == JobStatus::Completed {
        return 100;
    }
    let index = stage_position(status).map_or(-1, |p| p as i64);
    let total = AnalysisStage::ALL.len() as f64;
    let pct = ((index as f64 / total) * 100.0).round() as i64;
    pct.clamp(0, MAX_IN_FLIGHT_PERCENT) as u8
}

pub fn stage_state(current: Option<usize>, stage: usize, job_status: JobStatus) -> StageState {
    let current = current.map_or(-1, |c| c as i64);
    let stage = stage as i64;
    if job_status == JobStatus::Failed && stage == current {
        StageState::Failed
    } else if stage < current {
        StageState::Complete
    } else if stage == current {
        StageState::InProgress
    } else {
        StageState::Pending
    }
}

/// State of every stage for the given status.
pub fn stage_states(status: &AnalysisStatus) -> Vec<(AnalysisStage, StageState)> {
    let current = stage_position(status);
    AnalysisStage::ALL
        .iter()
        .enumerate()
        .map(|(i, &stage)| (stage, stage_state(current, i, status.status)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_status_is_zero() {
        assert_eq!(progress_percentage(None), 0);
    }

    #[test]
    fn test_completed_is_full() {
        let status = AnalysisStatus::new(JobStatus::Completed).with_stage("validation");
        assert_eq!(progress_percentage(Some(&status)), 100);
    }

    #[test]
    fn test_percentage_follows_stage() {
        let at = |stage: &str| {
            let status = AnalysisStatus::new(JobStatus::InProgress).with_stage(stage);
            progress_percentage(Some(&status))
        };
        assert_eq!(at("uploading"), 0);
        assert_eq!(at("research"), 20);
        assert_eq!(at("analysis"), 40);
        assert_eq!(at("validation"), 60);
        assert_eq!(at("intelligence"), 80);
        assert_eq!(at("something-else"), 0);
    }

    #[test]
    fn test_stage_states_for_running_job() {
        let status = AnalysisStatus::new(JobStatus::InProgress).with_stage("analysis");
        let states: Vec<StageState> = stage_states(&status).into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            states,
            vec![
                StageState::Complete,
                StageState::Complete,
                StageState::InProgress,
                StageState::Pending,
                StageState::Pending,
            ]
        );
    }

    #[test]
    fn test_failed_stage_marked() {
        let status = AnalysisStatus::new(JobStatus::Failed).with_stage("validation");
        let states = stage_states(&status);
        assert_eq!(states[3], (AnalysisStage::Validation, StageState::Failed));
        assert_eq!(states[2].1, StageState::Complete);
    }

    #[test]
    fn test_unknown_stage_leaves_all_pending() {
        let status = AnalysisStatus::new(JobStatus::Pending);
        assert!(stage_states(&status)
            .iter()
            .all(|(_, s)| *s == StageState::Pending));
    }

    #[test]
    fn test_stage_parse_roundtrip() {
        for stage in AnalysisStage::ALL {
            assert_eq!(stage.as_str().parse::<AnalysisStage>().unwrap(), stage);
        }
        assert!("deploy".parse::<AnalysisStage>().is_err());
        assert_eq!(AnalysisStage::Validation.label(), "Validation");
    }
}
