//! # finsight-core — groundedness scoring and analysis job tracking
//!
//! The analysis backend ingests annual-report PDFs and runs a retrieval + LLM
//! pipeline. This crate consumes what that backend produces:
//!
//! - [`grounding`] turns retrieval similarity scores and token log-probabilities
//!   into a hallucination-risk verdict and a retrieval consensus classification.
//! - [`poller`] follows a long-running analysis job until it completes or fails.
//! - [`api`] talks to the backend over HTTP and fetches analyses in batches.
//! - [`progress`] maps job status onto the fixed pipeline stages.

pub mod api;
pub mod config;
pub mod error;
pub mod grounding;
pub mod poller;
pub mod progress;
pub mod types;

pub use api::{AnalysisBackend, HttpBackend, MockBackend, Session, fetch_many};
pub use config::{FinsightConfig, load_config};
pub use error::{ApiError, FinsightError, Result};
pub use grounding::{
    ConsensusKind, GroundednessResult, GroundednessScorer, GroundednessStatus,
    GroundednessThresholds, GroundingReport, RetrievalConsensus, analyze_retrieval_consensus,
    calculate_groundedness,
};
pub use poller::{JobOutcome, PollOptions, PollPhase, PollSnapshot, PollerHandle, watch_job};
pub use progress::{AnalysisStage, StageState, progress_percentage};
pub use types::{AnalysisResponse, AnalysisStatus, JobStatus};
