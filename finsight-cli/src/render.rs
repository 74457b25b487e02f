//! Plain-text rendering of reports and job progress.

use finsight_core::grounding::confidence::{LOW_TOKEN_CONFIDENCE, sentence_confidences};
use finsight_core::grounding::consensus::ScoreBand;
use finsight_core::grounding::groundedness::percent;
use finsight_core::progress::{StageState, stage_position, stage_states};
use finsight_core::types::{DashboardStats, DocumentResponse};
use finsight_core::{
    AnalysisResponse, AnalysisStage, AnalysisStatus, GroundednessResult, GroundingReport,
    RetrievalConsensus, progress_percentage,
};
use std::fmt::Write;

const BAR_WIDTH: usize = 20;

fn pct(value: f64) -> String {
    format!("{}%", percent(value))
}

pub fn groundedness(result: &GroundednessResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Groundedness: {}", result.status);
    let _ = writeln!(out, "  {:<27}{}", "Retrieval quality (R):", pct(result.retrieval));
    let _ = writeln!(out, "  {:<27}{}", "Generation confidence (G):", pct(result.generation));
    let _ = writeln!(out, "  {:<27}{:+}%", "Gap (G - R):", (result.gap * 100.0).round());
    if result.is_hallucination_risk {
        let _ = writeln!(out, "  Hallucination risk: yes");
    }
    let _ = write!(out, "  {}", result.status_reason);
    out
}

pub fn consensus(result: &RetrievalConsensus) -> String {
    format!(
        "Retrieval: {} ({})",
        result.kind.label(),
        result.description
    )
}

pub fn report(report: &GroundingReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Document {}", report.document_id);
    let _ = writeln!(out, "{}", groundedness(&report.groundedness));
    let _ = write!(out, "{}", consensus(&report.consensus));
    if !report.chunks.is_empty() {
        let _ = writeln!(out);
        let chunks: Vec<String> = report
            .chunks
            .iter()
            .map(|c| {
                let band = match c.band {
                    ScoreBand::High => "high",
                    ScoreBand::Medium => "med",
                    ScoreBand::Low => "low",
                };
                format!("{} {}% {band}", c.label, c.percentage)
            })
            .collect();
        let _ = write!(out, "Sources: {}", chunks.join(", "));
    }
    out
}

/// Answer text followed by any sentences the model was unsure about.
pub fn answer(analysis: &AnalysisResponse) -> String {
    let mut out = analysis.answer.trim().to_string();
    let flagged: Vec<_> = sentence_confidences(&analysis.answer, analysis.token_confidences.as_deref())
        .into_iter()
        .filter(|s| s.avg_confidence < LOW_TOKEN_CONFIDENCE)
        .collect();
    if !flagged.is_empty() {
        out.push_str("\n\nLow-confidence statements:");
        for s in flagged {
            let _ = write!(out, "\n  [{}] {}", pct(s.avg_confidence), s.sentence);
        }
    }
    out
}

/// One-line progress bar for a job status.
pub fn progress(status: &AnalysisStatus) -> String {
    let percent = progress_percentage(Some(status));
    let filled = usize::from(percent) * BAR_WIDTH / 100;
    let bar = format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled));
    let stage = stage_position(status)
        .map(|i| AnalysisStage::ALL[i])
        .map(|s| format!("{}: {}", s.label(), s.description()))
        .unwrap_or_else(|| status.status.to_string());
    let mut line = format!("[{bar}] {percent:>3}% {stage}");
    if let Some(message) = status.message.as_deref().filter(|m| !m.is_empty()) {
        let _ = write!(line, " ({message})");
    }
    line
}

/// Stage checklist, one stage per line.
pub fn stages(status: &AnalysisStatus) -> String {
    stage_states(status)
        .into_iter()
        .map(|(stage, state)| {
            let mark = match state {
                StageState::Complete => "x",
                StageState::InProgress => ">",
                StageState::Pending => " ",
                StageState::Failed => "!",
            };
            format!("  [{mark}] {}", stage.label())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn documents(docs: &[DocumentResponse]) -> String {
    if docs.is_empty() {
        return "No documents uploaded.".to_string();
    }
    docs.iter()
        .map(|d| format!("{}  {:<8} {}  {}", d.document_id, d.ticker, d.filename, d.created_at))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn stats(stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reports analyzed: {}", stats.total_reports);
    let _ = writeln!(
        out,
        "Last analysis:    {}",
        stats.last_analysis.as_deref().unwrap_or("never")
    );
    let _ = write!(out, "AI accuracy:      {:.1}%", stats.ai_accuracy_score);
    for (sentiment, count) in &stats.sentiment_distribution {
        let _ = write!(out, "\n  {sentiment}: {count}");
    }
    out
}
