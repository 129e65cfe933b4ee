use serde::Serialize;

use crate::lib::advisor::{RankOutcome, RegionAssessment, SkippedRegion, Verdict};
use crate::lib::preflight::PreflightReport;
use crate::Result;

/// Top-level quota report containing metadata and the ranking
#[derive(Debug, Clone, Serialize)]
pub struct QuotaReport {
    pub metadata: ReportMetadata,
    pub best_region: Option<String>,
    pub best_score: Option<i64>,
    pub verdict: Option<Verdict>,
    pub assessments: Vec<RegionAssessment>,
    pub skipped: Vec<SkippedRegion>,
    pub next_steps: Vec<String>,
}

/// Metadata about the quota check
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub project: String,
    pub candidate_regions: Vec<String>,
}

impl QuotaReport {
    pub fn new(project: String, candidate_regions: Vec<String>, outcome: RankOutcome) -> Self {
        let verdict = outcome.best_score.map(Verdict::from_score);
        let next_steps = next_steps(outcome.best_region.as_deref());

        Self {
            metadata: ReportMetadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
                project,
                candidate_regions,
            },
            best_region: outcome.best_region,
            best_score: outcome.best_score,
            verdict,
            assessments: outcome.assessments,
            skipped: outcome.skipped,
            next_steps,
        }
    }

    /// Plain-text summary printed after the per-region details
    pub fn summary(&self) -> String {
        let mut lines = vec!["=".repeat(60), "QUOTA CHECK SUMMARY".to_string(), "=".repeat(60)];

        match (&self.best_region, self.best_score, self.verdict) {
            (Some(region), Some(score), Some(verdict)) => {
                lines.push(format!("Best region: {region} (score {score})"));
                lines.push(verdict.describe().to_string());
                lines.push(String::new());
                lines.push("Next steps:".to_string());
            }
            _ => {
                lines.push("No suitable region found for Dataflow.".to_string());
                lines.push("Consider:".to_string());
            }
        }
        for (i, step) in self.next_steps.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, step));
        }
        lines.join("\n")
    }
}

fn next_steps(best_region: Option<&str>) -> Vec<String> {
    match best_region {
        Some(region) => vec![
            format!("gcloud config set compute/region {region}"),
            format!("gcloud config set dataflow/region {region}"),
            format!("bulkloader pipeline --region {region}"),
            "or, with few IP addresses: bulkloader pipeline --profile constrained".to_string(),
        ],
        None => vec![
            "Request a quota increase in the Google Cloud console".to_string(),
            "Use an account or project with more resources".to_string(),
            "Load without Dataflow: bulkloader load".to_string(),
        ],
    }
}

/// Detailed block for one region
pub fn render_assessment(assessment: &RegionAssessment) -> String {
    let mut lines = vec![format!("Region: {}", assessment.region), "-".repeat(40)];
    if !assessment.critical_issues.is_empty() {
        lines.push("CRITICAL:".to_string());
        lines.extend(assessment.critical_issues.iter().map(|i| format!("   {i}")));
    }
    if !assessment.warnings.is_empty() {
        lines.push("WARNINGS:".to_string());
        lines.extend(assessment.warnings.iter().map(|w| format!("   {w}")));
    }
    if !assessment.recommendations.is_empty() {
        lines.push("OK:".to_string());
        lines.extend(assessment.recommendations.iter().map(|r| format!("   {r}")));
    }
    lines.push(format!("Score: {}", assessment.score));
    lines.join("\n")
}

pub fn render_preflight(report: &PreflightReport) -> String {
    let mut lines = vec!["CLOUD TOOLS:".to_string(), "-".repeat(40)];
    for check in &report.tools {
        lines.push(format!("{:<15} {} {}", check.name, mark(check.ok), check.detail));
    }
    lines.push(String::new());
    lines.push("GCLOUD CONFIGURATION:".to_string());
    lines.push("-".repeat(40));
    for check in &report.config {
        lines.push(format!("{:<15} {} {}", check.name, mark(check.ok), check.detail));
    }
    lines.push("=".repeat(60));
    if report.all_ok() {
        lines.push("All checks passed, the environment is ready.".to_string());
    } else {
        lines.push("Some checks failed:".to_string());
        lines.extend(report.hints().into_iter().map(|h| format!("   - {h}")));
    }
    lines.join("\n")
}

fn mark(ok: bool) -> &'static str {
    if ok { "[ok]  " } else { "[FAIL]" }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
