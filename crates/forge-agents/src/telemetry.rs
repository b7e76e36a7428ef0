//! Run report for one pipeline run.
//!
//! `ReportCollector` accumulates per-cycle verification summaries while the
//! orchestrator runs; `finalize()` folds in the state machine's transition
//! log and the final project state. The report is written to
//! `.forge-report.json` in the run workspace.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use coordination::VerificationResult;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::prompts::PROMPT_VERSION;
use crate::state::{FallbackRecord, GenerationIssue, ProjectState};
use crate::state_machine::{PipelineState, StateMachine, TransitionRecord};

pub const REPORT_FILE: &str = ".forge-report.json";

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Contract passed with no outstanding generation issues.
    Passed,
    /// Budget consumed before the contract passed.
    RepairExhausted,
    /// Infrastructure failure ended the run early.
    Aborted,
}

/// Wall-clock time spent in one visit to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineState,
    pub cycle: u32,
    pub elapsed_ms: u64,
}

/// Compact outcome of one Verify stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub cycle: u32,
    pub passed: bool,
    pub total: usize,
    pub failed: usize,
    /// `METHOD /path: reason` for each failing endpoint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub verify_ms: u64,
}

impl VerificationSummary {
    pub fn from_result(cycle: u32, result: &VerificationResult, verify_ms: u64) -> Self {
        Self {
            cycle,
            passed: result.passed,
            total: result.total,
            failed: result.failed,
            failures: result
                .endpoints
                .iter()
                .filter(|e| !e.ok)
                .map(|e| {
                    format!(
                        "{} {}: {}",
                        e.method,
                        e.path,
                        e.error.as_deref().unwrap_or("failed")
                    )
                })
                .collect(),
            boot_failure: None,
            note: result.note.clone(),
            verify_ms,
        }
    }

    pub fn boot_failed(cycle: u32, diagnostic: &str, verify_ms: u64) -> Self {
        Self {
            cycle,
            passed: false,
            total: 0,
            failed: 0,
            failures: Vec::new(),
            boot_failure: Some(diagnostic.to_string()),
            note: None,
            verify_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub request: String,
    pub prompt_version: String,
    pub verdict: Verdict,
    pub tests_passed: bool,
    pub repair_cycles: u32,
    pub files_written: usize,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub transitions: Vec<TransitionRecord>,
    pub stages: Vec<StageTiming>,
    pub verifications: Vec<VerificationSummary>,
    #[serde(default)]
    pub fallbacks: Vec<FallbackRecord>,
    #[serde(default)]
    pub generation_issues: Vec<GenerationIssue>,
}

/// Per-stage durations derived from a transition log.
pub fn stage_timings(transitions: &[TransitionRecord]) -> Vec<StageTiming> {
    let mut timings = Vec::with_capacity(transitions.len());
    let mut entered_ms = 0u64;
    let mut entered_cycle = 0u32;
    for t in transitions {
        timings.push(StageTiming {
            stage: t.from,
            cycle: entered_cycle,
            elapsed_ms: t.elapsed_ms.saturating_sub(entered_ms),
        });
        entered_ms = t.elapsed_ms;
        entered_cycle = t.cycle;
    }
    timings
}

pub struct ReportCollector {
    request: String,
    started: Instant,
    started_at: DateTime<Utc>,
    verifications: Vec<VerificationSummary>,
}

impl ReportCollector {
    pub fn new(request: &str) -> Self {
        Self {
            request: request.to_string(),
            started: Instant::now(),
            started_at: Utc::now(),
            verifications: Vec::new(),
        }
    }

    pub fn record_verification(&mut self, summary: VerificationSummary) {
        self.verifications.push(summary);
    }

    pub fn finalize(self, verdict: Verdict, sm: &StateMachine, state: &ProjectState) -> RunReport {
        RunReport {
            request: self.request,
            prompt_version: PROMPT_VERSION.to_string(),
            verdict,
            tests_passed: state.tests_passed,
            repair_cycles: state.repair_attempts,
            files_written: state.files.len(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            started_at: self.started_at,
            finished_at: Utc::now(),
            diagnostic: state.diagnostic.clone(),
            transitions: sm.transitions().to_vec(),
            stages: stage_timings(sm.transitions()),
            verifications: self.verifications,
            fallbacks: state.fallbacks.clone(),
            generation_issues: state.generation_issues.clone(),
        }
    }
}

/// Write the report to `.forge-report.json` in the workspace. Failures are logged, not raised.
pub fn write_report(report: &RunReport, workspace: &Path) {
    let path = workspace.join(REPORT_FILE);
    match serde_json::to_string_pretty(report) {
        Ok(json) => match std::fs::write(&path, json) {
            Ok(()) => info!(path = %path.display(), "Wrote run report"),
            Err(e) => warn!("Failed to write run report: {e}"),
        },
        Err(e) => warn!("Failed to serialize run report: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: PipelineState, to: PipelineState, cycle: u32, elapsed_ms: u64) -> TransitionRecord {
        TransitionRecord {
            from,
            to,
            cycle,
            elapsed_ms,
            reason: None,
        }
    }

    #[test]
    fn test_stage_timings_from_transitions() {
        use PipelineState::*;
        let log = vec![
            record(Strategizing, Architecting, 0, 10),
            record(Architecting, Planning, 0, 25),
            record(Verifying, Repairing, 0, 40),
            record(Repairing, Generating, 1, 70),
        ];
        let timings = stage_timings(&log);
        assert_eq!(timings[0].elapsed_ms, 10);
        assert_eq!(timings[1].elapsed_ms, 15);
        assert_eq!(timings[3].stage, Repairing);
        assert_eq!(timings[3].elapsed_ms, 30);
        assert_eq!(timings[3].cycle, 0);
    }

    #[test]
    fn test_summary_lists_failures() {
        let result = VerificationResult {
            passed: false,
            total: 2,
            failed: 1,
            endpoints: vec![coordination::EndpointResult {
                method: "DELETE".into(),
                path: "/delete/1".into(),
                expected: 200,
                actual: Some(500),
                ok: false,
                error: Some("expected 200, got 500".into()),
                body_sent: None,
            }],
            note: None,
        };
        let summary = VerificationSummary::from_result(2, &result, 5);
        assert_eq!(summary.failures, vec!["DELETE /delete/1: expected 200, got 500"]);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let sm = StateMachine::new();
        let state = ProjectState::new("todo");
        let report = ReportCollector::new("todo").finalize(Verdict::Aborted, &sm, &state);
        write_report(&report, dir.path());

        let text = std::fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap();
        let restored: RunReport = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.verdict, Verdict::Aborted);
        assert_eq!(restored.prompt_version, PROMPT_VERSION);
    }
}
