//! Orchestrator: drives one request through the pipeline state machine.
//!
//! ```text
//! Strategizing → Architecting → Planning → Generating → Writing → Verifying
//!                                               ↑                    │
//!                                               └──── Repairing ←────┤
//!                                                                    ↓
//!                                                               Terminated
//! ```
//!
//! The repair loop is bounded by `budget.max_repair_cycles`; each Verify
//! either terminates the run or consumes one cycle. `ProjectState` lives
//! here and nowhere else.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use coordination::contract::extractor::extract;
use coordination::validator;
use coordination::workspace::{create_run_dir, write_artifacts};
use coordination::{write_contract, Contract, FailureKind};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::agents::{architect, file_plan, strategist};
use crate::config::ForgeConfig;
use crate::file_generator::{ArtifactSource, FileGenerator, GenerationContext};
use crate::generation::{RigGenerator, TextGenerator};
use crate::harness::{HarnessOutcome, LiveHarness, VerificationHarness};
use crate::repair::RepairPlanner;
use crate::state::{FallbackRecord, GenerationIssue, ProjectState, StateUpdate};
use crate::state_machine::{PipelineState, StateMachine};
use crate::telemetry::{write_report, ReportCollector, RunReport, Verdict, VerificationSummary};

/// Mid-run progress, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub state: PipelineState,
    pub repair_attempt: u32,
    pub files_generated: usize,
    pub last_diagnostic: Option<String>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            state: PipelineState::Strategizing,
            repair_attempt: 0,
            files_generated: 0,
            last_diagnostic: None,
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub workspace: PathBuf,
    pub state: ProjectState,
    pub report: RunReport,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.report.verdict == Verdict::Passed
    }
}

pub struct Orchestrator {
    config: ForgeConfig,
    files: FileGenerator,
    generator: Arc<dyn TextGenerator>,
    harness: Box<dyn VerificationHarness>,
    status: watch::Sender<StatusSnapshot>,
}

impl Orchestrator {
    pub fn new(
        config: ForgeConfig,
        generator: Arc<dyn TextGenerator>,
        harness: Box<dyn VerificationHarness>,
    ) -> Self {
        let (status, _) = watch::channel(StatusSnapshot::default());
        Self {
            files: FileGenerator::new(Arc::clone(&generator)),
            config,
            generator,
            harness,
            status,
        }
    }

    /// Production wiring: rig-backed generator and the live harness.
    pub fn from_config(config: ForgeConfig) -> Result<Self> {
        let generator = RigGenerator::from_config(&config).context("Failed to build generator")?;
        let harness = LiveHarness::new(config.backend.supervisor(), config.backend.verifier())
            .context("Failed to build verification harness")?;
        Ok(Self::new(config, Arc::new(generator), Box::new(harness)))
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Subscribe to progress snapshots.
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    fn publish(&self, sm: &StateMachine, state: &ProjectState) {
        self.status.send_replace(StatusSnapshot {
            state: sm.current(),
            repair_attempt: state.repair_attempts,
            files_generated: state.files.len(),
            last_diagnostic: state.diagnostic.clone(),
        });
    }

    fn advance(
        &self,
        sm: &mut StateMachine,
        state: &ProjectState,
        to: PipelineState,
        reason: &str,
    ) -> Result<()> {
        sm.advance(to, Some(reason))?;
        self.publish(sm, state);
        Ok(())
    }

    pub async fn run(&mut self, request: &str) -> Result<RunOutcome> {
        let workspace = create_run_dir(&self.config.workspace_root, request, Local::now())
            .context("Failed to create run directory")?;
        info!(workspace = %workspace.display(), "Pipeline starting");

        let mut sm = StateMachine::new();
        let mut state = ProjectState::new(request);
        let mut report = ReportCollector::new(request);
        self.publish(&sm, &state);

        let result = self.drive(&workspace, &mut sm, &mut state, &mut report).await;
        self.harness.shutdown().await;

        let verdict = match &result {
            Ok(verdict) => *verdict,
            Err(e) => {
                warn!(error = %e, "Pipeline aborted");
                if !sm.is_terminal() {
                    sm.abort(&format!("aborted: {e}"))?;
                }
                state.diagnostic.get_or_insert_with(|| format!("Pipeline aborted: {e}"));
                self.publish(&sm, &state);
                Verdict::Aborted
            }
        };

        let run_report = report.finalize(verdict, &sm, &state);
        write_report(&run_report, &workspace);
        info!(
            verdict = ?verdict,
            tests_passed = state.tests_passed,
            repair_cycles = state.repair_attempts,
            summary = %sm.summary(),
            "Pipeline finished"
        );
        result?;

        Ok(RunOutcome {
            workspace,
            state,
            report: run_report,
        })
    }

    async fn drive(
        &mut self,
        workspace: &std::path::Path,
        sm: &mut StateMachine,
        state: &mut ProjectState,
        report: &mut ReportCollector,
    ) -> Result<Verdict> {
        let scope = strategist::strategize(self.generator.as_ref(), &state.request).await;
        state.apply(StateUpdate {
            scope: Some(scope),
            ..StateUpdate::default()
        });
        self.advance(sm, state, PipelineState::Architecting, "scope defined")?;

        let scope = state.scope.clone().unwrap_or_default();
        let architecture = architect::design(self.generator.as_ref(), &scope).await;
        self.advance(sm, state, PipelineState::Planning, "architecture designed")?;

        let plan = file_plan(&architecture);
        info!(files = plan.len(), plan = ?plan, "File plan");
        state.apply(StateUpdate {
            architecture: Some(architecture),
            file_plan: Some(plan),
            ..StateUpdate::default()
        });
        self.advance(sm, state, PipelineState::Generating, "file plan ready")?;

        loop {
            let update = self.generate_stage(state).await;
            state.apply(update);
            self.advance(sm, state, PipelineState::Writing, "artifacts generated")?;

            let update = self.write_stage(workspace, state)?;
            state.apply(update);
            self.advance(sm, state, PipelineState::Verifying, "artifacts written")?;

            let started = Instant::now();
            let outcome = self.harness.verify(workspace).await;
            let verify_ms = started.elapsed().as_millis() as u64;
            report.record_verification(match &outcome {
                HarnessOutcome::Verified(r) => {
                    VerificationSummary::from_result(state.repair_attempts, r, verify_ms)
                }
                HarnessOutcome::BootFailed(d) => {
                    VerificationSummary::boot_failed(state.repair_attempts, d, verify_ms)
                }
            });
            state.apply(verification_update(&outcome));

            if outcome.passed() && !state.has_generation_issues() {
                self.advance(sm, state, PipelineState::Terminated, "contract passed")?;
                return Ok(Verdict::Passed);
            }

            let reason = if outcome.passed() {
                "outstanding generation issues"
            } else {
                "verification failed"
            };

            if state.repair_attempts >= self.config.budget.max_repair_cycles {
                if outcome.passed() {
                    state.diagnostic = Some(format!(
                        "Generation issues outstanding: {}",
                        state.issue_paths().join(", ")
                    ));
                }
                state.last_failure = Some(FailureKind::RepairExhausted);
                warn!(
                    repair_attempts = state.repair_attempts,
                    "Repair budget exhausted"
                );
                self.advance(sm, state, PipelineState::Terminated, "repair budget exhausted")?;
                return Ok(Verdict::RepairExhausted);
            }

            self.advance(sm, state, PipelineState::Repairing, reason)?;
            let ctx = self.context(state);
            let update = RepairPlanner::new(&self.files, self.config.budget)
                .repair(state, &ctx)
                .await;
            state.apply(update);
            sm.set_cycle(state.repair_attempts);
            self.advance(sm, state, PipelineState::Generating, "targeted regeneration")?;
        }
    }

    fn context(&self, state: &ProjectState) -> GenerationContext {
        GenerationContext::from_state(
            state,
            &self.config.backend.base_url(),
            self.config.backend.port,
        )
    }

    /// Full plan on the first pass, `files_to_regenerate` afterwards.
    async fn generate_stage(&self, state: &ProjectState) -> StateUpdate {
        let initial = state.files.is_empty();
        let targets: Vec<String> = if initial {
            state.file_plan.clone()
        } else {
            state.files_to_regenerate.clone()
        };
        if targets.is_empty() {
            info!("No files flagged for regeneration");
            return StateUpdate::default();
        }
        info!(files = targets.len(), initial, "Generating artifacts");

        let mut ctx = self.context(state);
        let mut files = state.files.clone();
        let mut issues: Vec<GenerationIssue> = state
            .generation_issues
            .iter()
            .filter(|i| !targets.contains(&i.path))
            .cloned()
            .collect();
        let mut failed = Vec::new();
        let mut fallbacks = Vec::new();

        for path in &targets {
            let outcome = self
                .files
                .generate_with_retry(path, &ctx, self.config.budget.max_file_attempts)
                .await;

            match outcome.source {
                ArtifactSource::Fallback => fallbacks.push(FallbackRecord {
                    path: path.clone(),
                    reason: "failed in an earlier cycle".to_string(),
                    cycle: state.repair_attempts,
                }),
                ArtifactSource::Model if outcome.exhausted => {
                    issues.push(GenerationIssue {
                        path: path.clone(),
                        issues: outcome.issues.clone(),
                        kind: outcome.kind,
                    });
                    failed.push(path.clone());
                }
                _ => {}
            }

            if validator::ArtifactRole::detect(path).is_backend_entry() {
                ctx.refresh_routes(&outcome.content);
            }
            files.insert(path.clone(), outcome.content);
        }

        if !issues.is_empty() {
            warn!(count = issues.len(), "Files with generation issues, repair will follow");
        }

        StateUpdate {
            files: Some(files),
            generation_issues: Some(issues),
            files_to_regenerate: Some(Vec::new()),
            failed_history: failed,
            fallbacks,
            ..StateUpdate::default()
        }
    }

    /// Persist artifacts and the contract extracted from the backend entry.
    fn write_stage(&self, workspace: &std::path::Path, state: &ProjectState) -> Result<StateUpdate> {
        write_artifacts(workspace, &state.files).context("Failed to write artifacts")?;

        let base_url = self.config.backend.base_url();
        let contract = validator::backend_entry(&state.file_plan)
            .and_then(|entry| state.files.get(entry))
            .map(|source| extract(source, &base_url))
            .unwrap_or_else(|| Contract::new(base_url.as_str()));
        write_contract(workspace, &contract).context("Failed to write contract")?;
        info!(endpoints = contract.endpoints.len(), "Contract written");

        Ok(StateUpdate {
            contract: Some(contract),
            ..StateUpdate::default()
        })
    }
}

fn verification_update(outcome: &HarnessOutcome) -> StateUpdate {
    match outcome {
        HarnessOutcome::Verified(result) if result.passed => StateUpdate {
            tests_passed: Some(true),
            diagnostic: Some(None),
            last_failure: Some(None),
            failing_routes: Some(Vec::new()),
            ..StateUpdate::default()
        },
        HarnessOutcome::Verified(result) => StateUpdate {
            tests_passed: Some(false),
            diagnostic: Some(result.diagnostic()),
            last_failure: Some(Some(FailureKind::ContractMismatch)),
            failing_routes: Some(result.failing_routes()),
            ..StateUpdate::default()
        },
        HarnessOutcome::BootFailed(diagnostic) => StateUpdate {
            tests_passed: Some(false),
            diagnostic: Some(Some(diagnostic.clone())),
            last_failure: Some(Some(FailureKind::ServerBootFailure)),
            failing_routes: Some(Vec::new()),
            ..StateUpdate::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::{EndpointResult, VerificationResult};

    #[test]
    fn test_verification_update_for_failure() {
        let outcome = HarnessOutcome::Verified(VerificationResult {
            passed: false,
            total: 1,
            failed: 1,
            endpoints: vec![EndpointResult {
                method: "GET".into(),
                path: "/items".into(),
                expected: 200,
                actual: Some(404),
                ok: false,
                error: Some("expected 200, got 404".into()),
                body_sent: None,
            }],
            note: None,
        });
        let mut state = ProjectState::new("x");
        state.apply(verification_update(&outcome));
        assert!(!state.tests_passed);
        assert_eq!(state.last_failure, Some(FailureKind::ContractMismatch));
        assert_eq!(state.failing_routes, vec![("GET".to_string(), "/items".to_string())]);
        assert!(state.diagnostic.unwrap().contains("GET /items"));
    }

    #[test]
    fn test_verification_update_for_boot_failure() {
        let mut state = ProjectState::new("x");
        state.failing_routes = vec![("GET".into(), "/".into())];
        state.apply(verification_update(&HarnessOutcome::BootFailed("BOOT_FAIL".into())));
        assert_eq!(state.last_failure, Some(FailureKind::ServerBootFailure));
        assert!(state.failing_routes.is_empty());
    }

    #[test]
    fn test_status_default() {
        let s = StatusSnapshot::default();
        assert_eq!(s.state, PipelineState::Strategizing);
        assert_eq!(s.files_generated, 0);
    }
}
