//! Repair Planner: pick the minimal set of artifacts to regenerate after a
//! failed verification, repair each with a targeted failure report, and
//! force fallbacks once the last cycle is reached.

use std::cmp::Reverse;

use coordination::fallback;
use coordination::validator::{self, ArtifactRole};
use coordination::{FailureKind, FailureReport};
use tracing::{info, warn};

use crate::config::BudgetConfig;
use crate::file_generator::{FileGenerator, GenerationContext};
use crate::state::{FallbackRecord, GenerationIssue, ProjectState, StateUpdate};

/// Repaired content shorter than this is treated as a non-answer.
pub const MIN_REPAIR_CHARS: usize = 100;

/// One artifact selected for repair and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairTarget {
    pub path: String,
    pub kind: FailureKind,
}

/// Ordered, deduplicated repair targets for the current state.
///
/// 1. backend entry, when the backend failed to boot
/// 2. files with outstanding generation issues
/// 3. files that currently fail validation
/// 4. backend entry, when any route failed verification
/// 5. backend entry, when verification failed and nothing else was selected
///
/// The result is then stably ordered by [`FailureKind::repair_priority`].
pub fn select_targets(state: &ProjectState) -> Vec<RepairTarget> {
    let mut targets: Vec<RepairTarget> = Vec::new();
    let backend = validator::backend_entry(&state.file_plan);

    if state.last_failure == Some(FailureKind::ServerBootFailure) {
        if let Some(entry) = backend {
            push(&mut targets, entry, FailureKind::ServerBootFailure);
        }
    }

    for issue in &state.generation_issues {
        push(
            &mut targets,
            &issue.path,
            issue.kind.unwrap_or(FailureKind::GenerationIncomplete),
        );
    }

    for path in &state.file_plan {
        let Some(content) = state.files.get(path) else {
            continue;
        };
        let report = validator::validate(content, path);
        if let Some(kind) = report.failure_kind() {
            push(&mut targets, path, kind);
        }
    }

    if !state.failing_routes.is_empty() {
        if let Some(entry) = backend {
            push(&mut targets, entry, FailureKind::ContractMismatch);
        }
    }

    if targets.is_empty() && !state.tests_passed {
        if let Some(entry) = backend {
            let kind = state.last_failure.unwrap_or(FailureKind::ContractMismatch);
            push(&mut targets, entry, kind);
        }
    }

    targets.sort_by_key(|t| Reverse(t.kind.repair_priority()));
    targets
}

fn push(targets: &mut Vec<RepairTarget>, path: &str, kind: FailureKind) {
    if !targets.iter().any(|t| t.path == path) {
        targets.push(RepairTarget {
            path: path.to_string(),
            kind,
        });
    }
}

pub struct RepairPlanner<'a> {
    files: &'a FileGenerator,
    budget: BudgetConfig,
}

impl<'a> RepairPlanner<'a> {
    pub fn new(files: &'a FileGenerator, budget: BudgetConfig) -> Self {
        Self { files, budget }
    }

    /// Run one repair cycle. The returned update bumps `repair_attempts`.
    pub async fn repair(&self, state: &ProjectState, ctx: &GenerationContext) -> StateUpdate {
        let cycle = state.repair_attempts + 1;
        let final_cycle = cycle >= self.budget.max_repair_cycles;
        let targets = select_targets(state);

        info!(
            cycle,
            final_cycle,
            targets = ?targets.iter().map(|t| t.path.as_str()).collect::<Vec<_>>(),
            "Repair cycle"
        );

        let mut files = state.files.clone();
        let mut still_bad: Vec<GenerationIssue> = Vec::new();

        for target in &targets {
            let path = target.path.as_str();
            let current = files.get(path).cloned().unwrap_or_default();
            let validation = validator::validate(&current, path);
            let diagnostic = if ArtifactRole::detect(path).is_backend_entry() {
                state.diagnostic.as_deref()
            } else {
                None
            };
            let report = FailureReport::build(
                target.kind,
                path,
                (!validation.complete).then_some(&validation),
                diagnostic,
            );

            let outcome = self
                .files
                .repair_with_retry(path, &current, &report, ctx, self.budget.max_file_attempts)
                .await;

            let produced = outcome.content.trim().len();
            if produced < MIN_REPAIR_CHARS {
                warn!(path, chars = produced, "Repair output too short, keeping previous content");
                still_bad.push(GenerationIssue {
                    path: path.to_string(),
                    issues: vec![format!(
                        "Repair output too short ({produced} chars), previous content kept"
                    )],
                    kind: Some(target.kind),
                });
                continue;
            }

            if outcome.exhausted {
                still_bad.push(GenerationIssue {
                    path: path.to_string(),
                    issues: outcome.issues.clone(),
                    kind: outcome.kind,
                });
            } else {
                info!(path, attempts = outcome.attempts, "Artifact repaired");
            }
            files.insert(path.to_string(), outcome.content);
        }

        let mut update = StateUpdate {
            repair_attempts: Some(cycle),
            ..StateUpdate::default()
        };

        if final_cycle {
            for issue in &still_bad {
                warn!(
                    path = %issue.path,
                    cycle,
                    fallback = true,
                    "Still invalid at final repair cycle, substituting fallback"
                );
                files.insert(
                    issue.path.clone(),
                    fallback::fallback(&issue.path, &ctx.template),
                );
                update.fallbacks.push(FallbackRecord {
                    path: issue.path.clone(),
                    reason: issue
                        .issues
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "still invalid at final repair cycle".to_string()),
                    cycle,
                });
            }
            update.generation_issues = Some(Vec::new());
            update.files_to_regenerate = Some(Vec::new());
        } else {
            let paths: Vec<String> = still_bad.iter().map(|i| i.path.clone()).collect();
            update.failed_history = paths.clone();
            update.files_to_regenerate = Some(paths);
            update.generation_issues = Some(still_bad);
        }

        update.files = Some(files);
        update
    }
}
