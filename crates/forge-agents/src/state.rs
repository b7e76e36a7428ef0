//! Project state threaded through one pipeline run.
//!
//! Only the orchestrator holds a `ProjectState`. Stages hand back a
//! `StateUpdate`; `apply` merges it last-write-wins per field, except
//! `failed_history` (set union) and `fallbacks` (append).

use std::collections::{BTreeMap, BTreeSet};

use coordination::{Contract, FailureKind};
use serde::{Deserialize, Serialize};

use crate::agents::{Architecture, ProjectScope};

/// An artifact that exhausted local retries without validating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationIssue {
    pub path: String,
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

/// A fallback artifact substituted for model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRecord {
    pub path: String,
    pub reason: String,
    /// Repair cycle in which the substitution happened (0 = initial generation).
    pub cycle: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectState {
    pub request: String,
    pub scope: Option<ProjectScope>,
    pub architecture: Option<Architecture>,
    pub file_plan: Vec<String>,
    pub files: BTreeMap<String, String>,
    pub tests_passed: bool,
    pub diagnostic: Option<String>,
    pub repair_attempts: u32,
    pub generation_issues: Vec<GenerationIssue>,
    pub files_to_regenerate: Vec<String>,
    /// Paths that have ever exhausted local retries. Never shrinks.
    pub failed_history: BTreeSet<String>,
    pub last_failure: Option<FailureKind>,
    pub failing_routes: Vec<(String, String)>,
    pub fallbacks: Vec<FallbackRecord>,
    pub contract: Option<Contract>,
}

/// Partial update returned by a stage. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub scope: Option<ProjectScope>,
    pub architecture: Option<Architecture>,
    pub file_plan: Option<Vec<String>>,
    /// Replaces the whole map.
    pub files: Option<BTreeMap<String, String>>,
    pub tests_passed: Option<bool>,
    pub diagnostic: Option<Option<String>>,
    pub repair_attempts: Option<u32>,
    pub generation_issues: Option<Vec<GenerationIssue>>,
    pub files_to_regenerate: Option<Vec<String>>,
    /// Unioned into the existing history.
    pub failed_history: Vec<String>,
    pub last_failure: Option<Option<FailureKind>>,
    pub failing_routes: Option<Vec<(String, String)>>,
    /// Appended to the existing records.
    pub fallbacks: Vec<FallbackRecord>,
    pub contract: Option<Contract>,
}

impl ProjectState {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(v) = update.scope {
            self.scope = Some(v);
        }
        if let Some(v) = update.architecture {
            self.architecture = Some(v);
        }
        if let Some(v) = update.file_plan {
            self.file_plan = v;
        }
        if let Some(v) = update.files {
            self.files = v;
        }
        if let Some(v) = update.tests_passed {
            self.tests_passed = v;
        }
        if let Some(v) = update.diagnostic {
            self.diagnostic = v;
        }
        if let Some(v) = update.repair_attempts {
            self.repair_attempts = v;
        }
        if let Some(v) = update.generation_issues {
            self.generation_issues = v;
        }
        if let Some(v) = update.files_to_regenerate {
            self.files_to_regenerate = v;
        }
        self.failed_history.extend(update.failed_history);
        if let Some(v) = update.last_failure {
            self.last_failure = v;
        }
        if let Some(v) = update.failing_routes {
            self.failing_routes = v;
        }
        self.fallbacks.extend(update.fallbacks);
        if let Some(v) = update.contract {
            self.contract = Some(v);
        }
    }

    pub fn has_generation_issues(&self) -> bool {
        !self.generation_issues.is_empty()
    }

    /// Paths with outstanding generation issues, in record order.
    pub fn issue_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for issue in &self.generation_issues {
            if !paths.contains(&issue.path) {
                paths.push(issue.path.clone());
            }
        }
        paths
    }

    pub fn project_goal(&self) -> &str {
        self.scope
            .as_ref()
            .map_or(self.request.as_str(), |s| s.project_goal.as_str())
    }
}
