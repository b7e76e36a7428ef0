//! Structured failure reports that drive targeted repair prompts.
//!
//! A report narrows the model's attention: which failure kind, which routes,
//! which lines. Raw diagnostics ride along verbatim at the end.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;
use crate::validator::{ArtifactRole, ValidationReport};

static FAILING_ROUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(GET|POST|PUT|DELETE|PATCH)\s+(/[^\s:]*)").unwrap());

static LINE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"line (\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailingRoute {
    pub method: String,
    pub path: String,
    /// Declaration the backend should contain for this route.
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: FailureKind,
    /// Artifact the report targets.
    pub path: String,
    #[serde(default)]
    pub failing_routes: Vec<FailingRoute>,
    #[serde(default)]
    pub line_numbers: Vec<usize>,
    /// Validator issues and similar per-file findings.
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// `(METHOD, /path)` pairs mentioned in a diagnostic, deduplicated in order.
pub fn parse_failing_routes(diagnostic: &str) -> Vec<(String, String)> {
    let mut routes: Vec<(String, String)> = Vec::new();
    for caps in FAILING_ROUTE.captures_iter(diagnostic) {
        let (Some(m), Some(p)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let route = (m.as_str().to_string(), p.as_str().to_string());
        if !routes.contains(&route) {
            routes.push(route);
        }
    }
    routes
}

/// Every `line N` reference, deduplicated and sorted.
pub fn parse_line_numbers(text: &str) -> Vec<usize> {
    let mut lines: Vec<usize> = LINE_NUMBER
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect();
    lines.sort_unstable();
    lines.dedup();
    lines
}

/// The declaration form a backend of `role` uses for `method path`.
pub fn suggest_declaration(role: ArtifactRole, method: &str, path: &str) -> String {
    match role {
        ArtifactRole::ExpressBackend => format!(
            "app.{}('{}', (req, res) => {{ ... }})",
            method.to_lowercase(),
            path
        ),
        _ => format!("@app.route('{}', methods=['{}'])", path, method.to_uppercase()),
    }
}

impl FailureReport {
    pub fn new(kind: FailureKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            failing_routes: Vec::new(),
            line_numbers: Vec::new(),
            details: Vec::new(),
            diagnostic: None,
        }
    }

    /// Collect everything relevant to repairing `path`.
    ///
    /// Routes are only attached to backend entry points, since a
    /// failing route maps to the artifact that owns it.
    pub fn build(
        kind: FailureKind,
        path: &str,
        validation: Option<&ValidationReport>,
        diagnostic: Option<&str>,
    ) -> Self {
        let mut report = Self::new(kind, path);
        let role = ArtifactRole::detect(path);

        if let Some(v) = validation {
            report.details = v.messages();
            report.line_numbers = v.lines();
        }
        if let Some(diag) = diagnostic {
            if role.is_backend_entry() {
                report.failing_routes = parse_failing_routes(diag)
                    .into_iter()
                    .map(|(method, route)| FailingRoute {
                        suggestion: suggest_declaration(role, &method, &route),
                        method,
                        path: route,
                    })
                    .collect();
            }
            report.line_numbers.extend(parse_line_numbers(diag));
            report.diagnostic = Some(diag.to_string());
        }
        report.line_numbers.sort_unstable();
        report.line_numbers.dedup();
        report
    }

    /// Prompt-ready text.
    pub fn render(&self) -> String {
        let mut out = format!("Failure: {} in {}\n", self.kind, self.path);
        if !self.details.is_empty() {
            out.push_str("\nIssues found:\n");
            for d in &self.details {
                out.push_str(&format!("- {d}\n"));
            }
        }
        if !self.failing_routes.is_empty() {
            out.push_str("\nFailing routes (each must exist and return 2xx):\n");
            for r in &self.failing_routes {
                out.push_str(&format!("- {} {} -> expected {}\n", r.method, r.path, r.suggestion));
            }
        }
        if !self.line_numbers.is_empty() {
            let lines: Vec<String> = self.line_numbers.iter().map(|l| l.to_string()).collect();
            out.push_str(&format!("\nCheck lines: {}\n", lines.join(", ")));
        }
        if let Some(diag) = &self.diagnostic {
            out.push_str("\nRaw diagnostic:\n");
            out.push_str(diag);
            out.push('\n');
        }
        out
    }
}
