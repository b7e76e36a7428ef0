//! Artifact Validator: static completeness analysis of one generated file.
//!
//! The check order is fixed: emptiness, truncation of the last meaningful
//! line, syntax parse (fail fast), required constructs, bracket balance.
//! An artifact is complete exactly when no issue is raised. Everything here
//! is a pure function of `(content, path)`.

mod balance;
mod constructs;
pub mod kind;
pub mod syntax;
mod truncation;

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;
pub use kind::{backend_entry, file_name, ArtifactKind, ArtifactRole};

use balance::Lexicon;

/// Which check raised an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Empty,
    Truncation,
    Syntax,
    MissingConstruct,
    Unbalanced,
}

impl IssueCategory {
    pub fn failure_kind(self) -> FailureKind {
        match self {
            Self::Syntax | Self::Unbalanced => FailureKind::SyntaxInvalid,
            Self::Empty | Self::Truncation | Self::MissingConstruct => {
                FailureKind::GenerationIncomplete
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub category: IssueCategory,
    pub message: String,
    /// 1-based, set for syntax errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl ValidationIssue {
    fn new(category: IssueCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            line: None,
            column: None,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub complete: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            complete: issues.is_empty(),
            issues,
        }
    }

    /// Issue messages in check order.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.message.clone()).collect()
    }

    /// Dominant failure classification, `None` when complete.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.issues.first().map(|i| i.category.failure_kind())
    }

    pub fn has(&self, category: IssueCategory) -> bool {
        self.issues.iter().any(|i| i.category == category)
    }

    /// Line numbers cited by any issue.
    pub fn lines(&self) -> Vec<usize> {
        self.issues.iter().filter_map(|i| i.line).collect()
    }
}

/// Judge whether `content` is a complete, well-formed artifact for `path`.
pub fn validate(content: &str, path: &str) -> ValidationReport {
    let kind = ArtifactKind::from_path(path);
    let trimmed = content.trim();

    if trimmed.chars().count() < kind.min_len() {
        return ValidationReport::from_issues(vec![ValidationIssue::new(
            IssueCategory::Empty,
            "File is empty or too short",
        )]);
    }

    let mut issues = Vec::new();

    if let Some(msg) = truncation::check(kind, content) {
        issues.push(ValidationIssue::new(IssueCategory::Truncation, msg));
    }

    let lexicon = match kind {
        ArtifactKind::Python => Some(Lexicon::Hash),
        ArtifactKind::Script => Some(Lexicon::Slash),
        ArtifactKind::Stylesheet => Some(Lexicon::BlockOnly),
        _ => None,
    };
    let strict = lexicon.map(|lx| balance::scan_strict(content, lx));

    match strict.as_ref().and_then(|s| s.unterminated) {
        Some(open) => issues.push(ValidationIssue::new(IssueCategory::Truncation, open.describe())),
        None if kind == ArtifactKind::Component && truncation::open_block_comment(content) => {
            issues.push(ValidationIssue::new(
                IssueCategory::Truncation,
                "Unterminated block comment at end of file",
            ));
        }
        None => {}
    }

    if let Some(err) = syntax::check(kind, content) {
        issues.push(ValidationIssue {
            category: IssueCategory::Syntax,
            message: err.to_string(),
            line: Some(err.line),
            column: Some(err.column),
        });
        return ValidationReport::from_issues(issues);
    }

    let role = ArtifactRole::classify(path, content);
    issues.extend(
        constructs::missing(role, content)
            .into_iter()
            .map(|m| ValidationIssue::new(IssueCategory::MissingConstruct, m)),
    );

    let unbalanced = match (kind.balance_slack(), strict) {
        (Some(0), Some(scan)) => scan.issues,
        (Some(slack), _) => balance::scan_counts(content, slack),
        (None, _) => Vec::new(),
    };
    issues.extend(
        unbalanced
            .into_iter()
            .map(|m| ValidationIssue::new(IssueCategory::Unbalanced, m)),
    );

    let report = ValidationReport::from_issues(issues);
    if !report.complete {
        tracing::debug!(path, %kind, issues = report.issues.len(), "artifact incomplete");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLASK_APP: &str = r#"from flask import Flask, jsonify, request
from flask_cors import CORS

app = Flask(__name__)
CORS(app)

items = []

@app.route('/items', methods=['GET'])
def list_items():
    return jsonify(items)

@app.route('/add', methods=['POST'])
def add_item():
    data = request.get_json() or {}
    if 'title' not in data:
        return jsonify({"error": "title required"}), 400
    items.append({"title": data['title']})
    return jsonify(items[-1]), 200

if __name__ == '__main__':
    app.run(host='0.0.0.0', port=5000)
"#;

    const APP_JSX: &str = r#"import React, { useState } from 'react';
import './App.css';

function App() {
  const [items, setItems] = useState([]);
  return (
    <div className="app">
      <h1>Items</h1>
      <ul>{items.map((i) => <li key={i}>{i}</li>)}</ul>
    </div>
  );
}

export default App;
"#;

    #[test]
    fn test_complete_flask_app() {
        let report = validate(FLASK_APP, "backend/app.py");
        assert!(report.complete, "{:?}", report.issues);
        assert_eq!(report.failure_kind(), None);
    }

    #[test]
    fn test_flask_app_ending_in_comment() {
        let src = format!("{FLASK_APP}# Run with: python app.py (\n");
        let report = validate(&src, "backend/app.py");
        assert!(report.complete, "{:?}", report.issues);
    }

    #[test]
    fn test_complete_component() {
        let report = validate(APP_JSX, "frontend/src/App.jsx");
        assert!(report.complete, "{:?}", report.issues);
    }

    #[test]
    fn test_empty_short_circuits() {
        let report = validate("   \n  ", "backend/app.py");
        assert!(!report.complete);
        assert_eq!(report.messages(), vec!["File is empty or too short".to_string()]);
    }

    #[test]
    fn test_incomplete_return_component() {
        let truncated = "import React from 'react';\n\nfunction App() {\n  const x = 1;\n  return (\n";
        let report = validate(truncated, "frontend/src/App.jsx");
        assert!(!report.complete);
        assert!(
            report
                .messages()
                .iter()
                .any(|m| m.to_lowercase().contains("incomplete return")),
            "{:?}",
            report.issues
        );
        assert_eq!(report.failure_kind(), Some(FailureKind::GenerationIncomplete));
    }

    #[test]
    fn test_syntax_error_fails_fast_with_position() {
        let broken = FLASK_APP.replace("def list_items():", "def list_items(:");
        let report = validate(&broken, "backend/app.py");
        assert!(report.has(IssueCategory::Syntax));
        assert!(!report.has(IssueCategory::MissingConstruct));
        assert!(!report.lines().is_empty());
        let syntax = report
            .issues
            .iter()
            .find(|i| i.category == IssueCategory::Syntax)
            .unwrap();
        assert!(syntax.message.contains("line"));
        assert!(syntax.message.contains("column"));
    }

    #[test]
    fn test_missing_cors_is_incomplete() {
        let no_cors = FLASK_APP
            .replace("from flask_cors import CORS\n", "")
            .replace("CORS(app)\n", "");
        let report = validate(&no_cors, "backend/app.py");
        assert!(!report.complete);
        assert!(report.messages().contains(&"Missing CORS initialization".to_string()));
    }

    #[test]
    fn test_invalid_json() {
        let report = validate("{\"name\": \"app\", \"version\": }", "frontend/package.json");
        assert!(!report.complete);
        assert_eq!(report.failure_kind(), Some(FailureKind::SyntaxInvalid));
    }

    #[test]
    fn test_validate_is_pure() {
        let a = validate(APP_JSX, "frontend/src/App.jsx");
        let b = validate(APP_JSX, "frontend/src/App.jsx");
        assert_eq!(a, b);
    }

    #[test]
    fn test_text_only_needs_content() {
        assert!(validate("<!doctype html><html></html>", "frontend/index.html").complete);
        assert!(!validate("<p>", "frontend/index.html").complete);
    }
}
