//! File Generator: produce or repair one artifact with bounded local retry.
//!
//! Order of precedence for a path:
//! 1. in `failed_history` → fallback artifact, no model call
//! 2. scaffold (package.json, index.html, ...) → template, no model call
//! 3. model, up to `max_attempts` invocations, each normalized,
//!    post-processed and validated

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use coordination::fallback::{self, TemplateContext};
use coordination::validator::{self, ArtifactRole, IssueCategory, ValidationReport};
use coordination::{FailureKind, FailureReport, PatternExtractor, RouteExtractor};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agents::architect::FrontendStack;
use crate::generation::{GenerationError, GenerationRequest, Role, TextGenerator};
use crate::prompts::{self, FilePromptContext};
use crate::state::ProjectState;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+-]*[ \t]*\r?\n(.*?)\r?\n?```").unwrap());

static APP_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bapp\.run\s*\(").unwrap());

/// Where an artifact's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    Model,
    Template,
    Fallback,
}

/// Result of one `generate_with_retry` / `repair_with_retry` call.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: String,
    pub content: String,
    /// Model invocations spent.
    pub attempts: u32,
    /// Validator issues of the returned content; empty when valid.
    pub issues: Vec<String>,
    pub kind: Option<FailureKind>,
    pub source: ArtifactSource,
    /// Every attempt failed; `content` is the last (invalid) output.
    pub exhausted: bool,
}

impl FileOutcome {
    fn settled(path: &str, content: String, source: ArtifactSource) -> Self {
        Self {
            path: path.to_string(),
            content,
            attempts: 0,
            issues: Vec::new(),
            kind: None,
            source,
            exhausted: false,
        }
    }
}

/// What a generation pass knows about the project.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub project_goal: String,
    pub features: Vec<String>,
    /// `METHOD /path` for every route the backend currently declares.
    pub routes: Vec<String>,
    pub backend_url: String,
    pub template: TemplateContext,
    pub failed_history: BTreeSet<String>,
}

impl GenerationContext {
    pub fn from_state(state: &ProjectState, backend_url: &str, backend_port: u16) -> Self {
        let react = state
            .architecture
            .as_ref()
            .map_or(true, |a| a.frontend_stack() == FrontendStack::React);
        let features = state
            .scope
            .as_ref()
            .map(|s| s.core_features.clone())
            .unwrap_or_default();

        let mut ctx = Self {
            project_goal: state.project_goal().to_string(),
            features,
            routes: Vec::new(),
            backend_url: backend_url.to_string(),
            template: TemplateContext {
                project_goal: state.project_goal().to_string(),
                backend_port,
                react,
            },
            failed_history: state.failed_history.clone(),
        };
        if let Some(entry) = validator::backend_entry(&state.file_plan) {
            if let Some(source) = state.files.get(entry) {
                ctx.refresh_routes(source);
            }
        }
        ctx
    }

    /// Re-read the backend's declared routes, e.g. right after it was generated.
    pub fn refresh_routes(&mut self, backend_source: &str) {
        self.routes = PatternExtractor
            .routes(backend_source)
            .into_iter()
            .map(|r| format!("{} {}", r.method, r.raw_path))
            .collect();
    }

    fn prompt_context(&self) -> FilePromptContext<'_> {
        FilePromptContext {
            project_goal: &self.project_goal,
            features: &self.features,
            routes: &self.routes,
            backend_url: &self.backend_url,
            backend_port: self.template.backend_port,
        }
    }
}

/// Strip markdown fences and surrounding whitespace from a model reply.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = match FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => {
            let mut lines: Vec<&str> = trimmed.lines().collect();
            if lines.first().is_some_and(|l| l.trim_start().starts_with("```")) {
                lines.remove(0);
            }
            if lines.last().is_some_and(|l| l.trim() == "```") {
                lines.pop();
            }
            return finish(&lines.join("\n"));
        }
    };
    finish(body)
}

fn finish(text: &str) -> String {
    let mut out = text.trim_matches('\n').trim_end().to_string();
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Deterministic fixes for the most common omissions, applied before validation.
///
/// Truncated output is returned unchanged so the validator still sees it.
pub fn post_process(path: &str, content: &str, port: u16) -> String {
    if validator::validate(content, path).has(IssueCategory::Truncation) {
        return content.to_string();
    }
    match ArtifactRole::classify(path, content) {
        ArtifactRole::FlaskBackend => fix_flask(content, port),
        ArtifactRole::ExpressBackend => fix_express(content),
        ArtifactRole::RootComponent => fix_component(content),
        ArtifactRole::Module => content.to_string(),
    }
}

fn fix_flask(code: &str, port: u16) -> String {
    let mut lines: Vec<String> = code.lines().map(String::from).collect();

    if !code.contains("flask_cors") {
        if let Some(i) = lines
            .iter()
            .position(|l| l.starts_with("from flask import") || l.starts_with("import flask"))
        {
            lines.insert(i + 1, "from flask_cors import CORS".to_string());
        }
    }
    if !code.contains("CORS(app") {
        if let Some(i) = lines.iter().position(|l| l.contains("app = Flask(")) {
            lines.insert(i + 1, "CORS(app)".to_string());
        }
    }

    let mut out = lines.join("\n");
    if !APP_RUN.is_match(&out) {
        out.push_str(&format!(
            "\n\nif __name__ == '__main__':\n    app.run(host='0.0.0.0', port={port}, debug=False)"
        ));
    }
    out = out.replace("request.get_json().get(", "(request.get_json() or {}).get(");
    finish(&out)
}

fn fix_express(code: &str) -> String {
    if code.contains("cors(") {
        return code.to_string();
    }
    let mut lines: Vec<String> = code.lines().map(String::from).collect();
    if let Some(i) = lines.iter().position(|l| l.contains("express()")) {
        lines.insert(i + 1, "app.use(cors());".to_string());
        if !code.contains("require('cors')") && !code.contains("require(\"cors\")") {
            lines.insert(0, "const cors = require('cors');".to_string());
        }
    }
    finish(&lines.join("\n"))
}

fn fix_component(code: &str) -> String {
    let mut out = code.to_string();
    if !out.contains("import React") {
        out = format!("import React, {{ useState, useEffect }} from 'react';\n{out}");
    }
    if out.contains("axios") && !out.contains("import axios") {
        let mut lines: Vec<String> = out.lines().map(String::from).collect();
        if let Some(i) = lines.iter().position(|l| l.starts_with("import React")) {
            lines.insert(i + 1, "import axios from 'axios';".to_string());
        }
        out = lines.join("\n");
    }
    if !out.contains("export default") {
        out = format!("{}\n\nexport default App;", out.trim_end());
    }
    finish(&out)
}

/// Which prompt a generation attempt is built from.
#[derive(Debug, Clone, Copy)]
pub enum Pass<'a> {
    /// First-time generation from the project context.
    Fresh,
    /// Targeted repair of existing content against a rendered failure report.
    Repair { current: &'a str, report: &'a str },
}

impl Pass<'_> {
    fn role(&self) -> Role {
        match self {
            Self::Fresh => Role::Coder,
            Self::Repair { .. } => Role::Repair,
        }
    }

    fn request(&self, path: &str, ctx: &GenerationContext, attempt: u32) -> GenerationRequest {
        match self {
            Self::Fresh => GenerationRequest::new(
                Role::Coder,
                prompts::CODER_PREAMBLE,
                prompts::file_prompt(path, &ctx.prompt_context(), attempt),
            ),
            Self::Repair { current, report } => GenerationRequest::new(
                Role::Repair,
                prompts::REPAIR_PREAMBLE,
                prompts::repair_prompt(path, current, report, attempt),
            ),
        }
    }
}

pub struct FileGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl FileGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// One model call for `path`, normalized and post-processed.
    pub async fn generate(
        &self,
        path: &str,
        ctx: &GenerationContext,
        pass: Pass<'_>,
        attempt: u32,
    ) -> Result<String, GenerationError> {
        let request = pass.request(path, ctx, attempt);
        let raw = self.generator.invoke(&request).await?;
        Ok(post_process(path, &normalize(&raw), ctx.template.backend_port))
    }

    pub async fn generate_with_retry(
        &self,
        path: &str,
        ctx: &GenerationContext,
        max_attempts: u32,
    ) -> FileOutcome {
        if ctx.failed_history.contains(path) {
            warn!(
                path,
                fallback = true,
                "Path failed in an earlier cycle, substituting fallback"
            );
            return FileOutcome::settled(
                path,
                fallback::fallback(path, &ctx.template),
                ArtifactSource::Fallback,
            );
        }
        if let Some(text) = fallback::scaffold(path, &ctx.template) {
            debug!(path, "Template artifact");
            return FileOutcome::settled(path, text, ArtifactSource::Template);
        }

        self.retry_loop(path, ctx, Pass::Fresh, max_attempts).await
    }

    /// Regenerate `path` from its current content and a failure report.
    pub async fn repair_with_retry(
        &self,
        path: &str,
        current: &str,
        report: &FailureReport,
        ctx: &GenerationContext,
        max_attempts: u32,
    ) -> FileOutcome {
        let rendered = report.render();
        let pass = Pass::Repair {
            current,
            report: &rendered,
        };
        self.retry_loop(path, ctx, pass, max_attempts).await
    }

    async fn retry_loop(
        &self,
        path: &str,
        ctx: &GenerationContext,
        pass: Pass<'_>,
        max_attempts: u32,
    ) -> FileOutcome {
        let role = pass.role();
        let mut outcome = FileOutcome {
            path: path.to_string(),
            content: String::new(),
            attempts: 0,
            issues: vec!["No generation attempt produced content".to_string()],
            kind: Some(FailureKind::GenerationIncomplete),
            source: ArtifactSource::Model,
            exhausted: true,
        };

        for attempt in 0..max_attempts {
            outcome.attempts = attempt + 1;

            let content = match self.generate(path, ctx, pass, attempt).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path, attempt = attempt + 1, role = %role, error = %e, "Generation attempt failed");
                    outcome.issues = vec![format!("Generation failed: {e}")];
                    outcome.kind = Some(FailureKind::GenerationIncomplete);
                    continue;
                }
            };

            let report: ValidationReport = validator::validate(&content, path);
            outcome.content = content;

            if report.complete {
                info!(path, attempt = attempt + 1, role = %role, "Artifact valid");
                outcome.issues.clear();
                outcome.kind = None;
                outcome.exhausted = false;
                return outcome;
            }

            warn!(
                path,
                attempt = attempt + 1,
                issues = ?report.messages().iter().take(2).collect::<Vec<_>>(),
                "Artifact invalid"
            );
            outcome.kind = report.failure_kind();
            outcome.issues = report.messages();
        }

        warn!(path, attempts = outcome.attempts, "Local retries exhausted");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fenced() {
        assert_eq!(normalize("```python\nprint(1)\n```"), "print(1)\n");
        assert_eq!(
            normalize("Here is the file:\n```jsx\nconst a = 1;\n```\nEnjoy!"),
            "const a = 1;\n"
        );
    }

    #[test]
    fn test_normalize_unclosed_fence() {
        assert_eq!(normalize("```js\nconst a = 1;"), "const a = 1;\n");
        assert_eq!(normalize("  plain\n"), "plain\n");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_flask_cors_inserted_without_touching_routes() {
        let code = "from flask import Flask, jsonify\napp = Flask(__name__)\n\n@app.route('/items')\ndef items():\n    return jsonify([])\n\nif __name__ == '__main__':\n    app.run(port=5000)\n";
        let fixed = post_process("backend/app.py", code, 5000);
        assert!(fixed.contains("from flask import Flask, jsonify\nfrom flask_cors import CORS\n"));
        assert!(fixed.contains("app = Flask(__name__)\nCORS(app)\n"));
        assert!(fixed.contains("@app.route('/items')\ndef items():\n    return jsonify([])"));
        assert_eq!(fixed.matches("app.run(").count(), 1);
    }

    #[test]
    fn test_flask_guard_appended_and_get_json_made_safe() {
        let code = "from flask import Flask, request\nfrom flask_cors import CORS\napp = Flask(__name__)\nCORS(app)\nx = request.get_json().get('a')\n";
        let fixed = post_process("backend/app.py", code, 8001);
        assert!(fixed.contains("(request.get_json() or {}).get('a')"));
        assert!(fixed.trim_end().ends_with("app.run(host='0.0.0.0', port=8001, debug=False)"));
    }

    #[test]
    fn test_component_fixes() {
        let code = "function App() {\n  axios.get('/items');\n  return <div/>;\n}\n";
        let fixed = post_process("frontend/src/App.jsx", code, 5000);
        assert!(fixed.starts_with("import React, { useState, useEffect } from 'react';\nimport axios from 'axios';\n"));
        assert!(fixed.trim_end().ends_with("export default App;"));
    }

    #[test]
    fn test_express_cors_inserted() {
        let code = "const express = require('express');\nconst app = express();\napp.get('/', (req, res) => res.json({}));\napp.listen(5000);\n";
        let fixed = post_process("backend/server.js", code, 5000);
        assert!(fixed.starts_with("const cors = require('cors');"));
        assert!(fixed.contains("const app = express();\napp.use(cors());"));
    }

    #[test]
    fn test_truncated_component_left_visible() {
        let code = "import React from 'react';\nfunction App() {\n  return (\n";
        assert_eq!(post_process("frontend/src/App.jsx", code, 5000), code);
    }

    #[test]
    fn test_modules_untouched() {
        assert_eq!(post_process("frontend/src/util.js", "export const a = 1;\n", 5000), "export const a = 1;\n");
    }
}
