//! Prompt text for each generation role.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes.
//! The version is written into the run report so a given artifact set can be
//! traced back to the prompts that produced it.

use coordination::ArtifactRole;

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.2.0";

pub const STRATEGIST_PREAMBLE: &str = "\
You are a senior software product strategist. Analyze the user's idea and define \
what needs to be built.

Return a JSON object with exactly these keys:
- project_goal: one sentence describing what the app does
- target_users: who will use it
- core_features: 3-6 specific features (think create, read, update, delete; listing; user interactions)
- technical_constraints: technical requirements or limits (may be empty)

Example for \"todo app\": core_features = [\"Add new task with title\", \"View list of all tasks\", \
\"Mark task as complete\", \"Delete task\"]

Respond with valid JSON only. No explanations, no markdown fences.";

pub const ARCHITECT_PREAMBLE: &str = "\
You are a senior software architect. Design an MVP architecture for the given project scope.

Return a JSON object with exactly these keys:
- backend: backend framework (\"flask\" or \"express\")
- frontend: frontend framework (\"react\" or \"vanilla\")
- services: list of {\"name\", \"framework\", \"port\"} (ports 1024-65535)
- use_docker: boolean

Prefer flask + react unless the scope clearly needs otherwise.
Respond with valid JSON only. No explanations, no markdown fences.";

pub const CODER_PREAMBLE: &str = "\
You are an expert full-stack developer. You write one complete source file at a time.

Rules:
- Output ONLY the file content. No markdown fences, no commentary.
- The file must be COMPLETE: every bracket closed, every function finished.
- Never abbreviate with '...' or placeholder comments.";

pub const REPAIR_PREAMBLE: &str = "\
You repair broken source files. You receive the current content of one file and a \
structured failure report.

Rules:
- Output the COMPLETE corrected file. Not a diff, not a fragment.
- Fix exactly what the report describes; keep working routes and behaviour unchanged.
- No markdown fences, no commentary.";

/// Extra emphasis for attempts after the first.
pub fn retry_emphasis(attempt: u32, closing: &str) -> String {
    if attempt == 0 {
        return String::new();
    }
    format!(
        "CRITICAL: Previous attempt was INCOMPLETE (attempt {attempt}).\n\
         - The code MUST be 100% complete\n\
         - Do NOT stop mid-function or mid-markup\n\
         - Close ALL brackets and parentheses\n\
         - VERIFY the file ends with {closing} before finishing\n\n"
    )
}

pub fn strategist_prompt(request: &str) -> String {
    format!("User idea:\n{request}")
}

pub fn architect_prompt(scope_json: &str) -> String {
    format!("Project scope:\n{scope_json}")
}

/// What a per-file prompt needs to know about the project.
#[derive(Debug, Clone, Copy)]
pub struct FilePromptContext<'a> {
    pub project_goal: &'a str,
    pub features: &'a [String],
    /// `METHOD /path` lines extracted from the backend, if already generated.
    pub routes: &'a [String],
    pub backend_url: &'a str,
    pub backend_port: u16,
}

fn feature_list(features: &[String]) -> String {
    if features.is_empty() {
        return "- (none specified)".to_string();
    }
    features
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn flask_requirements(port: u16) -> String {
    format!(
        "STRICT REQUIREMENTS:
1. Start with:
   from flask import Flask, request, jsonify
   from flask_cors import CORS
2. Initialize:
   app = Flask(__name__)
   CORS(app)
3. Use in-memory storage at module level (e.g. items = []).
4. Create REST routes for EACH feature with simple paths like /items, /add, /delete/<int:item_id> (not /api/...).
5. Add @app.route('/') returning API info and @app.route('/health') returning {{\"status\": \"ok\"}}.
6. Read bodies safely: data = request.get_json() or {{}}. Return jsonify() responses with status 200 on success.
7. End with:
   if __name__ == '__main__':
       app.run(host='0.0.0.0', port={port}, debug=False)
Start directly with 'from flask import'."
    )
}

fn express_requirements(port: u16) -> String {
    format!(
        "STRICT REQUIREMENTS:
1. const express = require('express'); const cors = require('cors');
2. const app = express(); app.use(cors()); app.use(express.json());
3. Use in-memory storage (e.g. let items = []).
4. Create REST routes for EACH feature with simple paths like /items, /add, /delete/:id.
5. Add app.get('/') with API info and app.get('/health') returning {{ status: 'ok' }}.
6. Respond with res.json(...) and status 200 on success.
7. End with app.listen(process.env.PORT || {port}, ...)."
    )
}

/// Prompt for generating `path` from scratch.
pub fn file_prompt(path: &str, ctx: &FilePromptContext<'_>, attempt: u32) -> String {
    let features = feature_list(ctx.features);
    let header = format!(
        "PROJECT: {}\nFEATURES:\n{}\nFILE: {}\n\n",
        ctx.project_goal, features, path
    );

    let (closing, body) = match ArtifactRole::detect(path) {
        ArtifactRole::FlaskBackend => (
            "app.run(...)",
            format!(
                "Generate a COMPLETE, WORKING Flask backend API.\n\n{}",
                flask_requirements(ctx.backend_port)
            ),
        ),
        ArtifactRole::ExpressBackend => (
            "app.listen(...)",
            format!(
                "Generate a COMPLETE, WORKING Express backend API.\n\n{}",
                express_requirements(ctx.backend_port)
            ),
        ),
        ArtifactRole::RootComponent => {
            let routes = if ctx.routes.is_empty() {
                "(none extracted yet)".to_string()
            } else {
                ctx.routes.join("\n")
            };
            (
                "'export default App;'",
                format!(
                    "Generate a COMPLETE React App component.

BACKEND URL: {url}
BACKEND API ROUTES:
{routes}

REQUIREMENTS:
1. import React, {{ useState, useEffect }} from 'react'; import axios from 'axios';
2. function App() {{ ... }} with useState for form inputs, the item list, and messages.
3. Call ONLY the routes listed above via axios against {url}; wrap calls in try/catch.
4. Forms and buttons for each feature, a list view, success/error messages, clean inline styles.
5. End with: export default App;
Start with 'import React'.",
                    url = ctx.backend_url
                ),
            )
        }
        ArtifactRole::Module => (
            "a complete final statement",
            format!(
                "Generate the complete content of {path} for this project. \
                 It must work together with a backend at {}.",
                ctx.backend_url
            ),
        ),
    };

    format!("{}{}{}", retry_emphasis(attempt, closing), header, body)
}

/// Prompt for repairing `path` given its current content and a rendered failure report.
pub fn repair_prompt(path: &str, current: &str, report: &str, attempt: u32) -> String {
    let closing = match ArtifactRole::detect(path) {
        ArtifactRole::FlaskBackend => "app.run(...)",
        ArtifactRole::ExpressBackend => "app.listen(...)",
        ArtifactRole::RootComponent => "'export default App;'",
        ArtifactRole::Module => "a complete final statement",
    };
    format!(
        "{}FILE: {path}\n\nFAILURE REPORT:\n{report}\nCURRENT CODE:\n{current}\n\n\
         TASK: Output the COMPLETE, WORKING version of {path}. Regenerate the whole file; \
         do not just append a few lines.",
        retry_emphasis(attempt, closing)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(features: &'a [String], routes: &'a [String]) -> FilePromptContext<'a> {
        FilePromptContext {
            project_goal: "Todo app",
            features,
            routes,
            backend_url: "http://localhost:5000",
            backend_port: 5000,
        }
    }

    #[test]
    fn test_first_attempt_has_no_emphasis() {
        let p = file_prompt("backend/app.py", &ctx(&[], &[]), 0);
        assert!(!p.contains("CRITICAL"));
        assert!(p.contains("CORS(app)"));
        assert!(p.contains("port=5000"));
    }

    #[test]
    fn test_retry_strengthens_prompt() {
        let p = file_prompt("frontend/src/App.jsx", &ctx(&[], &[]), 2);
        assert!(p.starts_with("CRITICAL: Previous attempt was INCOMPLETE"));
        assert!(p.contains("export default App;"));
    }

    #[test]
    fn test_component_prompt_lists_routes() {
        let routes = vec!["GET /items".to_string(), "POST /add".to_string()];
        let features = vec!["Add task".to_string()];
        let p = file_prompt("frontend/src/App.jsx", &ctx(&features, &routes), 0);
        assert!(p.contains("GET /items\nPOST /add"));
        assert!(p.contains("- Add task"));
    }

    #[test]
    fn test_repair_prompt_carries_report_and_code() {
        let p = repair_prompt("backend/app.py", "print(1)", "Failure: contract_mismatch", 0);
        assert!(p.contains("FAILURE REPORT:\nFailure: contract_mismatch"));
        assert!(p.contains("CURRENT CODE:\nprint(1)"));
    }
}
