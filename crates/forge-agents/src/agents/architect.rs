use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{parse_reply, ProjectScope};
use crate::generation::{GenerationRequest, Role, TextGenerator};
use crate::prompts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub framework: String,
    pub port: u16,
}

/// Stack decisions for the generated project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Architecture {
    pub backend: String,
    pub frontend: String,
    pub services: Vec<Service>,
    pub use_docker: bool,
}

impl Default for Architecture {
    fn default() -> Self {
        Self {
            backend: "flask".to_string(),
            frontend: "react".to_string(),
            services: vec![
                Service {
                    name: "backend".to_string(),
                    framework: "flask".to_string(),
                    port: 5000,
                },
                Service {
                    name: "frontend".to_string(),
                    framework: "react".to_string(),
                    port: 5173,
                },
            ],
            use_docker: false,
        }
    }
}

/// Backend family the file plan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStack {
    Flask,
    Express,
}

/// Frontend family the file plan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendStack {
    React,
    Vanilla,
}

impl Architecture {
    /// Flask is the default; FastAPI and unknown Python stacks also map here.
    pub fn backend_stack(&self) -> BackendStack {
        let b = self.backend.to_lowercase();
        if b.contains("express") || b.contains("node") {
            BackendStack::Express
        } else {
            BackendStack::Flask
        }
    }

    /// React is the default; Vue and other SPA frameworks map here.
    pub fn frontend_stack(&self) -> FrontendStack {
        let f = self.frontend.to_lowercase();
        if f.contains("vanilla") || f.contains("html") {
            FrontendStack::Vanilla
        } else {
            FrontendStack::React
        }
    }
}

/// Ordered file plan: backend entry first, so its routes are known before
/// the frontend is generated.
pub fn file_plan(architecture: &Architecture) -> Vec<String> {
    let mut plan: Vec<&str> = match architecture.backend_stack() {
        BackendStack::Flask => vec!["backend/app.py", "backend/requirements.txt"],
        BackendStack::Express => vec!["backend/server.js", "backend/package.json"],
    };
    match architecture.frontend_stack() {
        FrontendStack::React => plan.extend([
            "frontend/package.json",
            "frontend/index.html",
            "frontend/vite.config.js",
            "frontend/src/main.jsx",
            "frontend/src/App.jsx",
            "frontend/src/App.css",
        ]),
        FrontendStack::Vanilla => plan.extend([
            "frontend/index.html",
            "frontend/style.css",
            "frontend/script.js",
        ]),
    }
    plan.into_iter().map(String::from).collect()
}

/// Design the stack. Never fails; an unusable reply yields the default Flask + React.
pub async fn design(generator: &dyn TextGenerator, scope: &ProjectScope) -> Architecture {
    let scope_json = serde_json::to_string_pretty(scope).unwrap_or_default();
    let req = GenerationRequest::new(
        Role::Architect,
        prompts::ARCHITECT_PREAMBLE,
        prompts::architect_prompt(&scope_json),
    );

    let architecture = match generator.invoke(&req).await {
        Ok(raw) => parse_reply::<Architecture>(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Architect reply unparseable, using default stack");
            Architecture::default()
        }),
        Err(e) => {
            warn!(error = %e, "Architect invocation failed, using default stack");
            Architecture::default()
        }
    };

    info!(
        backend = %architecture.backend,
        frontend = %architecture.frontend,
        "Architecture designed"
    );
    architecture
}
