//! Artifact kind and role inference from workspace-relative paths.

use serde::{Deserialize, Serialize};

/// Syntactic family of an artifact, inferred from its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `.py`
    Python,
    /// `.jsx` / `.tsx`: markup embedded in script, heuristically balanced.
    Component,
    /// `.js` / `.mjs` / `.cjs` / `.ts`
    Script,
    /// `.json`
    Json,
    /// `.css`
    Stylesheet,
    /// Anything else (html, txt, md, ...)
    Text,
}

impl ArtifactKind {
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        match lower.rsplit_once('.').map(|(_, ext)| ext) {
            Some("py") => Self::Python,
            Some("jsx") | Some("tsx") => Self::Component,
            Some("js") | Some("mjs") | Some("cjs") | Some("ts") => Self::Script,
            Some("json") => Self::Json,
            Some("css") => Self::Stylesheet,
            _ => Self::Text,
        }
    }

    /// Tolerated bracket imbalance. `None` means no balance scan at all.
    pub fn balance_slack(self) -> Option<usize> {
        match self {
            Self::Component => Some(3),
            Self::Python | Self::Script | Self::Stylesheet => Some(0),
            Self::Json | Self::Text => None,
        }
    }

    /// Minimum count of non-whitespace-trimmed characters for a usable artifact.
    pub(crate) fn min_len(self) -> usize {
        match self {
            Self::Python | Self::Component => 50,
            Self::Script => 20,
            Self::Json => 2,
            Self::Stylesheet | Self::Text => 10,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Component => write!(f, "component"),
            Self::Script => write!(f, "script"),
            Self::Json => write!(f, "json"),
            Self::Stylesheet => write!(f, "stylesheet"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// What an artifact is for, which decides its required constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    /// Flask service entry point (`app.py`).
    FlaskBackend,
    /// Express service entry point (`server.js`, `backend/index.js`).
    ExpressBackend,
    /// Top-level UI component (`App.jsx`, `App.tsx`).
    RootComponent,
    /// Everything else.
    Module,
}

impl ArtifactRole {
    pub fn detect(path: &str) -> Self {
        let name = file_name(path);
        match ArtifactKind::from_path(path) {
            ArtifactKind::Python if name == "app.py" => Self::FlaskBackend,
            ArtifactKind::Script
                if name == "server.js" || (is_backend_path(path) && name == "index.js") =>
            {
                Self::ExpressBackend
            }
            ArtifactKind::Component if name.starts_with("App.") => Self::RootComponent,
            _ => Self::Module,
        }
    }

    /// Like [`detect`](Self::detect), but also recognizes service entry points
    /// by their content when the filename is unconventional.
    pub fn classify(path: &str, content: &str) -> Self {
        match (Self::detect(path), ArtifactKind::from_path(path)) {
            (Self::Module, ArtifactKind::Python) if content.contains("Flask(") => {
                Self::FlaskBackend
            }
            (Self::Module, ArtifactKind::Script)
                if content.contains("require('express')")
                    || content.contains("require(\"express\")")
                    || content.contains("from 'express'")
                    || content.contains("from \"express\"") =>
            {
                Self::ExpressBackend
            }
            (role, _) => role,
        }
    }

    pub fn is_backend_entry(self) -> bool {
        matches!(self, Self::FlaskBackend | Self::ExpressBackend)
    }
}

/// Last path segment.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn is_backend_path(path: &str) -> bool {
    path.starts_with("backend/") || path.starts_with("backend\\")
}

/// First entry of `plan` that is a backend service entry point.
pub fn backend_entry<S: AsRef<str>>(plan: &[S]) -> Option<&str> {
    plan.iter()
        .map(AsRef::as_ref)
        .find(|p| ArtifactRole::detect(p).is_backend_entry())
}
