//! Machine-checkable description of a backend's HTTP surface.
//!
//! The contract is derived from source by [`extractor`], persisted to
//! `backend/contract.json` after every write stage and read back verbatim
//! by the verification stage.

pub mod extractor;
pub mod synth;
pub mod verifier;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoordinationError, CoordinationResult};

/// Workspace-relative location of the persisted contract.
pub const CONTRACT_FILE: &str = "backend/contract.json";

/// Methods that carry a JSON request body.
pub const BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

pub fn carries_body(method: &str) -> bool {
    BODY_METHODS.iter().any(|m| m.eq_ignore_ascii_case(method))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub base_url: String,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Upper-case HTTP method.
    pub method: String,
    /// Normalized path, parameters replaced by `1`.
    pub path: String,
    /// Expected status code.
    pub expect: u16,
    /// Synthesized request body for body-carrying methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Endpoint {
    /// `METHOD /path`
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

impl Contract {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoints: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn find(&self, method: &str, path: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.method.eq_ignore_ascii_case(method) && e.path == path)
    }
}

/// Serialize `contract` to `<workspace>/backend/contract.json`.
pub fn write_contract(workspace: &Path, contract: &Contract) -> CoordinationResult<PathBuf> {
    let path = workspace.join(CONTRACT_FILE);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CoordinationError::io(parent, e))?;
    }
    let mut json = serde_json::to_string_pretty(contract)?;
    json.push('\n');
    std::fs::write(&path, json).map_err(|e| CoordinationError::io(&path, e))?;
    tracing::debug!(path = %path.display(), endpoints = contract.endpoints.len(), "contract written");
    Ok(path)
}

/// Load the contract persisted under `workspace`.
pub fn read_contract(workspace: &Path) -> CoordinationResult<Contract> {
    let path = workspace.join(CONTRACT_FILE);
    let text = std::fs::read_to_string(&path).map_err(|e| CoordinationError::io(&path, e))?;
    serde_json::from_str(&text).map_err(|source| CoordinationError::ContractParse { path, source })
}
