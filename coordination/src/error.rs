//! Failure taxonomy and infrastructure errors.
//!
//! `FailureKind` classifies *pipeline* failures, the things the repair loop
//! reacts to. `CoordinationError` covers genuine infrastructure faults
//! (filesystem, process spawn, malformed contract file) that callers
//! propagate with `?`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a pipeline failure.
///
/// | Kind                   | Recovered by               | Priority |
/// |------------------------|----------------------------|----------|
/// | GenerationIncomplete   | local retry                | 2        |
/// | SyntaxInvalid          | local retry, then fallback | 2        |
/// | ContractMismatch       | targeted repair            | 1        |
/// | ServerBootFailure      | targeted repair            | 3        |
/// | RepairExhausted        | forced fallback            | —        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Truncated output or a missing required construct.
    GenerationIncomplete,
    /// The artifact does not parse.
    SyntaxInvalid,
    /// A declared route is unreachable or answered with a non-2xx status.
    ContractMismatch,
    /// The backend process exited before the readiness window elapsed.
    ServerBootFailure,
    /// The global repair budget is consumed.
    RepairExhausted,
}

impl FailureKind {
    /// Whether a per-file regeneration can fix this without a repair cycle.
    pub fn is_locally_recoverable(self) -> bool {
        matches!(self, Self::GenerationIncomplete | Self::SyntaxInvalid)
    }

    /// Ordering weight for repair targets; higher goes first.
    pub fn repair_priority(self) -> u8 {
        match self {
            Self::ServerBootFailure => 3,
            Self::GenerationIncomplete | Self::SyntaxInvalid => 2,
            Self::ContractMismatch => 1,
            Self::RepairExhausted => 0,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GenerationIncomplete => write!(f, "generation_incomplete"),
            Self::SyntaxInvalid => write!(f, "syntax_invalid"),
            Self::ContractMismatch => write!(f, "contract_mismatch"),
            Self::ServerBootFailure => write!(f, "server_boot_failure"),
            Self::RepairExhausted => write!(f, "repair_exhausted"),
        }
    }
}

/// Result alias for coordination operations.
pub type CoordinationResult<T> = Result<T, CoordinationError>;

/// Infrastructure errors raised by the deterministic layer.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact path `{path}` is invalid: {reason}")]
    InvalidArtifactPath { path: String, reason: String },

    #[error("contract file {path} is malformed: {source}")]
    ContractParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize contract: {0}")]
    ContractSerialize(#[from] serde_json::Error),

    #[error("backend directory not found: {0}")]
    BackendDirMissing(PathBuf),

    #[error("no launchable entry point in {0}")]
    NoEntryPoint(PathBuf),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl CoordinationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
