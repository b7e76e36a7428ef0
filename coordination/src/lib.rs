//! Deterministic coordination layer for the generate→verify→repair loop.
//!
//! Nothing in this crate talks to a model. It covers:
//! - artifact validation (`validator`)
//! - contract extraction, persistence and live verification (`contract`)
//! - backend process supervision (`supervisor`)
//! - failure reports for targeted repair (`feedback`)
//! - scaffold templates and guaranteed-valid fallbacks (`fallback`)
//! - run directories and artifact writes (`workspace`)

pub mod contract;
pub mod error;
pub mod fallback;
pub mod feedback;
pub mod supervisor;
pub mod validator;
pub mod workspace;

pub use contract::extractor::{PatternExtractor, RouteDeclaration, RouteExtractor};
pub use contract::verifier::{ContractVerifier, EndpointResult, VerificationResult, VerifierConfig};
pub use contract::{read_contract, write_contract, Contract, Endpoint, CONTRACT_FILE};
pub use error::{CoordinationError, CoordinationResult, FailureKind};
pub use fallback::TemplateContext;
pub use feedback::FailureReport;
pub use supervisor::{BootFailure, ProcessSupervisor, SupervisorConfig};
pub use validator::{validate, ArtifactKind, ArtifactRole, ValidationReport};
pub use workspace::ArtifactPath;
