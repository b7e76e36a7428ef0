//! Generate → verify → repair pipeline.
//!
//! [`orchestrator::Orchestrator`] is the entry point. The model is reached
//! only through [`generation::TextGenerator`] and the backend only through
//! [`harness::VerificationHarness`], so both can be replaced in tests.

pub mod agents;
pub mod config;
pub mod file_generator;
pub mod generation;
pub mod harness;
pub mod orchestrator;
pub mod prompts;
pub mod repair;
pub mod state;
pub mod state_machine;
pub mod telemetry;

pub use config::ForgeConfig;
pub use orchestrator::{Orchestrator, RunOutcome, StatusSnapshot};
