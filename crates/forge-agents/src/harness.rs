//! Verification harness: boot the backend-under-test and run its contract.

use std::path::Path;

use async_trait::async_trait;
use coordination::{
    read_contract, ContractVerifier, CoordinationResult, ProcessSupervisor, SupervisorConfig,
    VerificationResult, VerifierConfig,
};
use tracing::{info, warn};

/// Result of one Verify stage.
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessOutcome {
    /// The backend booted and the contract ran.
    Verified(VerificationResult),
    /// The backend exited before the readiness window elapsed.
    BootFailed(String),
}

impl HarnessOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Verified(r) if r.passed)
    }

    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::Verified(r) => r.diagnostic(),
            Self::BootFailed(d) => Some(d.clone()),
        }
    }
}

#[async_trait]
pub trait VerificationHarness: Send {
    /// Verify the artifacts already written under `workspace`.
    async fn verify(&mut self, workspace: &Path) -> HarnessOutcome;

    /// Release any process left running.
    async fn shutdown(&mut self) {}
}

/// Process Supervisor + Contract Verifier against the real backend.
pub struct LiveHarness {
    supervisor: ProcessSupervisor,
    verifier: ContractVerifier,
}

impl LiveHarness {
    pub fn new(supervisor: SupervisorConfig, verifier: VerifierConfig) -> CoordinationResult<Self> {
        Ok(Self {
            supervisor: ProcessSupervisor::new(supervisor),
            verifier: ContractVerifier::new(verifier)?,
        })
    }
}

#[async_trait]
impl VerificationHarness for LiveHarness {
    async fn verify(&mut self, workspace: &Path) -> HarnessOutcome {
        let backend_dir = ProcessSupervisor::backend_dir(workspace);
        if let Err(failure) = self.supervisor.start(&backend_dir).await {
            warn!(error = %failure, "Backend failed to boot");
            return HarnessOutcome::BootFailed(failure.diagnostic());
        }

        let result = match read_contract(workspace) {
            Ok(contract) => {
                info!(endpoints = contract.endpoints.len(), "Running contract");
                self.verifier.verify(&contract).await
            }
            Err(e) => VerificationResult::failure(format!("contract unreadable: {e}")),
        };

        self.supervisor.stop().await;
        HarnessOutcome::Verified(result)
    }

    async fn shutdown(&mut self) {
        self.supervisor.stop().await;
    }
}
