//! Text-generation capability.
//!
//! The pipeline only sees [`TextGenerator`]: prompt in, text out. The
//! production implementation routes each role to an OpenAI-compatible
//! endpoint through rig; tests substitute scripted generators.

use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Endpoint, ForgeConfig};

/// Who is asking. Decides endpoint routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Strategist,
    Architect,
    Coder,
    Repair,
}

impl Role {
    pub fn uses_reasoning_endpoint(self) -> bool {
        matches!(self, Self::Strategist | Self::Architect)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strategist => write!(f, "strategist"),
            Self::Architect => write!(f, "architect"),
            Self::Coder => write!(f, "coder"),
            Self::Repair => write!(f, "repair"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub role: Role,
    /// System preamble.
    pub system: String,
    /// User prompt.
    pub user: String,
}

impl GenerationRequest {
    pub fn new(role: Role, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            role,
            system: system.into(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation backend error: {0}")]
    Backend(String),

    #[error("failed to build completion client for {url}: {reason}")]
    Client { url: String, reason: String },
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

struct RoutedClient {
    client: openai::CompletionsClient,
    endpoint: Endpoint,
}

impl RoutedClient {
    fn build(endpoint: &Endpoint) -> Result<Self, GenerationError> {
        let client = openai::CompletionsClient::builder()
            .api_key(&endpoint.api_key)
            .base_url(&endpoint.url)
            .build()
            .map_err(|e| GenerationError::Client {
                url: endpoint.url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.clone(),
        })
    }
}

/// rig-backed generator with per-role routing (strategist/architect →
/// reasoning endpoint, coder/repair → coder endpoint).
pub struct RigGenerator {
    reasoning: RoutedClient,
    coder: RoutedClient,
}

impl RigGenerator {
    pub fn from_config(config: &ForgeConfig) -> Result<Self, GenerationError> {
        Ok(Self {
            reasoning: RoutedClient::build(&config.reasoning_endpoint)?,
            coder: RoutedClient::build(&config.coder_endpoint)?,
        })
    }
}

#[async_trait]
impl TextGenerator for RigGenerator {
    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let routed = if request.role.uses_reasoning_endpoint() {
            &self.reasoning
        } else {
            &self.coder
        };
        let endpoint = &routed.endpoint;

        let agent = routed
            .client
            .agent(&endpoint.model)
            .name(&request.role.to_string())
            .preamble(&request.system)
            .temperature(endpoint.temperature)
            .max_tokens(endpoint.max_tokens)
            .build();

        tracing::debug!(
            role = %request.role,
            model = %endpoint.model,
            prompt_chars = request.user.len(),
            "invoking model"
        );

        match tokio::time::timeout(endpoint.timeout(), agent.prompt(request.user.as_str())).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(GenerationError::Backend(e.to_string())),
            Err(_) => Err(GenerationError::Timeout(endpoint.timeout())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_routing() {
        assert!(Role::Strategist.uses_reasoning_endpoint());
        assert!(Role::Architect.uses_reasoning_endpoint());
        assert!(!Role::Coder.uses_reasoning_endpoint());
        assert!(!Role::Repair.uses_reasoning_endpoint());
    }

    #[test]
    fn test_rig_generator_builds_from_defaults() {
        assert!(RigGenerator::from_config(&ForgeConfig::default()).is_ok());
    }

    #[test]
    fn test_error_display() {
        let e = GenerationError::Timeout(Duration::from_secs(3));
        assert!(e.to_string().contains("timed out"));
    }
}
