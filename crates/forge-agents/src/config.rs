use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::{SupervisorConfig, VerifierConfig};
use serde::Deserialize;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub url: String,
    pub model: String,
    pub api_key: String,
    /// Per-request timeout; a timeout counts as a failed attempt.
    pub timeout_secs: u64,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl Endpoint {
    /// Strategist/architect endpoint (`FORGE_REASONING_*`).
    pub fn reasoning_from_env() -> Self {
        Self {
            url: env_or("FORGE_REASONING_URL", "http://localhost:8080/v1"),
            model: env_or("FORGE_REASONING_MODEL", "Qwen2.5-72B-Instruct"),
            api_key: env_or("FORGE_API_KEY", "not-needed"),
            timeout_secs: env_parse("FORGE_REASONING_TIMEOUT_SECS", 120),
            temperature: 0.0,
            max_tokens: env_parse("FORGE_REASONING_MAX_TOKENS", 2048),
        }
    }

    /// Coder/repair endpoint (`FORGE_CODER_*`).
    pub fn coder_from_env() -> Self {
        Self {
            url: env_or("FORGE_CODER_URL", "http://localhost:8080/v1"),
            model: env_or("FORGE_CODER_MODEL", "Qwen2.5-Coder-7B-Instruct"),
            api_key: env_or("FORGE_API_KEY", "not-needed"),
            timeout_secs: env_parse("FORGE_CODER_TIMEOUT_SECS", 180),
            temperature: 0.0,
            max_tokens: env_parse("FORGE_CODER_MAX_TOKENS", 4096),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::coder_from_env()
    }
}

/// Global and per-file ceilings. Both are monotonic within a run.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Verify→Repair cycles before the run terminates.
    pub max_repair_cycles: u32,
    /// Model invocations per artifact per generation pass.
    pub max_file_attempts: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_repair_cycles: env_parse("FORGE_MAX_REPAIR_CYCLES", 3),
            max_file_attempts: env_parse("FORGE_MAX_FILE_ATTEMPTS", 3),
        }
    }
}

/// How the backend-under-test is launched and probed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub python: String,
    pub node: String,
    pub readiness_ms: u64,
    pub request_timeout_secs: u64,
    pub check_cors: bool,
    /// Program + args replacing the inferred launch command.
    pub command: Option<Vec<String>>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: env_or("FORGE_BACKEND_HOST", "localhost"),
            port: env_parse("FORGE_BACKEND_PORT", 5000),
            python: env_or("FORGE_PYTHON", "python3"),
            node: env_or("FORGE_NODE", "node"),
            readiness_ms: env_parse("FORGE_READINESS_MS", 2000),
            request_timeout_secs: env_parse("FORGE_REQUEST_TIMEOUT_SECS", 10),
            check_cors: env_parse("FORGE_CHECK_CORS", false),
            command: None,
        }
    }
}

impl BackendConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            python: self.python.clone(),
            node: self.node.clone(),
            host: self.host.clone(),
            port: self.port,
            readiness_window: Duration::from_millis(self.readiness_ms),
            command_override: self.command.clone(),
            ..SupervisorConfig::default()
        }
    }

    pub fn verifier(&self) -> VerifierConfig {
        VerifierConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            check_cors: self.check_cors,
            ..VerifierConfig::default()
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Strategist + architect.
    #[serde(default = "Endpoint::reasoning_from_env")]
    pub reasoning_endpoint: Endpoint,
    /// File generation + repair.
    #[serde(default = "Endpoint::coder_from_env")]
    pub coder_endpoint: Endpoint,
    pub budget: BudgetConfig,
    pub backend: BackendConfig,
    /// Parent of per-run workspace directories.
    pub workspace_root: PathBuf,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            reasoning_endpoint: Endpoint::reasoning_from_env(),
            coder_endpoint: Endpoint::coder_from_env(),
            budget: BudgetConfig::default(),
            backend: BackendConfig::default(),
            workspace_root: PathBuf::from(env_or("FORGE_WORKSPACE_ROOT", "generated_projects")),
        }
    }
}

impl ForgeConfig {
    /// Load from a TOML file; missing keys fall back to env/defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Check if an inference endpoint is reachable (GET /models).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
