use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use forge_agents::config::check_endpoint;
use forge_agents::{ForgeConfig, Orchestrator};
use tracing::{info, warn};

/// Turn an app description into a generated, contract-tested workspace.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to build, e.g. "a todo app with tags"
    #[arg(required = true, num_args = 1..)]
    request: Vec<String>,

    /// TOML config file (missing keys fall back to FORGE_* env vars)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parent directory for run workspaces (overrides FORGE_WORKSPACE_ROOT)
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Verify→repair cycles before giving up (overrides FORGE_MAX_REPAIR_CYCLES)
    #[arg(long)]
    max_repair_cycles: Option<u32>,

    /// Model attempts per file (overrides FORGE_MAX_FILE_ATTEMPTS)
    #[arg(long)]
    max_file_attempts: Option<u32>,

    /// Backend port for verification (overrides FORGE_BACKEND_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Probe both model endpoints before starting
    #[arg(long, default_value_t = false)]
    check_endpoints: bool,
}

impl Args {
    fn into_config(self) -> Result<(String, bool, ForgeConfig)> {
        let mut config = match &self.config {
            Some(path) => ForgeConfig::load(path)?,
            None => ForgeConfig::default(),
        };
        if let Some(root) = self.workspace_root {
            config.workspace_root = root;
        }
        if let Some(n) = self.max_repair_cycles {
            config.budget.max_repair_cycles = n;
        }
        if let Some(n) = self.max_file_attempts {
            config.budget.max_file_attempts = n;
        }
        if let Some(port) = self.port {
            config.backend.port = port;
        }
        Ok((self.request.join(" "), self.check_endpoints, config))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (request, check, config) = Args::parse().into_config()?;
    info!(
        reasoning = %config.reasoning_endpoint.url,
        coder = %config.coder_endpoint.url,
        max_repair_cycles = config.budget.max_repair_cycles,
        max_file_attempts = config.budget.max_file_attempts,
        "forge starting"
    );

    if check {
        for (name, url) in [
            ("reasoning", &config.reasoning_endpoint.url),
            ("coder", &config.coder_endpoint.url),
        ] {
            if !check_endpoint(url).await {
                warn!(endpoint = name, url = %url, "Endpoint not reachable");
            }
        }
    }

    let mut orchestrator = Orchestrator::from_config(config)?;
    let outcome = orchestrator
        .run(&request)
        .await
        .context("Pipeline run failed")?;

    info!(
        workspace = %outcome.workspace.display(),
        verdict = ?outcome.report.verdict,
        files = outcome.state.files.len(),
        fallbacks = outcome.state.fallbacks.len(),
        "Done"
    );
    if let Some(diag) = &outcome.state.diagnostic {
        warn!("{diag}");
    }
    if !outcome.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
