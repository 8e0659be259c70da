use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sparta_api::StageClient;
use sparta_engine::config::{OrchestratorConfig, load_config, load_config_from_path};
use sparta_engine::{Pipeline, WorkflowEngine, WorkflowStore};
use sparta_server::{OrchestratorHttpServer, resolve_bind_address};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Orchestrates hardware-design workflows across the SPARTA stage services.
#[derive(Debug, Parser)]
#[command(name = "sparta-orchestrator", version, about)]
struct Cli {
    /// Configuration file; defaults to $SPARTA_CONFIG_PATH or the user config directory.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address the HTTP API listens on, overriding the configuration file.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let bind_address = resolve_bind_address(&config.http_server.bind_address)?;
    let pipeline = Pipeline::http(&config.services, &config.stages, StageClient::new()?).context("build stage pipeline")?;
    let settings = config.execution.engine_settings();
    let engine = Arc::new(WorkflowEngine::new(Arc::new(WorkflowStore::new()), pipeline, settings));

    let server = OrchestratorHttpServer::new(bind_address, Arc::clone(&engine)).start().await?;
    info!(
        address = %server.bound_address(),
        nlp = %config.services.nlp_agent_url,
        synthesis = %config.services.synthesis_agent_url,
        rtl = %config.services.rtl_generator_url,
        emulator = %config.services.emulator_url,
        "orchestrator ready"
    );

    tokio::signal::ctrl_c().await.context("listen for shutdown signal")?;
    info!("shutdown signal received");

    let report = engine.shutdown(settings.shutdown_grace).await;
    info!(
        drained = report.drained,
        interrupted_runs = report.interrupted_runs,
        "workflow runs settled"
    );
    server.stop().await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn resolve_config(cli: &Cli) -> Result<OrchestratorConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    }
    .context("load orchestrator configuration")?;

    if let Some(bind) = &cli.bind {
        config.http_server.bind_address = bind.clone();
    }
    Ok(config)
}
