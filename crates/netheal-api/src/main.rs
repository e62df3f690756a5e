//! Binary entrypoint for the NetHeal API server.
use anyhow::Context;
use netheal_api::{run, AppState};
use netheal_core::{EngineConfig, ReasonerKind};
use netheal_reasoner::build_reasoner;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// YAML config file; `NETHEAL_*` variables override it
const CONFIG_ENV: &str = "NETHEAL_CONFIG";

fn load_config() -> anyhow::Result<EngineConfig> {
    let base = match std::env::var(CONFIG_ENV) {
        Ok(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        Err(_) => EngineConfig::default(),
    };
    base.with_env().context("invalid NETHEAL_* override")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    info!(
        auto_execute_threshold = config.auto_execute_threshold,
        rollback_window_min = config.default_rollback_window_min,
        reasoner = ?config.reasoner,
        "configuration loaded"
    );

    let reasoner = match build_reasoner(&config, None) {
        Ok(reasoner) => reasoner,
        Err(e) => {
            warn!(error = %e, "model-backed reasoner unavailable, using rule table");
            let fallback = EngineConfig { reasoner: ReasonerKind::RuleBased, ..config.clone() };
            build_reasoner(&fallback, None)?
        }
    };

    let state = AppState::from_config(&config, reasoner)?;
    run(state, &config.listen_addr)
        .await
        .with_context(|| format!("server on {} failed", config.listen_addr))
}
