pub mod api; // HTTP surface over the interview engine
pub mod config;
pub mod interview; // Stage machine + per-turn orchestration
pub mod models;
pub mod pipeline; // Normalize → extract → intent → reason → risk
pub mod store; // Session context persistence

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::interview::InterviewEngine;
use crate::pipeline::provider::ollama::OllamaProvider;
use crate::pipeline::provider::openai::OpenAiCompatibleProvider;
use crate::pipeline::provider::pool::ProviderPool;
use crate::store::{ContextStore, InMemoryContextStore, SqliteContextStore};

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Open the configured context store: SQLite when a path is set, memory otherwise.
pub fn open_store(cfg: &EngineConfig) -> Result<Arc<dyn ContextStore>, String> {
    match &cfg.database_path {
        Some(path) => {
            let store = SqliteContextStore::open(Path::new(path))
                .map_err(|e| format!("Failed to open context store at {path}: {e}"))?;
            tracing::info!(path = %path, "Using SQLite context store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Using in-memory context store");
            Ok(Arc::new(InMemoryContextStore::new()))
        }
    }
}

/// Build the provider pool from config. Providers that fail to construct are
/// skipped with a warning; an empty pool leaves the engine on rules alone.
pub fn build_provider_pool(cfg: &EngineConfig) -> ProviderPool {
    let mut pool = ProviderPool::new(
        cfg.provider_timeout(),
        cfg.provider_failure_threshold,
        cfg.provider_cooldown(),
    );

    if let Some(url) = &cfg.ollama_url {
        match OllamaProvider::new(url, &cfg.ollama_model, cfg.provider_timeout()) {
            Ok(p) => pool = pool.with_provider(Arc::new(p)),
            Err(e) => tracing::warn!(error = %e, "Skipping Ollama provider"),
        }
    }

    if let Some(url) = &cfg.openai_url {
        for key in &cfg.openai_api_keys {
            match OpenAiCompatibleProvider::new(url, &cfg.openai_model, key, cfg.provider_timeout())
            {
                Ok(p) => pool = pool.with_provider(Arc::new(p)),
                Err(e) => tracing::warn!(error = %e, "Skipping OpenAI-compatible provider"),
            }
        }
    }

    pool
}

/// Run the intake service until Ctrl-C.
pub fn run() -> Result<(), String> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cfg = EngineConfig::from_env();
    let addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .map_err(|e| format!("Invalid bind address {}: {e}", cfg.bind_addr))?;

    let store = open_store(&cfg)?;
    let providers = build_provider_pool(&cfg);
    if !cfg.has_provider() {
        tracing::info!("No language provider configured, rule-based analysis only");
    }

    let engine = Arc::new(InterviewEngine::new(cfg, store).with_providers(providers));
    let sweeper = interview::start_sweeper(engine.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to build runtime: {e}"))?;

    runtime.block_on(async move {
        let mut server = api::start_api_server(engine, addr).await?;
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
        }
        server.shutdown();
        server.wait().await;
        Ok::<(), String>(())
    })?;

    sweeper.shutdown();
    drop(sweeper);
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
