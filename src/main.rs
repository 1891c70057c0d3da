// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use search_gateway::engine::EngineHealth;
use search_gateway::resilience::retry;
use search_gateway::{
    http, metrics, DictionarySuggester, ElasticsearchClient, GatewayConfig,
    InMemoryEngine, RetryConfig, SearchEngine, SearchGateway,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "SEARCH_GATEWAY_CONFIG";

fn load_config() -> anyhow::Result<GatewayConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            let config = GatewayConfig::from_file(&path)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(GatewayConfig::default()),
    }
}

fn suggester(config: &GatewayConfig) -> anyhow::Result<Option<DictionarySuggester>> {
    let Some(path) = &config.spelling_dictionary else {
        return Ok(None);
    };
    let suggester = DictionarySuggester::from_file(path)?
        .with_ignore(&config.spelling_ignore)
        .with_blacklist(&config.spelling_blacklist);
    Ok(Some(suggester))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let started = Instant::now();
    let config = load_config()?;

    let engine: Arc<dyn SearchEngine> = match &config.elasticsearch_url {
        Some(url) => {
            let client = ElasticsearchClient::new(url.clone(), config.engine_timeout());
            let health: EngineHealth = retry::retry("engine health", &RetryConfig::startup(), || {
                client.health()
            })
            .await
            .with_context(|| format!("search engine at {url} is not reachable"))?;
            info!(url = %url, status = %health.status, "Connected to Elasticsearch");
            Arc::new(client)
        }
        None => {
            warn!("No elasticsearch_url configured, serving from an empty in-memory engine");
            Arc::new(InMemoryEngine::new())
        }
    };

    let mut gateway = SearchGateway::new(config.clone(), engine)?;
    if let Some(suggester) = suggester(&config)? {
        gateway = gateway.with_suggester(Arc::new(suggester));
    }

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    metrics::record_startup(started.elapsed());

    http::serve(listener, Arc::new(gateway)).await?;
    Ok(())
}
