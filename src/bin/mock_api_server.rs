use std::{fs, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use labdesk::{
    client::InMemoryLabApi, config, handlers::api_router, models::Parameter,
};
use tracing::info;

/// JSON array of parameters to preload, e.g. a dump of `GET /parameter/`.
const SEED_ENV: &str = "LABDESK_MOCK_SEED";

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    let api = match std::env::var(SEED_ENV).ok().filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("failed to read seed file {}", path))?;
            let parameters: Vec<Parameter> = serde_json::from_str(&data)
                .with_context(|| format!("failed to parse seed file {}", path))?;
            info!("Seeding {} parameters from {}", parameters.len(), path);
            InMemoryLabApi::with_parameters(parameters).await
        }
        None => InMemoryLabApi::new(),
    };

    let addr: SocketAddr = format!("{}:{}", config.mock_server_host, config.mock_server_port)
        .parse()
        .context("invalid mock server address")?;
    let app = api_router(Arc::new(api), config.request_timeout());

    info!("Starting LabDesk mock API on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
