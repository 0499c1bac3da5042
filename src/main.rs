mod config;

use chat_relay::client::create_hyper_client;
use chat_relay::{AppState, RelayConfig, build_router};
use clap::Parser as _;
use config::Config;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parsing fails fast here if DEEPSEEK_API_KEY is absent; the Debug output
    // below shows the key only in redacted form.
    let config = Config::parse().validate()?;
    info!("Starting chat relay with config: {:?}", config);

    let relay = RelayConfig::builder()
        .upstream_url(config.upstream_url.clone())
        .upstream_model(config.upstream_model.clone())
        .api_key(config.api_key.clone())
        .upstream_timeout(Duration::from_secs(config.upstream_timeout_secs))
        .build();

    let http_client = create_hyper_client(
        Duration::from_secs(config.pool_idle_timeout_secs),
        config.pool_max_idle_per_host,
    );
    let app_state = AppState::with_client(relay, http_client);
    let router = build_router(app_state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Chat relay listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
