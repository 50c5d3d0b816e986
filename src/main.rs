use anyhow::{Context, Result};
use iothub::api::{create_inspect_router, InspectAppState};
use iothub::config::{load_config, HubConfig};
use iothub::hub::Hub;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iothub=info".into()),
        )
        .init();

    info!("IoT hub starting...");

    let config = match std::env::var("IOTHUB_CONFIG") {
        Ok(path) => match load_config(&path) {
            Ok(config) => {
                info!(path = %path, "Configuration loaded");
                config
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to load config, using defaults");
                HubConfig::default()
            }
        },
        Err(_) => HubConfig::default(),
    }
    .apply_env();

    info!(
        bind_addr = %config.server.bind_addr,
        api_enabled = config.api.enabled,
        api_addr = %config.api.bind_addr,
        default_max_wait_seconds = config.session.default_max_wait_seconds,
        "Configuration resolved"
    );

    let hub = Arc::new(Hub::from_config(&config));

    // Start TCP intake server
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .context("Failed to bind intake port")?;
    let intake_handle = tokio::spawn(iothub::server::serve(
        Arc::clone(&hub),
        listener,
        config.server.clone(),
    ));

    // Start HTTP inspection API
    let api_handle = if config.api.enabled {
        let router = create_inspect_router(Arc::new(InspectAppState {
            hub: Arc::clone(&hub),
        }));
        let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
            .await
            .context("Failed to bind inspection API port")?;
        info!(addr = %config.api.bind_addr, "Inspection API listening");

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "Inspection API server error");
            }
        }))
    } else {
        None
    };

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    intake_handle.abort();
    if let Some(handle) = api_handle {
        handle.abort();
    }
    info!("IoT hub stopped");

    Ok(())
}
