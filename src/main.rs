use anyhow::{Context, Result};
use event_connector::config::{load_config, ClientConfig};
use event_connector::{Client, Event};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "event_connector=info".into()),
        )
        .init();

    info!("Event connector starting...");

    // Read configuration from file (optional) and environment
    let mut config = match std::env::var("EVENT_CONNECTOR_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => ClientConfig::default(),
    };
    config.apply_env();

    info!(
        host = %config.listener.host,
        port = config.listener.port,
        module = %config.module.name,
        broker = ?config.broker.address,
        "Configuration loaded"
    );

    let client = Client::start(config.clone())
        .await
        .context("Failed to start event client")?;

    client.set_event_handler(|event: Event| {
        info!(
            topic = %event.topic(),
            source = ?event.source(),
            payload = %serde_json::Value::Object(event.payload().clone()),
            "Received event"
        );
    });

    if let Some(address) = &config.broker.address {
        let descriptor = client.module_descriptor();
        client
            .connect_broker(address, &descriptor)
            .context("Failed to register with broker")?;
    }

    info!(callback = %client.callback_address(), "Event connector ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    client.shutdown().await;

    Ok(())
}
