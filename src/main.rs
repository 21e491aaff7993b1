use std::sync::Arc;

use fertility_bridge::config::{ConfigPersistence, ConfigStore, IntegrationConfig, JsonFilePersistence};
use fertility_bridge::emr::transport::HttpFhirTransport;
use fertility_bridge::llm::transport::HttpProviderTransport;
use fertility_bridge::{routes, state};

const DEFAULT_CONFIG_PATH: &str = "integration-config.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    // A saved config wins over the environment; env only seeds first boot.
    let persistence = Arc::new(JsonFilePersistence::new(&config_path));
    let initial = match persistence.load().await? {
        Some(saved) => {
            tracing::info!(path = %config_path, version = saved.version, "config: loaded saved snapshot");
            saved
        }
        None => IntegrationConfig::from_env()?,
    };
    let store = ConfigStore::new(initial, persistence);

    let state = state::AppState::new(store, Arc::new(HttpProviderTransport::new()?), Arc::new(HttpFhirTransport::new()?));
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "fertility-bridge listening");
    axum::serve(listener, app).await?;
    Ok(())
}
