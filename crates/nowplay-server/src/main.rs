mod http;

use nowplay_core::config::Config;
use nowplay_core::client::SpotifyClient;
use nowplay_core::store::TokenStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,nowplay_server=debug")),
        )
        .init();

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    if !config.http.enabled {
        anyhow::bail!("http.enabled is false; nothing to serve");
    }

    let store = TokenStore::new(config.paths.token_store.clone());
    let client = Arc::new(SpotifyClient::new(&config, Some(store)));

    http::serve(config.http.bind_address.clone(), config.http.port, client).await
}
