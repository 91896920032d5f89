mod controller;
mod fade;
mod player;

use nowplay_core::client::SpotifyClient;
use nowplay_core::config::Config;
use nowplay_core::platform;
use nowplay_core::store::TokenStore;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to a file; stdout belongs to the widget display.
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("widget.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,nowplay_widget=debug")),
        )
        .init();
    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let store = TokenStore::new(config.paths.token_store.clone());
    let client = SpotifyClient::new(&config, Some(store));

    let controller = controller::Controller::new(client, config.widget.preview_volume);
    controller
        .run(Duration::from_secs(config.widget.poll_interval_secs))
        .await
}
