pub mod config;
pub mod mqtt;

use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use crate::mqtt::client::MqttClient;

/// How long one poll of the inbound queue may block
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    info!("loading configuration from {config_path}");
    let app_config = AppConfig::load(&config_path)?;

    let mut client = MqttClient::new(app_config);

    info!("connecting to MQTT broker");
    if !client.connect().await {
        return Err(eyre!(
            "failed to connect to MQTT broker; check that the broker is running \
             and the [broker] settings in {config_path} are correct"
        ));
    }
    for topic in client.subscribed_topics() {
        info!(%topic, "listening");
    }

    info!("waiting for sensor data");
    let mut was_connected = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            message = client.get_message(POLL_INTERVAL) => {
                if let Some(message) = message {
                    info!("{message}");
                }
                let connected = client.check_connection();
                if was_connected && !connected {
                    warn!("broker connection lost; restart to reconnect");
                }
                was_connected = connected;
            }
        }
    }

    client.disconnect().await;
    info!("stopped");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
