//! Dashboard backend server.
//!
//! Wires the train machine, broker adapter, activity log, tick runner, and
//! HTTP API together. Configuration comes from environment variables on top
//! of the defaults:
//!
//! - `TREM_HTTP_PORT` - HTTP listen port (default 8080)
//! - `TREM_MQTT_HOST` / `TREM_MQTT_PORT` - broker address (default localhost:1883)
//! - `TREM_MQTT_USER` / `TREM_MQTT_PASS` - broker credentials (default none)
//! - `TREM_MQTT_ENABLED` - set to `false` to run without a broker
//! - `RUST_LOG` - tracing filter (default `info`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use trem_dash::services::{runner, web};
use trem_dash::{
    ActivityLevel, ActivityLog, BrokerClient, BrokerConfig, Config, SharedTrainState, Topic,
    TrainMachine, WebConfig,
};

fn config_from_env() -> anyhow::Result<Config> {
    let mut broker = BrokerConfig::default();
    if let Ok(host) = std::env::var("TREM_MQTT_HOST") {
        broker = broker.with_host(host);
    }
    if let Ok(port) = std::env::var("TREM_MQTT_PORT") {
        broker = broker.with_port(port.parse().context("TREM_MQTT_PORT must be a port number")?);
    }
    if let (Ok(user), Ok(pass)) = (
        std::env::var("TREM_MQTT_USER"),
        std::env::var("TREM_MQTT_PASS"),
    ) {
        broker = broker.with_auth(user, pass);
    }
    if let Ok(enabled) = std::env::var("TREM_MQTT_ENABLED") {
        broker = broker.with_enabled(enabled != "false" && enabled != "0");
    }

    let mut web = WebConfig::default();
    if let Ok(port) = std::env::var("TREM_HTTP_PORT") {
        web = web.with_port(port.parse().context("TREM_HTTP_PORT must be a port number")?);
    }

    Ok(Config::default().with_broker(broker).with_web(web))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config_from_env()?;
    let tick_interval = Duration::from_millis(config.train.direction_poll_ms);

    let activity = Arc::new(ActivityLog::new());
    let broker = Arc::new(BrokerClient::new(config.broker.clone()));
    let state = Arc::new(SharedTrainState::new(
        TrainMachine::with_config(config.train.clone()),
        Arc::clone(&broker),
        Arc::clone(&activity),
    ));

    // Connect eagerly so the first command does not pay the handshake;
    // failure here is degraded operation, not a startup error.
    match broker.connect().await {
        Ok(true) => activity.record("broker", "connected to broker", None, ActivityLevel::Info),
        Ok(false) if broker.is_enabled() => {
            activity.record("broker", "broker not yet reachable", None, ActivityLevel::Warning)
        }
        Ok(false) => tracing::info!("broker adapter disabled"),
        Err(error) => activity.record(
            "broker",
            format!("broker connect failed: {error}"),
            None,
            ActivityLevel::Warning,
        ),
    }

    // Mirror inbound status reports into the activity log.
    {
        let activity = Arc::clone(&activity);
        broker
            .subscribe(
                Topic::Status,
                Arc::new(move |_topic, payload| {
                    let text = String::from_utf8_lossy(payload).into_owned();
                    activity.record("status", text, None, ActivityLevel::Debug);
                }),
            )
            .await
            .ok();
    }

    runner::spawn(Arc::clone(&state), tick_interval);

    web::serve(state, &config.web).await
}
