//! MQTT broker adapter.
//!
//! Owns one connection to the broker and exposes publish/subscribe/close
//! over *logical* topics, mapped to wire names through [`BrokerConfig`]
//! (defaults are the `trem/*` family). The connection is created lazily on
//! first use; a failure surfaces as a typed [`BrokerError`], never a panic,
//! and the control loop keeps serving with degraded delivery.
//!
//! Emergency intents always go out at QoS 2 with the retain flag set, so a
//! late-joining subscriber still sees the last emergency state. `close` is
//! idempotent and safe to call at any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::BrokerConfig;

/// Logical topics relayed to the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Power on/off intents.
    Command,
    /// Target speed intents.
    Speed,
    /// Direction intents.
    Direction,
    /// Train status reports (also consumed by the subscriber side).
    Status,
    /// Emergency stop intents (QoS 2, retained).
    Emergency,
    /// Telemetry statistics.
    Stats,
}

impl Topic {
    /// Default wire name for this logical topic.
    pub fn default_wire(self) -> &'static str {
        match self {
            Self::Command => "trem/controle",
            Self::Speed => "trem/velocidade",
            Self::Direction => "trem/direcao",
            Self::Status => "trem/status",
            Self::Emergency => "trem/emergencia",
            Self::Stats => "trem/estatisticas",
        }
    }
}

/// Broker adapter failures. All recoverable: local state is never contingent
/// on any of these.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Could not reach or authenticate with the broker.
    #[error("broker connect failed: {0}")]
    Connect(String),
    /// A publish was not handed to the broker.
    #[error("broker publish failed: {0}")]
    Publish(String),
    /// A subscription could not be registered.
    #[error("broker subscribe failed: {0}")]
    Subscribe(String),
}

/// Callback invoked with `(wire_topic, payload)` for subscribed topics.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// MQTT client with lazy connection and logical topic mapping.
///
/// Cheap to share via `Arc`; all methods take `&self`.
pub struct BrokerClient {
    config: BrokerConfig,
    client: Mutex<Option<AsyncClient>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    handlers: Arc<StdMutex<Vec<(String, MessageHandler)>>>,
    connected: Arc<AtomicBool>,
}

impl BrokerClient {
    /// Create an adapter. No connection is opened until first use.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            event_task: Mutex::new(None),
            handlers: Arc::new(StdMutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the adapter currently believes it is connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Whether the adapter is enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Open the connection if not already open. Returns the current
    /// connection status; disabled adapters report `false` without error.
    pub async fn connect(&self) -> Result<bool, BrokerError> {
        if !self.config.enabled {
            return Ok(false);
        }
        self.ensure_client().await?;
        Ok(self.is_connected())
    }

    /// Publish a payload to a logical topic.
    ///
    /// `qos` overrides the configured default when given. Disabled adapters
    /// swallow the publish silently.
    pub async fn publish(
        &self,
        topic: Topic,
        payload: impl Into<Vec<u8>>,
        qos: Option<u8>,
        retain: bool,
    ) -> Result<(), BrokerError> {
        if !self.config.enabled {
            return Ok(());
        }
        let client = self.ensure_client().await?;
        let wire = self.config.wire_topic(topic).to_string();
        let qos = qos_level(qos.unwrap_or(self.config.default_qos));
        client
            .publish(&wire, qos, retain, payload.into())
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        tracing::debug!(topic = %wire, "published");
        Ok(())
    }

    /// Publish an emergency intent: highest delivery guarantee, retained.
    pub async fn publish_emergency(
        &self,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), BrokerError> {
        self.publish(Topic::Emergency, payload, Some(2), true).await
    }

    /// Subscribe to a logical topic, dispatching inbound messages to
    /// `handler` from the connection's event task.
    pub async fn subscribe(
        &self,
        topic: Topic,
        handler: MessageHandler,
    ) -> Result<(), BrokerError> {
        if !self.config.enabled {
            return Ok(());
        }
        let client = self.ensure_client().await?;
        let wire = self.config.wire_topic(topic).to_string();
        self.handlers.lock().unwrap().push((wire.clone(), handler));
        client
            .subscribe(&wire, qos_level(self.config.default_qos))
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))
    }

    /// Close the connection. Idempotent; later publishes reconnect lazily.
    pub async fn close(&self) {
        if let Some(client) = self.client.lock().await.take() {
            let _ = client.disconnect().await;
        }
        if let Some(task) = self.event_task.lock().await.take() {
            task.abort();
        }
        self.connected.store(false, Ordering::Relaxed);
    }

    async fn ensure_client(&self) -> Result<AsyncClient, BrokerError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client_id = format!("{}{:08x}", self.config.client_id_prefix, rand::random::<u32>());
        let mut options = MqttOptions::new(client_id, &self.config.host, self.config.port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs as u64));
        if !self.config.username.is_empty() {
            options.set_credentials(&self.config.username, &self.config.password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        let connected = Arc::clone(&self.connected);
        let handlers = Arc::clone(&self.handlers);
        let task = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected.store(true, Ordering::Relaxed);
                        tracing::info!("connected to broker");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let registered = handlers.lock().unwrap().clone();
                        for (wire, handler) in registered {
                            if wire == publish.topic {
                                handler(&publish.topic, &publish.payload);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        connected.store(false, Ordering::Relaxed);
                        tracing::warn!(error = %e, "broker connection lost, retrying");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        *self.event_task.lock().await = Some(task);
        *guard = Some(client.clone());
        Ok(client)
    }
}

fn qos_level(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
