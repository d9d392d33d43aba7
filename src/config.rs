//! Runtime configuration for the dashboard backend.
//!
//! All sections use a builder style so the server binary (or a test) can
//! start from defaults and override selectively:
//!
//! ```rust
//! use trem_dash::config::{BrokerConfig, Config, WebConfig};
//!
//! let config = Config::default()
//!     .with_broker(BrokerConfig::default().with_host("192.168.1.50"))
//!     .with_web(WebConfig::default().with_port(3000));
//! ```

use std::collections::HashMap;

use crate::broker::Topic;

/// Complete application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// MQTT broker connection and topic settings.
    pub broker: BrokerConfig,
    /// Web server settings.
    pub web: WebConfig,
    /// Train state machine timing and limits.
    pub train: TrainConfig,
}

impl Config {
    /// Set the broker configuration.
    pub fn with_broker(mut self, broker: BrokerConfig) -> Self {
        self.broker = broker;
        self
    }

    /// Set the web configuration.
    pub fn with_web(mut self, web: WebConfig) -> Self {
        self.web = web;
        self
    }

    /// Set the train configuration.
    pub fn with_train(mut self, train: TrainConfig) -> Self {
        self.train = train;
        self
    }
}

// ============================================================================
// Broker Config
// ============================================================================

/// MQTT broker configuration.
///
/// `topic_overrides` remaps logical topics to custom wire names; anything
/// not overridden uses the `trem/*` defaults from [`Topic::default_wire`].
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Whether the broker adapter is active. When false every publish is a
    /// silent no-op, which is what the web API tests rely on.
    pub enabled: bool,
    /// Broker hostname or IP.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client id prefix; a random suffix is appended per connection.
    pub client_id_prefix: String,
    /// Username for authentication (empty = no auth).
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Default QoS for publishes (0, 1, or 2). Emergency intents always go
    /// out at QoS 2 regardless of this setting.
    pub default_qos: u8,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Logical topic -> wire topic overrides.
    pub topic_overrides: HashMap<Topic, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 1883,
            client_id_prefix: "trem_dashboard_".to_string(),
            username: String::new(),
            password: String::new(),
            default_qos: 1,
            keep_alive_secs: 60,
            topic_overrides: HashMap::new(),
        }
    }
}

impl BrokerConfig {
    /// Set the broker host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the broker port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client id prefix.
    pub fn with_client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_id_prefix = prefix.into();
        self
    }

    /// Set authentication credentials.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the default publish QoS.
    pub fn with_default_qos(mut self, qos: u8) -> Self {
        self.default_qos = qos;
        self
    }

    /// Enable or disable the adapter.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Remap a logical topic to a custom wire name.
    pub fn with_topic(mut self, topic: Topic, wire: impl Into<String>) -> Self {
        self.topic_overrides.insert(topic, wire.into());
        self
    }

    /// Resolve a logical topic to its wire name.
    pub fn wire_topic(&self, topic: Topic) -> &str {
        self.topic_overrides
            .get(&topic)
            .map(String::as_str)
            .unwrap_or_else(|| topic.default_wire())
    }
}

// ============================================================================
// Web Config
// ============================================================================

/// Web server configuration.
#[derive(Clone, Debug)]
pub struct WebConfig {
    /// Port to listen on (binds 0.0.0.0).
    pub port: u16,
    /// Whether to allow cross-origin requests from any origin.
    pub cors_permissive: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cors_permissive: true,
        }
    }
}

impl WebConfig {
    /// Set the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set whether CORS should be permissive.
    pub fn with_cors_permissive(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }
}

// ============================================================================
// Train Config
// ============================================================================

/// Timing and limit parameters for the train state machine.
#[derive(Clone, Debug)]
pub struct TrainConfig {
    /// Interval between ramp ticks in milliseconds.
    pub ramp_interval_ms: u64,
    /// Interval between pending-direction checks in milliseconds.
    pub direction_poll_ms: u64,
    /// How long the emergency lockout holds before the forced shutdown.
    pub emergency_cooldown_ms: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            ramp_interval_ms: 500,
            direction_poll_ms: 100,
            emergency_cooldown_ms: 2000,
        }
    }
}

impl TrainConfig {
    /// Set the ramp tick interval.
    pub fn with_ramp_interval_ms(mut self, ms: u64) -> Self {
        self.ramp_interval_ms = ms;
        self
    }

    /// Set the pending-direction poll interval.
    pub fn with_direction_poll_ms(mut self, ms: u64) -> Self {
        self.direction_poll_ms = ms;
        self
    }

    /// Set the emergency cooldown duration.
    pub fn with_emergency_cooldown_ms(mut self, ms: u64) -> Self {
        self.emergency_cooldown_ms = ms;
        self
    }
}
