//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `formflow.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use formflow_adapter_delivery::DeliveryConfig;
use formflow_adapter_mqtt::MqttConfig;
use formflow_adapter_nats::NatsConfig;
use formflow_app::scheduler::SchedulerSettings;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Queue bridge backend and its settings.
    pub broker: BrokerConfig,
    /// Outbound webhook and mail settings.
    pub delivery: DeliveryConfig,
    /// Timer polling.
    pub scheduler: SchedulerConfig,
    /// Pipeline engine.
    pub engine: EngineConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Broker selection. An empty `kind` means MQTT.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub kind: String,
    pub mqtt: MqttConfig,
    pub nats: NatsConfig,
}

/// Supported queue bridge backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Mqtt,
    Nats,
    /// In-process queue; events do not survive a restart.
    Memory,
}

impl std::str::FromStr for BrokerKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "mqtt" => Ok(Self::Mqtt),
            "nats" => Ok(Self::Nats),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Validation(format!(
                "unknown broker kind `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between two polls of the timer store.
    pub tick_secs: u64,
    /// Maximum timers fired per tick.
    pub batch_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of parallel consumer tasks.
    pub consumers: usize,
    /// Pause after a delivery that could not be processed.
    pub retry_backoff_ms: u64,
    /// Age after which an unfinished action claim is taken over on redelivery.
    pub claim_lease_secs: u64,
}

impl Config {
    /// Load configuration from `formflow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration does not validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("formflow.toml")?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(val) = env("FORMFLOW_HOST") {
            self.server.host = val;
        }
        if let Some(port) = env("FORMFLOW_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = env("FORMFLOW_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = env("FORMFLOW_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = env("FORMFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = env("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = env("FORMFLOW_BROKER") {
            self.broker.kind = val;
        }
        if let Some(val) = env("FORMFLOW_MQTT_BROKER") {
            match val.rsplit_once(':') {
                Some((host, port)) => {
                    self.broker.mqtt.broker_host = host.to_string();
                    if let Ok(port) = port.parse() {
                        self.broker.mqtt.broker_port = port;
                    }
                }
                None => self.broker.mqtt.broker_host = val,
            }
        }
        if let Some(val) = env("FORMFLOW_NATS_URLS") {
            self.broker.nats.urls = val
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(val) = env("FORMFLOW_SMTP_HOST") {
            self.delivery.smtp_host = Some(val).filter(|host| !host.is_empty());
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.broker_kind()? == BrokerKind::Nats && self.broker.nats.urls.is_empty() {
            return Err(ConfigError::Validation(
                "broker.nats.urls must not be empty".to_string(),
            ));
        }
        if self.scheduler.tick_secs == 0 {
            return Err(ConfigError::Validation(
                "scheduler.tick_secs must be non-zero".to_string(),
            ));
        }
        if self.delivery.webhook_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "delivery.webhook_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.engine.consumers == 0 {
            return Err(ConfigError::Validation(
                "engine.consumers must be at least 1".to_string(),
            ));
        }
        if self.engine.claim_lease_secs <= self.delivery.webhook_timeout_secs {
            return Err(ConfigError::Validation(
                "engine.claim_lease_secs must exceed delivery.webhook_timeout_secs".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an unknown `broker.kind`.
    pub fn broker_kind(&self) -> Result<BrokerKind, ConfigError> {
        self.broker.kind.parse()
    }

    #[must_use]
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            tick: Duration::from_secs(self.scheduler.tick_secs),
            batch_size: self.scheduler.batch_size,
            reminder_from: self.delivery.reminder_from.clone(),
        }
    }

    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.engine.retry_backoff_ms)
    }

    #[must_use]
    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.engine.claim_lease_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:formflow.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "formflowd=info,formflow=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            batch_size: 100,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            consumers: 2,
            retry_backoff_ms: 1000,
            claim_lease_secs: 300,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
