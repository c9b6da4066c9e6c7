use crate::broker::protocol::DEFAULT_EVENT_PATH;
use crate::module::ModuleType;
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Complete client configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub module: ModuleConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
}

/// Inbound HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 picks an ephemeral port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host put in the callback address given to the broker (defaults to `host`)
    #[serde(default)]
    pub advertise_host: Option<String>,
    #[serde(default = "default_event_path")]
    pub path: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_event_path() -> String {
    DEFAULT_EVENT_PATH.to_string()
}

fn default_max_body_bytes() -> usize {
    1_048_576 // 1 MB
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            advertise_host: None,
            path: default_event_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ListenerConfig {
    pub fn advertised_host(&self) -> &str {
        self.advertise_host.as_deref().unwrap_or(&self.host)
    }
}

/// Identity presented to the broker
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
    #[serde(default = "default_module_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_module_version")]
    pub version: String,
    #[serde(default)]
    pub module_type: ModuleType,
    /// Explicit topics to register with; empty registers for everything
    #[serde(default)]
    pub topics: Vec<String>,
}

fn default_module_name() -> String {
    "event-connector".to_string()
}

fn default_module_version() -> String {
    "0.1.0".to_string()
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: default_module_name(),
            description: String::new(),
            version: default_module_version(),
            module_type: ModuleType::default(),
            topics: Vec::new(),
        }
    }
}

/// Broker connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// `host:port` or base URL; connect on startup when set
    #[serde(default)]
    pub address: Option<String>,
    /// Path on the broker that events are POSTed to
    #[serde(default = "default_event_path")]
    pub path: String,
    /// Bound on each outbound POST
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    /// How long a response callback waits before giving up
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,
}

fn default_send_timeout_secs() -> u64 {
    60
}

fn default_callback_timeout_secs() -> u64 {
    30
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: None,
            path: default_event_path(),
            send_timeout_secs: default_send_timeout_secs(),
            callback_timeout_secs: default_callback_timeout_secs(),
        }
    }
}

impl BrokerConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

impl ClientConfig {
    /// Rejects settings the listener or sender cannot use.
    pub fn validate(&self) -> Result<()> {
        validate_event_path("listener.path", &self.listener.path)?;
        validate_event_path("broker.path", &self.broker.path)?;
        ensure!(
            self.listener.max_body_bytes > 0,
            "listener.max_body_bytes must be greater than zero"
        );
        Ok(())
    }

    /// Overrides fields from `EVENT_CONNECTOR_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overrides fields from a variable lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EVENT_CONNECTOR_HOST") {
            self.listener.host = v;
        }
        if let Some(v) = lookup("EVENT_CONNECTOR_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.listener.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid EVENT_CONNECTOR_PORT"),
            }
        }
        if let Some(v) = lookup("EVENT_CONNECTOR_ADVERTISE_HOST") {
            self.listener.advertise_host = Some(v);
        }
        if let Some(v) = lookup("EVENT_CONNECTOR_BROKER") {
            self.broker.address = Some(v);
        }
        if let Some(v) = lookup("EVENT_CONNECTOR_MODULE_NAME") {
            self.module.name = v;
        }
        if let Some(v) = lookup("EVENT_CONNECTOR_MODULE_TYPE") {
            match v.parse::<ModuleType>() {
                Ok(module_type) => self.module.module_type = module_type,
                Err(e) => warn!(error = %e, "Ignoring invalid EVENT_CONNECTOR_MODULE_TYPE"),
            }
        }
    }
}

/// Event paths are literal: absolute, no route captures.
fn validate_event_path(field: &str, path: &str) -> Result<()> {
    ensure!(
        path.starts_with('/'),
        "{} must start with '/' (got '{}')",
        field,
        path
    );
    ensure!(
        !path.contains(':') && !path.contains('*') && !path.contains('{'),
        "{} must be a literal path (got '{}')",
        field,
        path
    );
    Ok(())
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: ClientConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path))?;
    Ok(config)
}
