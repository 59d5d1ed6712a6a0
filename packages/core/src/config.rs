//! Broker configuration.

use std::net::SocketAddr;

use crate::{BrokerError, Result};

/// Broker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Address the listener binds to.
    pub listen_addr: SocketAddr,
    /// Prefix for broker-assigned queue names.
    pub dynamic_prefix: String,
    /// Receiver target that stops the broker instead of naming a queue.
    pub shutdown_address: String,
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5672)),
            dynamic_prefix: "_dynamic_".to_string(),
            shutdown_address: "shutdown".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from `BROKER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Missing keys keep their defaults; present but empty keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("BROKER_LISTEN_ADDR") {
            config = config.with_listen_addr(parse_listen_addr(&addr)?);
        }
        if let Some(prefix) = lookup("BROKER_DYNAMIC_PREFIX") {
            config = config.with_dynamic_prefix(non_empty("BROKER_DYNAMIC_PREFIX", prefix)?);
        }
        if let Some(address) = lookup("BROKER_SHUTDOWN_ADDRESS") {
            config = config.with_shutdown_address(non_empty("BROKER_SHUTDOWN_ADDRESS", address)?);
        }
        if let Some(filter) = lookup("BROKER_LOG") {
            config.log_filter = non_empty("BROKER_LOG", filter)?;
        }

        Ok(config)
    }

    /// Set the listen address.
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Set the dynamic queue name prefix.
    pub fn with_dynamic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dynamic_prefix = prefix.into();
        self
    }

    /// Set the reserved shutdown address.
    pub fn with_shutdown_address(mut self, address: impl Into<String>) -> Self {
        self.shutdown_address = address.into();
        self
    }
}

fn parse_listen_addr(raw: &str) -> Result<SocketAddr> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(BrokerError::Config("BROKER_LISTEN_ADDR is empty".into()));
    }
    // A bare host listens on the standard AMQP port.
    let candidate = if raw.contains(':') {
        raw.to_string()
    } else {
        format!("{}:5672", raw)
    };
    candidate
        .parse()
        .map_err(|e| BrokerError::Config(format!("invalid listen address '{}': {}", raw, e)))
}

fn non_empty(key: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        Err(BrokerError::Config(format!("{} is empty", key)))
    } else {
        Ok(value)
    }
}
