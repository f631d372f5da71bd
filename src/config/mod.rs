use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

/// How a message put on the shared broadcast channel reaches peers.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Every session's broadcast relay competes for the shared channel;
    /// each message reaches exactly one peer, possibly the sender.
    #[default]
    One,
    /// A dispatcher copies each message into every session's private channel.
    All,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub delivery: DeliveryMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub log: LogConfig,
}

fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("environment", environment)?
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8765)?
        .set_default("server.workers", num_cpus::get() as i64)?
        .set_default("relay.delivery", "one")?
        .set_default("log.level", "info")
}

fn env_source() -> Environment {
    // E.g., `APP_SERVER__PORT=5001` would set `Settings.server.port`
    Environment::with_prefix("app")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        defaults("development")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Defaults plus environment overrides, never touching config files.
    pub fn new_for_test() -> Result<Self, ConfigError> {
        defaults("test")?
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
