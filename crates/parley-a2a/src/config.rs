//! # Environment-Based Configuration
//!
//! Server settings come from defaults, then environment variables, then
//! explicit builder calls (the CLI maps its flags onto those).
//!
//! ## Environment Variables
//!
//! - `PARLEY_HOST` - Bind address (default: 0.0.0.0)
//! - `PARLEY_PORT` - Bind port (default: 8080)
//! - `PARLEY_STORE` - Persistence backend, `memory` or `file` (default: memory)
//! - `PARLEY_STORE_PATH` - File backend location (default: parley-store.json)
//! - `PARLEY_AGENT_NAME` - Name on the agent card (default: Parley Reference Agent)
//! - `PARLEY_AGENT_URL` - Endpoint URL on the agent card (default: http://localhost:8080)
//! - `PARLEY_STREAMING` - Advertise and serve streaming (default: true)
//! - `PARLEY_PUSH_NOTIFICATIONS` - Accept push notification configs (default: true)
//! - `PARLEY_EXECUTOR_WORK_MS` - Simulated work of the reference executor (default: 50, max: 60000)
//! - `PARLEY_SSE_BUFFER` - Frames buffered per streaming client (default: 16)
//! - `PARLEY_AUTH_TOKEN` - Bearer token unlocking the extended card (default: unset)
//! - `PARLEY_ENABLE_CORS` - Enable permissive CORS (default: true)

use parley_core::{FileStore, InMemoryStore, KvStore};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fmt};

use crate::types::{AgentCard, AgentSkill};

const MAX_EXECUTOR_WORK_MS: u64 = 60_000;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Persistence backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// Process-local map
    #[default]
    Memory,
    /// JSON file on disk
    File,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "file" => Ok(StoreKind::File),
            other => Err(format!("unknown store '{other}', expected memory or file")),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Memory => write!(f, "memory"),
            StoreKind::File => write!(f, "file"),
        }
    }
}

/// Validated server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    pub store_path: PathBuf,
    pub agent_name: String,
    pub agent_url: String,
    pub streaming: bool,
    pub push_notifications: bool,
    pub executor_work: Duration,
    pub sse_buffer: usize,
    pub auth_token: Option<String>,
    pub enable_cors: bool,
}

impl ServerConfig {
    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open the configured persistence backend.
    pub fn open_store(&self) -> Arc<dyn KvStore> {
        match self.store {
            StoreKind::Memory => Arc::new(InMemoryStore::new()),
            StoreKind::File => Arc::new(FileStore::open(&self.store_path)),
        }
    }

    /// Public agent card described by this configuration.
    pub fn agent_card(&self) -> AgentCard {
        AgentCard::new(&self.agent_name, &self.agent_url)
            .with_description("Echoes every message back as an artifact")
            .with_streaming(self.streaming)
            .with_push_notifications(self.push_notifications)
            .with_skill(
                AgentSkill::new("echo", "Echo")
                    .with_description("Returns the text of the request")
                    .with_tag("reference")
                    .with_example("hello"),
            )
    }

    /// Extended card, available only when an auth token is configured.
    pub fn extended_card(&self) -> Option<AgentCard> {
        self.auth_token.as_ref().map(|_| {
            let mut card = self
                .agent_card()
                .with_description("Echoes every message back as an artifact (authenticated view)");
            card.capabilities.state_transition_history = true;
            card
        })
    }
}

/// Builder for [`ServerConfig`] with environment variable support
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    host: String,
    port: u16,
    store: StoreKind,
    store_path: PathBuf,
    agent_name: String,
    agent_url: String,
    streaming: bool,
    push_notifications: bool,
    executor_work_ms: u64,
    sse_buffer: usize,
    auth_token: Option<String>,
    enable_cors: bool,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            store: StoreKind::Memory,
            store_path: PathBuf::from("parley-store.json"),
            agent_name: "Parley Reference Agent".to_string(),
            agent_url: "http://localhost:8080".to_string(),
            streaming: true,
            push_notifications: true,
            executor_work_ms: 50,
            sse_buffer: 16,
            auth_token: None,
            enable_cors: true,
        }
    }
}

impl ServerConfigBuilder {
    /// Create a new builder with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any environment variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::default();
        let vars = Vars(&lookup);

        if let Some(host) = vars.string("PARLEY_HOST") {
            builder = builder.host(host);
        }
        if let Some(port) = vars.parse::<u16>("PARLEY_PORT")? {
            builder = builder.port(port);
        }
        if let Some(store) = vars.parse::<StoreKind>("PARLEY_STORE")? {
            builder = builder.store(store);
        }
        if let Some(path) = vars.string("PARLEY_STORE_PATH") {
            builder = builder.store_path(path);
        }
        if let Some(name) = vars.string("PARLEY_AGENT_NAME") {
            builder = builder.agent_name(name);
        }
        if let Some(url) = vars.string("PARLEY_AGENT_URL") {
            builder = builder.agent_url(url);
        }
        if let Some(streaming) = vars.bool("PARLEY_STREAMING")? {
            builder = builder.streaming(streaming);
        }
        if let Some(push) = vars.bool("PARLEY_PUSH_NOTIFICATIONS")? {
            builder = builder.push_notifications(push);
        }
        if let Some(ms) = vars.parse::<u64>("PARLEY_EXECUTOR_WORK_MS")? {
            builder = builder.executor_work_ms(ms);
        }
        if let Some(frames) = vars.parse::<usize>("PARLEY_SSE_BUFFER")? {
            builder = builder.sse_buffer(frames);
        }
        if let Some(token) = vars.string("PARLEY_AUTH_TOKEN") {
            builder = builder.auth_token(Some(token));
        }
        if let Some(cors) = vars.bool("PARLEY_ENABLE_CORS")? {
            builder = builder.enable_cors(cors);
        }

        Ok(builder)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn agent_url(mut self, url: impl Into<String>) -> Self {
        self.agent_url = url.into();
        self
    }

    pub fn streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    pub fn push_notifications(mut self, enabled: bool) -> Self {
        self.push_notifications = enabled;
        self
    }

    pub fn executor_work_ms(mut self, ms: u64) -> Self {
        self.executor_work_ms = ms;
        self
    }

    pub fn sse_buffer(mut self, frames: usize) -> Self {
        self.sse_buffer = frames;
        self
    }

    pub fn auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn enable_cors(mut self, enabled: bool) -> Self {
        self.enable_cors = enabled;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        self.validate()?;

        Ok(ServerConfig {
            host: self.host,
            port: self.port,
            store: self.store,
            store_path: self.store_path,
            agent_name: self.agent_name,
            agent_url: self.agent_url,
            streaming: self.streaming,
            push_notifications: self.push_notifications,
            executor_work: Duration::from_millis(self.executor_work_ms),
            sse_buffer: self.sse_buffer,
            auth_token: self.auth_token,
            enable_cors: self.enable_cors,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "host must not be empty".to_string(),
            ));
        }
        if self.executor_work_ms > MAX_EXECUTOR_WORK_MS {
            return Err(ConfigError::ValidationError(format!(
                "executor_work_ms must be <= {MAX_EXECUTOR_WORK_MS}"
            )));
        }
        if self.sse_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "sse_buffer must be greater than 0".to_string(),
            ));
        }
        if self.agent_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent_name must not be empty".to_string(),
            ));
        }
        url::Url::parse(&self.agent_url).map_err(|e| {
            ConfigError::ValidationError(format!("agent_url '{}' is invalid: {e}", self.agent_url))
        })?;
        if self.store == StoreKind::File && self.store_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "store_path is required for the file store".to_string(),
            ));
        }
        Ok(())
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match (self.0)(key) {
            Some(val) => match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidEnvVar {
                    key: key.to_string(),
                    message: format!(
                        "invalid boolean value '{val}', expected true/false/1/0/yes/no/on/off"
                    ),
                }),
            },
            None => Ok(None),
        }
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match (self.0)(key) {
            Some(val) => val
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidEnvVar {
                    key: key.to_string(),
                    message: format!("invalid value '{val}': {e}"),
                }),
            None => Ok(None),
        }
    }
}
