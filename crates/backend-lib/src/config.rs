// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub ai: AiSettings,
}

/// Server bind and CORS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind host
    pub host: IpAddr,
    /// Bind port
    pub port: u16,
    /// Allowed CORS origins; a `"*"` entry allows any origin
    pub cors_allowed_origins: Vec<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default log filter, overridable via `RUST_LOG`
    pub level: String,
}

/// Completion backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// API key for the Generative Language service. Absent key means the
    /// assistant surface reports unavailable.
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Upper bound applied to every backend call
    pub request_timeout_secs: u64,
    /// Completion length cap passed to the backend
    pub max_output_tokens: u32,
    /// How long resolved or stale suggestions stay in the working set
    pub suggestion_retention_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            ai: AiSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash-exp".to_string(),
            request_timeout_secs: 30,
            max_output_tokens: 2048,
            suggestion_retention_secs: 600,
        }
    }
}

impl Settings {
    /// Load settings from config files in the working directory, then
    /// `CODEROOM_`-prefixed environment variables, on top of the defaults.
    /// Missing files contribute nothing.
    pub fn load() -> Result<Self, figment::Error> {
        Self::base_figment()
            .merge(Toml::file("config/default.toml"))
            .merge(Toml::file("config.toml"))
            .merge(Yaml::file("config.yaml"))
            .merge(Json::file("config.json"))
            .merge(Env::prefixed("CODEROOM_").split("__"))
            .extract()
    }

    /// Load settings from an explicit TOML file plus the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::base_figment()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CODEROOM_").split("__"))
            .extract()
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    /// Socket address the server binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}
