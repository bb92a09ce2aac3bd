use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENDPOINT_ENV: &str = "PRODUCTPULSE_ENDPOINT";
const REGION_ENV: &str = "PRODUCTPULSE_REGION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Chat endpoint of the agent proxy.
    pub endpoint: String,
    /// Region tag forwarded to the agent. Unset means the client default.
    pub region: Option<String>,
    /// `0` disables the connect timeout.
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole streamed answer; a longer answer is cut off
    /// with an error. `0` disables it.
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/chat".to_string(),
            region: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
        }
    }
}

impl AgentConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        secs(self.request_timeout_secs)
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load the user config file and apply environment overrides.
    ///
    /// A missing file yields the defaults. An unreadable or invalid file also
    /// falls back to the defaults and the error is returned alongside, so the
    /// caller can report it; environment overrides apply in every case.
    pub fn load() -> (Self, Option<ConfigError>) {
        Self::resolve(&config_path(), |key| std::env::var(key).ok())
    }

    pub fn resolve(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> (Self, Option<ConfigError>) {
        let (mut config, error) = match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        };
        config.apply_env(lookup);
        (config, error)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Apply environment overrides. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.trim().is_empty()) {
            self.agent.endpoint = endpoint;
        }
        if let Some(region) = lookup(REGION_ENV).filter(|v| !v.trim().is_empty()) {
            self.agent.region = Some(region);
        }
    }
}

pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("productpulse").join("config.toml")
}
