//! Configuration loading and port resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_PORT;

/// Environment variable overriding the state server port.
pub const PORT_ENV_VAR: &str = "GAUGELINK_STATE_PORT";

/// Top-level Gaugelink configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Substitute `${ENV_VAR}` references in raw config text.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}

/// Parse an env-provided port string, accepting only integers strictly
/// between 0 and 65536.
fn parse_port_override(raw: &str) -> Option<u16> {
    match raw.trim().parse::<u32>() {
        Ok(p) if p > 0 && p < 65536 => Some(p as u16),
        _ => None,
    }
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the default config.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::GaugelinkError::Io)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::GaugelinkError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gaugelink")
            .join("config.json")
    }

    /// Resolve the server port: `GAUGELINK_STATE_PORT` env override wins,
    /// then the config file, then [`DEFAULT_PORT`]. Invalid overrides are
    /// ignored with a warning.
    pub fn server_port(&self) -> u16 {
        if let Ok(raw) = std::env::var(PORT_ENV_VAR) {
            match parse_port_override(&raw) {
                Some(port) => return port,
                None => {
                    tracing::warn!(value = %raw, "Ignoring invalid {PORT_ENV_VAR}");
                }
            }
        }

        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT)
    }
}
