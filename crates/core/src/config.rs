use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use strum::{Display, EnumString};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while assembling the process-wide configuration.
///
/// All of these are fatal at startup: the adapter never opens its channel
/// without a valid [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("A secret key is required (set HYPERLIQUID_SECRET_KEY or pass --secret-key)")]
    MissingSecretKey,
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Which Hyperliquid deployment the bridge talks to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

// ---------------------------------------------------------------------------
// Bridge process settings
// ---------------------------------------------------------------------------

/// How to launch the SDK bridge subprocess.
///
/// The full command line is `<program> <args...> <command> <flags...>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Executable to spawn (e.g. "python3").
    pub program: String,
    /// Arguments placed before the bridge command (e.g. the script path).
    pub args: Vec<String>,
    /// Kill the subprocess if it runs longer than this. Unlimited when unset.
    pub timeout_secs: Option<u64>,
    /// Cap on simultaneously running subprocesses. Unlimited when unset.
    pub max_concurrent_calls: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["hyperliquid_bridge.py".to_string()],
            timeout_secs: None,
            max_concurrent_calls: None,
        }
    }
}

impl BridgeConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Optional TOML settings file (`--config`).
///
/// Credentials are deliberately absent: they only come from flags or the
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub bridge: BridgeConfig,
}

impl SettingsFile {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Immutable process-wide configuration, built once at startup and shared
/// by reference with everything that needs credentials.
#[derive(Clone)]
pub struct Config {
    secret_key: String,
    account_address: Option<String>,
    network: Network,
    bridge: BridgeConfig,
}

impl Config {
    /// Validate and build the configuration.
    ///
    /// Blank values are treated as absent; a blank secret key is an error.
    pub fn new(
        secret_key: impl Into<String>,
        account_address: Option<String>,
        network: Network,
        bridge: BridgeConfig,
    ) -> Result<Self, ConfigError> {
        let secret_key = secret_key.into().trim().to_string();
        if secret_key.is_empty() {
            return Err(ConfigError::MissingSecretKey);
        }

        let account_address = account_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        Ok(Self {
            secret_key,
            account_address,
            network,
            bridge,
        })
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn account_address(&self) -> Option<&str> {
        self.account_address.as_deref()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn bridge(&self) -> &BridgeConfig {
        &self.bridge
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret_key", &"<redacted>")
            .field("account_address", &self.account_address)
            .field("network", &self.network)
            .field("bridge", &self.bridge)
            .finish()
    }
}
