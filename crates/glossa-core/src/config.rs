//! Configuration system for Glossa.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $GLOSSA_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/glossa/config.toml
//!   3. ~/.config/glossa/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossaConfig {
    pub api: ApiConfig,
    pub registry: RegistryConfig,
    pub ledger: LedgerConfig,
    pub liveness: LivenessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address for the HTTP API.
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Drop mappings this old even if never terminated. 0 = never.
    pub mapping_ttl_secs: u64,
    /// How often the purge loop wakes.
    pub purge_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the escrow backend.
    pub rpc_url: String,
    /// Escrow account the backend scopes queries to. Empty = unconfigured,
    /// which forces fallback mode.
    pub escrow_address: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Serve estimated settlements when the backend is unreachable.
    pub allow_fallback: bool,
    /// Decimals of the escrow token.
    pub decimals: u8,
    /// Display code for the escrow token.
    pub currency: String,
    /// Profile cache TTL. 0 = cache disabled.
    pub profile_cache_ttl_secs: u64,
    /// Re-verification polls before trusting a client-reported end.
    pub verify_attempts: u32,
    /// Delay between re-verification polls.
    pub verify_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Seconds a room may sit empty before the daemon terminates it.
    pub grace_secs: u64,
    /// How often the sweep loop wakes.
    pub sweep_interval_secs: u64,
    /// Heartbeats older than this mark a participant stale.
    pub stale_after_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for GlossaConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            registry: RegistryConfig::default(),
            ledger: LedgerConfig::default(),
            liveness: LivenessConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mapping_ttl_secs: 86_400,
            purge_interval_secs: 60,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            escrow_address: String::new(),
            request_timeout_secs: 10,
            allow_fallback: true,
            decimals: 6,
            currency: "PYUSD".to_string(),
            profile_cache_ttl_secs: 300,
            verify_attempts: 5,
            verify_interval_ms: 1_000,
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            grace_secs: 30,
            sweep_interval_secs: 60,
            stale_after_secs: 120,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("glossa")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl GlossaConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            GlossaConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("GLOSSA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&GlossaConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply GLOSSA_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GLOSSA_API__BIND") {
            self.api.bind = v;
        }
        if let Ok(v) = std::env::var("GLOSSA_API__PORT") {
            if let Ok(p) = v.parse() {
                self.api.port = p;
            }
        }
        if let Ok(v) = std::env::var("GLOSSA_LEDGER__RPC_URL") {
            self.ledger.rpc_url = v;
        }
        if let Ok(v) = std::env::var("GLOSSA_LEDGER__ESCROW_ADDRESS") {
            self.ledger.escrow_address = v;
        }
        if let Ok(v) = std::env::var("GLOSSA_LEDGER__ALLOW_FALLBACK") {
            self.ledger.allow_fallback = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("GLOSSA_REGISTRY__MAPPING_TTL_SECS") {
            if let Ok(n) = v.parse() {
                self.registry.mapping_ttl_secs = n;
            }
        }
        if let Ok(v) = std::env::var("GLOSSA_LIVENESS__GRACE_SECS") {
            if let Ok(n) = v.parse() {
                self.liveness.grace_secs = n;
            }
        }
        if let Ok(v) = std::env::var("GLOSSA_LIVENESS__STALE_AFTER_SECS") {
            if let Ok(n) = v.parse() {
                self.liveness.stale_after_secs = n;
            }
        }
    }
}
