use keysweep_core::{DEFAULT_ROOT, WriteErrorAttribution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub type ProvenancePath = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Default,
    UserConfig,
    ProjectConfig,
    OverrideConfig,
    DotEnv,
    Env,
    Cli,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct KeysweepConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub vault: VaultSettings,
    pub rotation: RotationConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Vault,
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Vault => f.write_str("vault"),
            StoreKind::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vault" => Ok(StoreKind::Vault),
            "memory" | "mem" => Ok(StoreKind::Memory),
            other => Err(anyhow::anyhow!("unknown store kind `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Container searched when a request leaves `base_path` empty.
    pub root: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            root: DEFAULT_ROOT.to_string(),
        }
    }
}

#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct VaultSettings {
    pub address: Option<String>,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub timeout_secs: u64,
    pub ca_bundle: Option<PathBuf>,
    pub insecure_skip_tls: bool,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: None,
            token: None,
            namespace: None,
            timeout_secs: 15,
            ca_bundle: None,
            insecure_skip_tls: false,
        }
    }
}

impl fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSettings")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .field("timeout_secs", &self.timeout_secs)
            .field("ca_bundle", &self.ca_bundle)
            .field("insecure_skip_tls", &self.insecure_skip_tls)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct RotationConfig {
    pub max_depth: Option<usize>,
    pub write_error_attribution: WriteErrorAttribution,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(anyhow::anyhow!("unknown log format `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub filter: Option<String>,
}
