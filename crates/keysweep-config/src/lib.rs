mod explain;
mod loaders;
mod merge;
mod paths;
mod types;
mod validate;

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use explain::ExplainReport;
pub use loaders::{load_from_file, parse_dotenv};
pub use types::{
    ConfigSource, KeysweepConfig, KeysweepConfig as Config, LogFormat, ProvenancePath,
    RotationConfig, ServerConfig, StoreConfig, StoreKind, TelemetryConfig, VaultSettings,
};
pub use validate::validate;

pub type ProvenanceMap = BTreeMap<ProvenancePath, ConfigSource>;

/// One configuration source; unset fields leave lower layers untouched.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeysweepConfigLayer {
    pub server: Option<ServerLayer>,
    pub store: Option<StoreLayer>,
    pub vault: Option<VaultLayer>,
    pub rotation: Option<RotationLayer>,
    pub telemetry: Option<TelemetryLayer>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerLayer {
    pub bind: Option<String>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreLayer {
    pub kind: Option<String>,
    pub root: Option<String>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultLayer {
    pub address: Option<String>,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub timeout_secs: Option<u64>,
    pub ca_bundle: Option<PathBuf>,
    pub insecure_skip_tls: Option<bool>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationLayer {
    pub max_depth: Option<usize>,
    pub write_error_attribution: Option<String>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryLayer {
    pub format: Option<String>,
    pub filter: Option<String>,
}

#[derive(Default, Debug, Clone)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub store: Option<String>,
    pub root: Option<String>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = Some(bind.into());
        self
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }
}

pub struct ConfigResolver {
    project_root: PathBuf,
    cli_overrides: CliOverrides,
    user_config: bool,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self {
            project_root: paths::default_project_root(),
            cli_overrides: CliOverrides::default(),
            user_config: true,
        }
    }

    pub fn with_project_root(mut self, root: PathBuf) -> Self {
        self.project_root = root;
        self
    }

    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        self.cli_overrides = overrides;
        self
    }

    /// Skip `$XDG_CONFIG_HOME/keysweep/config.toml`.
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    pub fn load(&self) -> Result<ResolvedConfig> {
        let mut config = KeysweepConfig::default();
        let mut provenance = default_provenance();

        if self.user_config
            && let Some(user_layer) = loaders::load_user_layer()?
        {
            merge::apply_layer(
                &mut config,
                user_layer,
                ConfigSource::UserConfig,
                &mut provenance,
            )?;
        }

        let override_path = self.cli_overrides.config_path.as_ref();
        if let Some(project_layer) = loaders::load_project_layer(&self.project_root, override_path)?
        {
            let source = if override_path.is_some() {
                ConfigSource::OverrideConfig
            } else {
                ConfigSource::ProjectConfig
            };
            merge::apply_layer(&mut config, project_layer, source, &mut provenance)?;
        }

        if let Some(dotenv_layer) = loaders::load_dotenv_layer(&self.project_root)? {
            merge::apply_layer(
                &mut config,
                dotenv_layer,
                ConfigSource::DotEnv,
                &mut provenance,
            )?;
        }

        merge::apply_layer(
            &mut config,
            loaders::env_layer(),
            ConfigSource::Env,
            &mut provenance,
        )?;

        if let Some(cli_layer) = cli_layer(&self.cli_overrides) {
            merge::apply_layer(&mut config, cli_layer, ConfigSource::Cli, &mut provenance)?;
        }

        if let Some(bundle) = config.vault.ca_bundle.take() {
            config.vault.ca_bundle = Some(paths::absolutize(bundle, &self.project_root));
        }
        let warnings = validate::validate(&config);

        Ok(ResolvedConfig {
            config,
            provenance,
            warnings,
        })
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn cli_layer(overrides: &CliOverrides) -> Option<KeysweepConfigLayer> {
    let mut layer = KeysweepConfigLayer::default();
    if let Some(bind) = overrides.bind.as_ref() {
        layer.server.get_or_insert_with(Default::default).bind = Some(bind.clone());
    }
    if let Some(kind) = overrides.store.as_ref() {
        layer.store.get_or_insert_with(Default::default).kind = Some(kind.clone());
    }
    if let Some(root) = overrides.root.as_ref() {
        layer.store.get_or_insert_with(Default::default).root = Some(root.clone());
    }
    if layer.server.is_some() || layer.store.is_some() {
        Some(layer)
    } else {
        None
    }
}

fn default_provenance() -> ProvenanceMap {
    static DEFAULT_PATHS: Lazy<&'static [&'static str]> = Lazy::new(|| {
        &[
            "server.bind",
            "store.kind",
            "store.root",
            "vault.address",
            "vault.token",
            "vault.namespace",
            "vault.timeout_secs",
            "vault.ca_bundle",
            "vault.insecure_skip_tls",
            "rotation.max_depth",
            "rotation.write_error_attribution",
            "telemetry.format",
            "telemetry.filter",
        ]
    });
    let mut map = ProvenanceMap::new();
    for path in DEFAULT_PATHS.iter() {
        map.insert(path.to_string(), ConfigSource::Default);
    }
    map
}

pub struct ResolvedConfig {
    pub config: KeysweepConfig,
    pub provenance: ProvenanceMap,
    pub warnings: Vec<String>,
}

impl ResolvedConfig {
    pub fn explain(&self) -> ExplainReport {
        ExplainReport::new(
            self.config.clone(),
            self.provenance.clone(),
            self.warnings.clone(),
        )
    }
}
