use crate::KeysweepConfigLayer;
use crate::paths::{dotenv_path, project_config_path, user_config_path};
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub fn load_user_layer() -> Result<Option<KeysweepConfigLayer>> {
    match user_config_path() {
        Some(path) if path.exists() => load_from_file(&path).map(Some),
        _ => Ok(None),
    }
}

pub fn load_project_layer(
    root: &Path,
    override_path: Option<&PathBuf>,
) -> Result<Option<KeysweepConfigLayer>> {
    if let Some(path) = override_path {
        return load_from_file(path).map(Some);
    }
    let path = project_config_path(root);
    if path.exists() {
        load_from_file(&path).map(Some)
    } else {
        Ok(None)
    }
}

pub fn load_from_file(path: &Path) -> Result<KeysweepConfigLayer> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&data, path)
}

fn parse_config(data: &str, path: &Path) -> Result<KeysweepConfigLayer> {
    if path.extension().map(|ext| ext == "json").unwrap_or(false) {
        serde_json::from_str(data).with_context(|| format!("invalid json config {}", path.display()))
    } else {
        toml::from_str(data).with_context(|| format!("invalid toml config {}", path.display()))
    }
}

/// Variables from `<root>/.env`, read through the same keys as the process
/// environment. Real environment variables are applied afterwards and win.
pub fn load_dotenv_layer(root: &Path) -> Result<Option<KeysweepConfigLayer>> {
    let path = dotenv_path(root);
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let vars =
        parse_dotenv(&data).with_context(|| format!("invalid dotenv file {}", path.display()))?;
    Ok(Some(layer_from_vars(|key| vars.get(key).cloned())))
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an
/// optional `export ` prefix is accepted and matching surrounding quotes are
/// stripped from values.
pub fn parse_dotenv(data: &str) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for (idx, raw) in data.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            bail!("line {}: expected KEY=VALUE", idx + 1);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("line {}: empty key", idx + 1);
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

pub fn env_layer() -> KeysweepConfigLayer {
    layer_from_vars(|key| std::env::var(key).ok())
}

fn layer_from_vars(lookup: impl Fn(&str) -> Option<String>) -> KeysweepConfigLayer {
    let mut layer = KeysweepConfigLayer::default();

    if let Some(value) = lookup("KEYSWEEP_BIND") {
        layer.server.get_or_insert_with(Default::default).bind = Some(value);
    }

    if let Some(value) = lookup("KEYSWEEP_STORE") {
        layer.store.get_or_insert_with(Default::default).kind = Some(value);
    }
    if let Some(value) = lookup("KEYSWEEP_ROOT") {
        layer.store.get_or_insert_with(Default::default).root = Some(value);
    }

    if let Some(value) = lookup("VAULT_ADDR").or_else(|| lookup("VAULT_ADDRESS")) {
        layer.vault.get_or_insert_with(Default::default).address = Some(value);
    }
    if let Some(value) = lookup("VAULT_TOKEN") {
        layer.vault.get_or_insert_with(Default::default).token = Some(value);
    }
    if let Some(value) = lookup("VAULT_NAMESPACE") {
        layer.vault.get_or_insert_with(Default::default).namespace = Some(value);
    }
    if let Some(parsed) =
        lookup("VAULT_HTTP_TIMEOUT_SECS").and_then(|value| value.parse::<u64>().ok())
    {
        layer.vault.get_or_insert_with(Default::default).timeout_secs = Some(parsed);
    }
    if let Some(value) = lookup("VAULT_CA_BUNDLE") {
        layer.vault.get_or_insert_with(Default::default).ca_bundle = Some(PathBuf::from(value));
    }
    if let Some(value) = lookup("VAULT_INSECURE_SKIP_TLS") {
        layer
            .vault
            .get_or_insert_with(Default::default)
            .insecure_skip_tls = Some(value == "1" || value.eq_ignore_ascii_case("true"));
    }

    if let Some(parsed) = lookup("KEYSWEEP_MAX_DEPTH").and_then(|value| value.parse::<usize>().ok())
    {
        layer.rotation.get_or_insert_with(Default::default).max_depth = Some(parsed);
    }
    if let Some(value) = lookup("KEYSWEEP_WRITE_ERROR_ATTRIBUTION") {
        layer
            .rotation
            .get_or_insert_with(Default::default)
            .write_error_attribution = Some(value);
    }

    if let Some(value) = lookup("KEYSWEEP_LOG_FORMAT") {
        layer.telemetry.get_or_insert_with(Default::default).format = Some(value);
    }
    if let Some(value) = lookup("KEYSWEEP_LOG") {
        layer.telemetry.get_or_insert_with(Default::default).filter = Some(value);
    }

    layer
}
