use crate::{
    ConfigSource, KeysweepConfig, KeysweepConfigLayer, LogFormat, ProvenanceMap, RotationLayer,
    ServerLayer, StoreKind, StoreLayer, TelemetryLayer, VaultLayer,
};
use anyhow::{Context, Result};
use keysweep_core::WriteErrorAttribution;
use std::net::SocketAddr;

/// Overlay `layer` onto `config`, recording `source` for every field it sets.
///
/// Values are parsed before anything is written, so a rejected layer leaves
/// both `config` and `provenance` untouched.
pub fn apply_layer(
    config: &mut KeysweepConfig,
    layer: KeysweepConfigLayer,
    source: ConfigSource,
    provenance: &mut ProvenanceMap,
) -> Result<()> {
    let server = layer.server.map(parse_server).transpose()?;
    let store = layer.store.map(parse_store).transpose()?;
    let rotation = layer.rotation.map(parse_rotation).transpose()?;
    let telemetry = layer.telemetry.map(parse_telemetry).transpose()?;

    let mut set = |path: &str| {
        provenance.insert(path.to_string(), source.clone());
    };

    if let Some(bind) = server.flatten() {
        config.server.bind = bind;
        set("server.bind");
    }
    if let Some((kind, root)) = store {
        if let Some(kind) = kind {
            config.store.kind = kind;
            set("store.kind");
        }
        if let Some(root) = root {
            config.store.root = root;
            set("store.root");
        }
    }
    if let Some(vault) = layer.vault {
        apply_vault(config, vault, &mut set);
    }
    if let Some((max_depth, attribution)) = rotation {
        if let Some(max_depth) = max_depth {
            config.rotation.max_depth = Some(max_depth);
            set("rotation.max_depth");
        }
        if let Some(attribution) = attribution {
            config.rotation.write_error_attribution = attribution;
            set("rotation.write_error_attribution");
        }
    }
    if let Some((format, filter)) = telemetry {
        if let Some(format) = format {
            config.telemetry.format = format;
            set("telemetry.format");
        }
        if let Some(filter) = filter {
            config.telemetry.filter = Some(filter);
            set("telemetry.filter");
        }
    }

    Ok(())
}

fn parse_server(layer: ServerLayer) -> Result<Option<SocketAddr>> {
    layer
        .bind
        .map(|bind| {
            bind.trim()
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid server.bind `{bind}`"))
        })
        .transpose()
}

fn parse_store(layer: StoreLayer) -> Result<(Option<StoreKind>, Option<String>)> {
    let kind = layer
        .kind
        .map(|kind| kind.parse::<StoreKind>())
        .transpose()?;
    let root = layer
        .root
        .map(|root| root.trim().trim_matches('/').to_string());
    Ok((kind, root))
}

fn parse_rotation(
    layer: RotationLayer,
) -> Result<(Option<usize>, Option<WriteErrorAttribution>)> {
    let attribution = layer
        .write_error_attribution
        .map(|value| {
            value
                .parse::<WriteErrorAttribution>()
                .map_err(anyhow::Error::msg)
        })
        .transpose()?;
    Ok((layer.max_depth, attribution))
}

fn parse_telemetry(layer: TelemetryLayer) -> Result<(Option<LogFormat>, Option<String>)> {
    let format = layer
        .format
        .map(|format| format.parse::<LogFormat>())
        .transpose()?;
    let filter = layer.filter.filter(|filter| !filter.trim().is_empty());
    Ok((format, filter))
}

fn apply_vault(config: &mut KeysweepConfig, layer: VaultLayer, set: &mut impl FnMut(&str)) {
    let target = &mut config.vault;
    if let Some(value) = layer.address.filter(|v| !v.trim().is_empty()) {
        target.address = Some(value);
        set("vault.address");
    }
    if let Some(value) = layer.token.filter(|v| !v.is_empty()) {
        target.token = Some(value);
        set("vault.token");
    }
    if let Some(value) = layer.namespace {
        target.namespace = Some(value).filter(|v| !v.trim().is_empty());
        set("vault.namespace");
    }
    if let Some(value) = layer.timeout_secs.filter(|v| *v > 0) {
        target.timeout_secs = value;
        set("vault.timeout_secs");
    }
    if let Some(value) = layer.ca_bundle {
        target.ca_bundle = Some(value);
        set("vault.ca_bundle");
    }
    if let Some(value) = layer.insecure_skip_tls {
        target.insecure_skip_tls = value;
        set("vault.insecure_skip_tls");
    }
}
