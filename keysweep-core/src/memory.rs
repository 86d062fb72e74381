//! In-memory secret store that mimics Vault's logical API.
//!
//! Mounts registered with [`MemoryStore::with_versioned_mount`] behave like
//! KV v2 engines: values live under `<mount>/data/...`, listings and
//! metadata under `<mount>/metadata/...`, and reads return the value wrapped in
//! a `data` object. Every other mount behaves like a KV v1 engine where the
//! plain path is used for everything.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::path::{SEPARATOR, normalize};
use crate::store::{SecretPayload, SecretStore};

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    versioned_mounts: BTreeSet<String>,
    versioned: BTreeMap<String, VersionedEntry>,
    flat: BTreeMap<String, SecretPayload>,
    failing_writes: BTreeSet<String>,
    unavailable: Option<String>,
    writes: usize,
}

#[derive(Clone)]
struct VersionedEntry {
    version: u64,
    deleted: bool,
    data: SecretPayload,
}

enum Address {
    Data(String),
    Metadata(String),
    Flat(String),
    Invalid(String),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mount` as a versioned (KV v2) engine.
    pub fn with_versioned_mount(self, mount: &str) -> Self {
        self.state
            .write()
            .versioned_mounts
            .insert(mount.trim_matches(SEPARATOR).to_string());
        self
    }

    /// Store a payload without touching the write counter or failure injection.
    pub fn seed(&self, path: &str, payload: SecretPayload) {
        let mut state = self.state.write();
        let address = state.resolve(path);
        if let Err(err) = state.store(address, payload) {
            debug!(path, error = %err, "seed ignored");
        }
    }

    /// Make every subsequent write to `path` fail.
    pub fn fail_writes_to(&self, path: &str) {
        self.state.write().failing_writes.insert(normalize(path));
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.state.write().unavailable = reason.map(str::to_string);
    }

    /// Number of successful writes since construction.
    pub fn writes(&self) -> usize {
        self.state.read().writes
    }

    fn check_available(&self) -> StoreResult<()> {
        match &self.state.read().unavailable {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl State {
    fn resolve(&self, path: &str) -> Address {
        let path = normalize(path).trim_start_matches(SEPARATOR).to_string();
        let (mount, rest) = path.split_once(SEPARATOR).unwrap_or((path.as_str(), ""));
        if !self.versioned_mounts.contains(mount) {
            return Address::Flat(path);
        }
        let (kind, key) = rest.split_once(SEPARATOR).unwrap_or((rest, ""));
        let logical = if key.is_empty() {
            mount.to_string()
        } else {
            format!("{mount}{SEPARATOR}{key}")
        };
        match kind {
            "data" => Address::Data(logical),
            "metadata" => Address::Metadata(logical),
            _ => Address::Invalid(path),
        }
    }

    fn store(&mut self, address: Address, mut payload: SecretPayload) -> StoreResult<()> {
        match address {
            Address::Flat(path) => {
                self.flat.insert(path, payload);
                Ok(())
            }
            Address::Data(key) => {
                let data = match payload.remove("data") {
                    Some(Value::Object(data)) => data,
                    _ => return Err(StoreError::Rejected("no data provided".into())),
                };
                let entry = self.versioned.entry(key).or_insert(VersionedEntry {
                    version: 0,
                    deleted: false,
                    data: SecretPayload::new(),
                });
                entry.version += 1;
                entry.deleted = false;
                entry.data = data;
                Ok(())
            }
            Address::Metadata(key) | Address::Invalid(key) => Err(StoreError::Rejected(format!(
                "unsupported write path {key}"
            ))),
        }
    }
}

/// Immediate children of `prefix` among `keys`; containers end with `/`.
fn children<'a>(prefix: &str, keys: impl Iterator<Item = &'a String>) -> Option<Vec<String>> {
    let prefix = format!("{}{SEPARATOR}", prefix.trim_end_matches(SEPARATOR));
    let names: BTreeSet<String> = keys
        .filter_map(|key| key.strip_prefix(prefix.as_str()))
        .filter(|rest| !rest.is_empty())
        .map(|rest| match rest.split_once(SEPARATOR) {
            Some((dir, _)) => format!("{dir}{SEPARATOR}"),
            None => rest.to_string(),
        })
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.into_iter().collect())
    }
}

fn as_payload(value: Value) -> SecretPayload {
    match value {
        Value::Object(map) => map,
        _ => SecretPayload::new(),
    }
}

impl SecretStore for MemoryStore {
    fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(match state.resolve(path) {
            Address::Metadata(prefix) => children(&prefix, state.versioned.keys()),
            Address::Flat(prefix) => children(&prefix, state.flat.keys()),
            Address::Data(_) | Address::Invalid(_) => None,
        })
    }

    fn read(&self, path: &str) -> StoreResult<Option<SecretPayload>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(match state.resolve(path) {
            Address::Flat(key) => state.flat.get(&key).cloned(),
            Address::Data(key) => state.versioned.get(&key).map(|entry| {
                let data = if entry.deleted {
                    Value::Null
                } else {
                    Value::Object(entry.data.clone())
                };
                as_payload(json!({
                    "data": data,
                    "metadata": {
                        "version": entry.version,
                        "destroyed": false,
                    },
                }))
            }),
            Address::Metadata(key) => state.versioned.get(&key).map(|entry| {
                let mut versions = SecretPayload::new();
                versions.insert(entry.version.to_string(), json!({ "destroyed": false }));
                as_payload(json!({
                    "current_version": entry.version,
                    "max_versions": 0,
                    "versions": versions,
                }))
            }),
            Address::Invalid(_) => None,
        })
    }

    fn write(&self, path: &str, payload: SecretPayload) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write();
        let normalized = normalize(path);
        if state.failing_writes.contains(&normalized) {
            return Err(StoreError::PermissionDenied { path: normalized });
        }
        let address = state.resolve(path);
        state.store(address, payload)?;
        state.writes += 1;
        Ok(())
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write();
        match state.resolve(path) {
            Address::Flat(key) => {
                state.flat.remove(&key);
            }
            Address::Metadata(key) => {
                state.versioned.remove(&key);
            }
            Address::Data(key) => {
                if let Some(entry) = state.versioned.get_mut(&key) {
                    entry.deleted = true;
                }
            }
            Address::Invalid(key) => {
                return Err(StoreError::Rejected(format!("unsupported delete path {key}")));
            }
        }
        Ok(())
    }

    fn probe(&self) -> StoreResult<()> {
        self.check_available()
    }
}
