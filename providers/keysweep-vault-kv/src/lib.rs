//! HashiCorp Vault secret store using the live Vault HTTP API.
//!
//! Paths handed to the store are logical Vault paths (`secret/data/app/db`,
//! `kv/team/api`); the store prefixes them with `/v1/` and does not interpret
//! mounts. KV v1 and KV v2 engines are both reachable this way because the
//! caller decides which address variant to try.

use anyhow::{Context, Result};
use keysweep_core::{SecretPayload, SecretStore, StoreError, StoreResult};
use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const LOOKUP_SELF_PATH: &str = "auth/token/lookup-self";

/// Connection settings for one Vault server. Immutable once the store is built.
#[derive(Clone)]
pub struct VaultConfig {
    address: String,
    token: String,
    namespace: Option<String>,
    timeout: Duration,
    ca_bundle: Option<Vec<u8>>,
    insecure_skip_tls: bool,
}

impl VaultConfig {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
            namespace: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            ca_bundle: None,
            insecure_skip_tls: false,
        }
    }

    /// Build the configuration from `VAULT_*` environment variables.
    ///
    /// `VAULT_ADDRESS` is accepted as a fallback for `VAULT_ADDR`.
    pub fn from_env() -> Result<Self> {
        let address = std::env::var("VAULT_ADDR")
            .or_else(|_| std::env::var("VAULT_ADDRESS"))
            .context("set VAULT_ADDR to the Vault server URL")?;
        let token =
            std::env::var("VAULT_TOKEN").context("set VAULT_TOKEN for Vault authentication")?;
        let timeout = std::env::var("VAULT_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let insecure_skip_tls = std::env::var("VAULT_INSECURE_SKIP_TLS")
            .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        let mut config = Self::new(address, token)
            .with_namespace(std::env::var("VAULT_NAMESPACE").ok())
            .with_timeout(timeout)
            .insecure_skip_tls(insecure_skip_tls);
        if let Ok(path) = std::env::var("VAULT_CA_BUNDLE") {
            config = config.with_ca_bundle_file(path)?;
        }
        Ok(config)
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// PEM or DER encoded certificate trusted in addition to the system roots.
    pub fn with_ca_bundle(mut self, bundle: Vec<u8>) -> Self {
        self.ca_bundle = Some(bundle);
        self
    }

    pub fn with_ca_bundle_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bundle = fs::read(path)
            .with_context(|| format!("failed to read CA bundle {}", path.display()))?;
        Ok(self.with_ca_bundle(bundle))
    }

    pub fn insecure_skip_tls(mut self, skip: bool) -> Self {
        self.insecure_skip_tls = skip;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_http_client(&self) -> Result<Client> {
        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(ca) = self.ca_bundle.as_ref() {
            let cert = reqwest::Certificate::from_pem(ca)
                .or_else(|_| reqwest::Certificate::from_der(ca))
                .context("failed to parse Vault CA bundle")?;
            builder = builder.add_root_certificate(cert);
        }
        if self.insecure_skip_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder.build().context("failed to build Vault HTTP client")
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .field("ca_bundle", &self.ca_bundle.as_ref().map(Vec::len))
            .field("insecure_skip_tls", &self.insecure_skip_tls)
            .finish()
    }
}

/// [`SecretStore`] backed by Vault's logical HTTP API.
#[derive(Clone)]
pub struct VaultKvStore {
    config: Arc<VaultConfig>,
    client: Client,
}

impl VaultKvStore {
    pub fn new(config: VaultConfig) -> Result<Self> {
        let client = config.build_http_client()?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&SecretPayload>,
    ) -> StoreResult<Response> {
        let url = self.config.url(path);
        debug!(%method, %url, "vault request");
        let mut builder = self
            .client
            .request(method, url)
            .header("X-Vault-Token", &self.config.token);
        if let Some(namespace) = &self.config.namespace {
            builder = builder.header("X-Vault-Namespace", namespace);
        }
        if let Some(payload) = body {
            builder = builder.json(payload);
        }
        builder
            .send()
            .map_err(|err| StoreError::Transport(format!("vault request failed: {err}")))
    }
}

impl SecretStore for VaultKvStore {
    fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        let method = Method::from_bytes(b"LIST")
            .map_err(|err| StoreError::Transport(format!("LIST method unsupported: {err}")))?;
        let response = self.request(method, path, None)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let list: ListResponse = decode(response)?;
                Ok(list
                    .data
                    .and_then(|data| data.keys)
                    .filter(|keys| !keys.is_empty()))
            }
            _ => Err(status_error(path, response)),
        }
    }

    fn read(&self, path: &str) -> StoreResult<Option<SecretPayload>> {
        let response = self.request(Method::GET, path, None)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let read: ReadResponse = decode(response)?;
                Ok(match read.data {
                    Some(Value::Object(data)) => Some(data),
                    _ => None,
                })
            }
            _ => Err(status_error(path, response)),
        }
    }

    fn write(&self, path: &str, payload: SecretPayload) -> StoreResult<()> {
        let response = self.request(Method::POST, path, Some(&payload))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(path, response))
        }
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        let response = self.request(Method::DELETE, path, None)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(path, response))
        }
    }

    fn probe(&self) -> StoreResult<()> {
        let response = self
            .request(Method::GET, LOOKUP_SELF_PATH, None)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(StoreError::Unavailable(format!(
            "token lookup failed: {status} {body}"
        )))
    }
}

#[derive(Deserialize)]
struct ListResponse {
    data: Option<ListData>,
}

#[derive(Deserialize)]
struct ListData {
    keys: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ReadResponse {
    data: Option<Value>,
}

fn decode<T>(response: Response) -> StoreResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    let body = response.text().unwrap_or_default();
    serde_json::from_str(&body)
        .map_err(|err| StoreError::Decode(format!("{err}; body={body}")))
}

fn status_error(path: &str, response: Response) -> StoreError {
    let status = response.status();
    match status {
        StatusCode::FORBIDDEN => StoreError::PermissionDenied {
            path: path.to_string(),
        },
        StatusCode::NOT_FOUND => StoreError::NotFound {
            path: path.to_string(),
        },
        _ => StoreError::Status {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        },
    }
}
