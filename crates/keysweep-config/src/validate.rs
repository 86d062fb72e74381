use crate::{KeysweepConfig, StoreKind};

/// Non-fatal observations about a resolved configuration.
pub fn validate(cfg: &KeysweepConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let uses_vault = cfg.store.kind == StoreKind::Vault;

    if uses_vault && cfg.vault.insecure_skip_tls {
        warnings.push("vault.insecure_skip_tls is enabled; certificates are not verified".into());
    }
    if uses_vault && cfg.vault.token.as_deref().is_none_or(str::is_empty) {
        warnings.push("vault.token is not set; set VAULT_TOKEN".into());
    }
    if uses_vault && cfg.vault.address.is_none() {
        warnings.push("vault.address is not set; set VAULT_ADDR".into());
    }
    if uses_vault && cfg.vault.timeout_secs < 2 {
        warnings.push(format!(
            "vault.timeout_secs={} is very low",
            cfg.vault.timeout_secs
        ));
    }
    if !uses_vault && cfg.vault.address.is_some() {
        warnings.push(format!(
            "vault.address is configured but store.kind={} (unused)",
            cfg.store.kind
        ));
    }
    if cfg.rotation.max_depth == Some(0) {
        warnings.push("rotation.max_depth=0 disables subdirectory traversal".into());
    }
    if cfg.store.root.trim_matches('/').is_empty() {
        warnings.push("store.root is empty; requests without base_path search nothing".into());
    }

    warnings
}
