use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RotationError;
use crate::path::normalize;
use crate::processor::{RotationResult, Substitution};
use crate::store::SecretStore;
use crate::walker::{TreeWalker, WalkOptions};

/// Container searched when a request does not name one.
pub const DEFAULT_ROOT: &str = "secret";

/// Whether a rotation only reports matches or also rewrites them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    #[default]
    List,
    Edit,
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::List => "list",
            OperationMode::Edit => "edit",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = RotationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(OperationMode::List),
            "edit" => Ok(OperationMode::Edit),
            _ => Err(RotationError::InvalidMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationRequest {
    pub base_path: String,
    pub old_value: String,
    pub new_value: Option<String>,
    pub mode: OperationMode,
}

impl RotationRequest {
    pub fn list(base_path: impl Into<String>, old_value: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            old_value: old_value.into(),
            new_value: None,
            mode: OperationMode::List,
        }
    }

    pub fn edit(
        base_path: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            old_value: old_value.into(),
            new_value: Some(new_value.into()),
            mode: OperationMode::Edit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationSummary {
    pub matches: usize,
    pub failed: usize,
    pub message: String,
}

impl RotationSummary {
    fn new(mode: OperationMode, updates: &[RotationResult]) -> Self {
        let matches = updates.len();
        let failed = updates.iter().filter(|update| update.is_failed()).count();
        let message = match (matches, mode) {
            (0, _) => "no matching password found".to_string(),
            (n, OperationMode::List) => {
                format!("found {n} occurrences of the password (list mode, nothing changed)")
            }
            (n, OperationMode::Edit) if failed == 0 => {
                format!("updated {n} occurrences of the password")
            }
            (n, OperationMode::Edit) => {
                format!("updated {n} occurrences of the password, {failed} failed to write")
            }
        };
        Self {
            matches,
            failed,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    pub mode: OperationMode,
    pub updates: Vec<RotationResult>,
    pub summary: RotationSummary,
}

/// Entry point for credential rotations against one store.
pub struct Rotator<S> {
    store: S,
    root: String,
    options: WalkOptions,
}

impl<S> Rotator<S>
where
    S: SecretStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            root: DEFAULT_ROOT.to_string(),
            options: WalkOptions::default(),
        }
    }

    /// Container used when a request leaves `base_path` empty.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = normalize(&root.into());
        self
    }

    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Reject requests that cannot be executed, before touching the store.
    pub fn validate(&self, request: &RotationRequest) -> Result<(), RotationError> {
        if request.old_value.is_empty() {
            return Err(RotationError::MissingOldValue);
        }
        let missing_new = request.new_value.as_deref().is_none_or(str::is_empty);
        if request.mode == OperationMode::Edit && missing_new {
            return Err(RotationError::MissingNewValue);
        }
        Ok(())
    }

    /// Find (and in edit mode replace) every field equal to the old value.
    ///
    /// Only validation and an unreachable store fail the call; per-field write
    /// failures are reported inside the returned records.
    pub fn rotate(&self, request: &RotationRequest) -> Result<RotationOutcome, RotationError> {
        self.validate(request)?;
        let base_path = if request.base_path.trim().is_empty() {
            self.root.clone()
        } else {
            normalize(request.base_path.trim())
        };

        self.store.probe().map_err(RotationError::StoreUnavailable)?;

        info!(
            target = "audit",
            action = "rotation.start",
            base_path = %base_path,
            mode = %request.mode,
            "rotation starting"
        );

        let substitution = Substitution {
            old_value: &request.old_value,
            new_value: request.new_value.as_deref().unwrap_or_default(),
            mode: request.mode,
        };
        let updates = TreeWalker::new(&self.store, self.options).walk(&base_path, &substitution);
        let summary = RotationSummary::new(request.mode, &updates);

        info!(
            target = "audit",
            action = "rotation.finish",
            base_path = %base_path,
            mode = %request.mode,
            matches = summary.matches,
            failed = summary.failed,
            "rotation finished"
        );

        Ok(RotationOutcome {
            mode: request.mode,
            updates,
            summary,
        })
    }
}
