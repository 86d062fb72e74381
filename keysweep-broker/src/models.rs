use keysweep_core::{OperationMode, RotationError, RotationOutcome, RotationRequest, RotationResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /updatePassword`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    /// `list` or `edit`, case-insensitive; defaults to `list`.
    #[serde(default)]
    pub mode: Option<String>,
}

impl UpdatePasswordRequest {
    pub fn into_rotation(self) -> Result<RotationRequest, RotationError> {
        if self.old_password.is_empty() {
            return Err(RotationError::MissingOldValue);
        }
        let mode = match self.mode.as_deref().map(str::trim) {
            None | Some("") => OperationMode::default(),
            Some(value) => value.parse()?,
        };
        Ok(RotationRequest {
            base_path: self.base_path,
            old_value: self.old_password,
            new_value: Some(self.new_password).filter(|value| !value.is_empty()),
            mode,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePasswordResponse {
    pub success: bool,
    pub message: String,
    pub mode: OperationMode,
    pub updates: Vec<RotationResult>,
}

impl UpdatePasswordResponse {
    pub fn from_outcome(outcome: RotationOutcome) -> Self {
        Self {
            success: true,
            message: outcome.summary.message,
            mode: outcome.mode,
            updates: outcome.updates,
        }
    }

    pub fn failure(mode: OperationMode, message: String) -> Self {
        Self {
            success: false,
            message,
            mode,
            updates: Vec::new(),
        }
    }
}

/// One entry of `POST /sendVault`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSecretRequest {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSecretsResponse {
    pub written: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteSecretRequest {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSecretResponse {
    pub message: String,
}
