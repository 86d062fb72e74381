use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, Router, routing::get, routing::post};
use keysweep_core::path::{join, normalize};
use keysweep_core::{RotationError, SecretPayload, SecretStore};
use serde_json::Value;
use tracing::{Instrument, Span, info, warn};

use crate::error::{AppError, attach_correlation};
use crate::models::{
    DeleteSecretRequest, DeleteSecretResponse, StoreSecretRequest, StoreSecretsResponse,
    UpdatePasswordRequest, UpdatePasswordResponse,
};
use crate::state::AppState;
use crate::telemetry::{CorrelationId, correlation_layer, request_span};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/updatePassword", post(update_password))
        .route("/sendVault", post(store_secrets))
        .route("/deleteSecret", post(delete_secret))
        .layer(middleware::from_fn(correlation_layer))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// Run blocking store work off the async workers, inside the current span.
async fn blocking<F, T>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work))
        .await
        .map_err(|err| AppError::internal(format!("store task failed: {err}")))
}

async fn update_password(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let span = request_span("http.update_password", &correlation.0);
    async move {
        let request = json_body(payload)?.into_rotation()?;

        let mode = request.mode;
        let rotator = state.rotator.clone();
        match blocking(move || rotator.rotate(&request)).await? {
            Ok(outcome) => {
                let body = UpdatePasswordResponse::from_outcome(outcome);
                Ok((StatusCode::OK, Json(body)).into_response())
            }
            Err(RotationError::StoreUnavailable(err)) => {
                warn!(error = %err, "secret store unreachable");
                let body = UpdatePasswordResponse::failure(
                    mode,
                    format!("error processing request: {err}"),
                );
                Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
            }
            Err(err) => Err(AppError::from(err)),
        }
    }
    .instrument(span)
    .await
    .map_err(|err: AppError| attach_correlation(err, &correlation))
}

async fn store_secrets(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    payload: Result<Json<Vec<StoreSecretRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let span = request_span("http.store_secrets", &correlation.0);
    async move {
        let entries = json_body(payload)?;
        if entries
            .iter()
            .any(|entry| entry.path.trim().is_empty() || entry.data.is_empty())
        {
            return Err(AppError::bad_request("path and data are required"));
        }

        let store = state.store().clone();
        let written = blocking(move || {
            let mut written = 0;
            for entry in entries {
                let path = normalize(entry.path.trim());
                let mut payload = SecretPayload::new();
                payload.insert("data".to_string(), Value::Object(entry.data));
                store.write(&path, payload).map_err(|err| {
                    AppError::internal(format!("failed to write {path}: {err}"))
                })?;
                info!(
                    target = "audit",
                    action = "secret.store",
                    path = %path,
                    "secret stored"
                );
                written += 1;
            }
            Ok::<_, AppError>(written)
        })
        .await??;

        Ok((StatusCode::OK, Json(StoreSecretsResponse { written })))
    }
    .instrument(span)
    .await
    .map_err(|err: AppError| attach_correlation(err, &correlation))
}

async fn delete_secret(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    payload: Result<Json<DeleteSecretRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let span = request_span("http.delete_secret", &correlation.0);
    async move {
        let request =
            json_body(payload).map_err(|_| AppError::bad_request("invalid or missing path"))?;
        let path = request.path.trim().trim_matches('/').to_string();
        if path.is_empty() {
            return Err(AppError::bad_request("invalid or missing path"));
        }

        let store = state.store().clone();
        let metadata_path = join(&format!("{}/metadata", state.root()), &path);
        blocking(move || -> Result<(), AppError> {
            let children = store.list(&metadata_path)?.unwrap_or_default();
            if !children.is_empty() {
                return Err(AppError::forbidden("cannot delete a folder with secrets"));
            }
            store.delete(&metadata_path)?;
            info!(
                target = "audit",
                action = "secret.delete",
                path = %metadata_path,
                "secret deleted"
            );
            Ok(())
        })
        .await??;

        let message = format!("secret at path '{path}' deleted successfully");
        Ok((StatusCode::OK, Json(DeleteSecretResponse { message })))
    }
    .instrument(span)
    .await
    .map_err(|err: AppError| attach_correlation(err, &correlation))
}
