//! HTTP handlers for the sync endpoint.

use asha_field_core::sync::{Ack, Submission};
use asha_field_core::{Profile, Role};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::storage::{Accepted, ServerStorageError};
use super::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accepts one record from a device.
pub async fn submit_record(
    State(state): State<AppState>,
    Json(submission): Json<Submission>,
) -> (StatusCode, Json<Ack>) {
    let storage = state.storage.clone();
    let module = submission.module_key;
    let client_id = submission.client_id.clone();

    let result = tokio::task::spawn_blocking(move || storage.accept_record(&submission)).await;

    match flatten(result) {
        Ok(Accepted { server_id, created }) => {
            tracing::info!(
                module = %module,
                client_id = %client_id,
                server_id = %server_id,
                created,
                "record accepted"
            );
            (StatusCode::OK, Json(Ack::accepted(server_id)))
        }
        Err(e) => respond_error(e),
    }
}

/// Registers a worker profile for `role`.
pub async fn register(
    State(state): State<AppState>,
    Path(role): Path<Role>,
    Json(profile): Json<Profile>,
) -> (StatusCode, Json<Ack>) {
    let storage = state.storage.clone();
    let worker_id = profile.worker_id.clone();

    let result = tokio::task::spawn_blocking(move || storage.register(role, &profile)).await;

    match flatten(result) {
        Ok(Accepted { server_id, created }) => {
            tracing::info!(role = %role, worker_id = %worker_id, created, "worker registered");
            (StatusCode::OK, Json(Ack::accepted(server_id)))
        }
        Err(e) => respond_error(e),
    }
}

fn flatten<T>(
    result: Result<Result<T, ServerStorageError>, tokio::task::JoinError>,
) -> Result<T, ServerStorageError> {
    result.map_err(|e| ServerStorageError::IoError("<worker>".into(), std::io::Error::other(e)))?
}

/// Invalid input is answered with `success: false`; storage failures with 500.
fn respond_error(err: ServerStorageError) -> (StatusCode, Json<Ack>) {
    match err {
        ServerStorageError::Invalid(reason) => {
            tracing::warn!(reason = %reason, "submission rejected");
            (StatusCode::OK, Json(Ack::rejected(reason)))
        }
        other => {
            tracing::error!(error = %other, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Ack::rejected("internal storage error")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{app, ApiKeyEntry, ApiKeyStore, AppState, ServerStorage};
    use super::*;
    use asha_field_core::ModuleKey;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn setup(keys: Vec<ApiKeyEntry>) -> (Router, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(
            ApiKeyStore::from_entries(keys),
            ServerStorage::new(temp_dir.path()),
        );
        (app(state), temp_dir)
    }

    fn referral(client_id: &str) -> Value {
        json!({
            "moduleKey": "referrals",
            "payload": {
                "patientName": "Ramesh",
                "reason": "High fever",
                "referredTo": "PHC Rampur",
                "village": "Rampur"
            },
            "ownerId": "ASHA-1",
            "clientId": client_id
        })
    }

    async fn post(app: &Router, uri: &str, body: &Value, key: Option<&str>) -> (StatusCode, Ack) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = key {
            request = request.header("authorization", format!("Bearer {}", key));
        }
        let resp = app
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let ack = serde_json::from_slice(&bytes).unwrap_or_default();
        (status, ack)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _temp) = setup(vec![ApiKeyEntry {
            key: "secret".into(),
            name: "test".into(),
        }]);
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_assigns_server_id_idempotently() {
        let (app, temp) = setup(Vec::new());

        let (status, first) = post(&app, "/records", &referral("R00001"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(first.success);
        let server_id = first.server_id.clone().unwrap();

        let (_, second) = post(&app, "/records", &referral("R00001"), None).await;
        assert_eq!(second.server_id.as_deref(), Some(server_id.as_str()));

        let (_, other) = post(&app, "/records", &referral("R00002"), None).await;
        assert_ne!(other.server_id.as_deref(), Some(server_id.as_str()));

        let stored = ServerStorage::new(temp.path())
            .records(ModuleKey::Referrals)
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_incomplete_record_is_rejected() {
        let (app, _temp) = setup(Vec::new());
        let mut body = referral("R00001");
        body["payload"]
            .as_object_mut()
            .unwrap()
            .remove("referredTo");

        let (status, ack) = post(&app, "/records", &body, None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!ack.success);
        assert_eq!(ack.message.as_deref(), Some("missing required fields: referredTo"));
    }

    #[tokio::test]
    async fn test_api_key_required_when_configured() {
        let (app, _temp) = setup(vec![ApiKeyEntry {
            key: "secret".into(),
            name: "district-1".into(),
        }]);

        let (status, _) = post(&app, "/records", &referral("R00001"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = post(&app, "/records", &referral("R00001"), Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, ack) = post(&app, "/records", &referral("R00001"), Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(ack.success);
    }

    #[tokio::test]
    async fn test_register_asha() {
        let (app, _temp) = setup(Vec::new());
        let profile = json!({
            "role": "asha",
            "workerId": "ASHA-17",
            "attributes": {
                "name": "Meena",
                "age": "31",
                "phone": "9876543210",
                "village": "Rampur"
            }
        });

        let (status, ack) = post(&app, "/asha/register", &profile, None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(ack.server_id.unwrap().starts_with("asha-"));
    }

    #[tokio::test]
    async fn test_register_role_mismatch_is_rejected() {
        let (app, _temp) = setup(Vec::new());
        let profile = json!({
            "role": "asha",
            "workerId": "ASHA-17",
            "attributes": {}
        });

        let (_, ack) = post(&app, "/phc/register", &profile, None).await;

        assert!(!ack.success);
    }
}
