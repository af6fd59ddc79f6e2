//! Camera management handlers.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use watchpost_media::{encode_jpeg, JPEG_CONTENT_TYPE};
use watchpost_models::{CameraConfig, CameraId, ClassSelection};
use watchpost_worker::{PipelineStatus, ReconfigureOutcome};

use super::{blocking, parse_camera};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// A configured camera and its pipeline, if one is registered.
#[derive(Debug, Serialize)]
pub struct CameraResponse {
    pub id: CameraId,
    pub name: String,
    pub display_classes: BTreeSet<String>,
    pub alert_classes: BTreeSet<String>,
    pub pipeline: Option<PipelineStatus>,
}

impl CameraResponse {
    fn new(camera: CameraConfig, state: &AppState) -> Self {
        let pipeline = state.supervisor.status(&camera.id);
        Self {
            id: camera.id,
            name: camera.name,
            display_classes: camera.display_classes,
            alert_classes: camera.alert_classes,
            pipeline,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCameraRequest {
    pub id: CameraId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClassesRequest {
    #[serde(default)]
    pub display_classes: Vec<String>,
    #[serde(default)]
    pub alert_classes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassesResponse {
    pub camera: CameraResponse,
    pub outcome: ReconfigureOutcome,
}

#[derive(Debug, Serialize)]
pub struct ClassCatalogResponse {
    pub classes: Vec<String>,
}

/// List configured cameras with pipeline state.
pub async fn list_cameras(State(state): State<AppState>) -> Json<Vec<CameraResponse>> {
    let config = state.store.snapshot().await;
    Json(
        config
            .cameras
            .into_iter()
            .map(|camera| CameraResponse::new(camera, &state))
            .collect(),
    )
}

/// Add a camera with empty selections and start its pipeline.
pub async fn add_camera(
    State(state): State<AppState>,
    Json(request): Json<AddCameraRequest>,
) -> ApiResult<(StatusCode, Json<CameraResponse>)> {
    if let CameraId::Uri(uri) = &request.id {
        if uri.trim().is_empty() {
            return Err(ApiError::bad_request("camera id must not be empty"));
        }
    }

    let name = request.name.unwrap_or_else(|| request.id.to_string());
    let camera = CameraConfig::new(request.id.clone(), name);
    let _ops = state.camera_ops.lock().await;
    state.store.add_camera(camera.clone()).await?;

    let config = state
        .store
        .pipeline_config(&camera.id)
        .await
        .ok_or_else(|| ApiError::internal("camera missing after insert"))?;
    let supervisor = state.supervisor.clone();
    blocking(move || supervisor.start(config)).await??;

    info!(camera = %camera.id, "Camera added");
    Ok((StatusCode::CREATED, Json(CameraResponse::new(camera, &state))))
}

/// Remove the camera from the config, then stop its pipeline.
pub async fn delete_camera(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<StatusCode> {
    let camera = parse_camera(&raw)?;
    let _ops = state.camera_ops.lock().await;
    state.store.remove_camera(&camera).await?;

    let supervisor = state.supervisor.clone();
    let id = camera.clone();
    blocking(move || supervisor.stop(&id)).await?;

    info!(camera = %camera, "Camera removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the display and alert selections; applied to the running pipeline.
pub async fn set_classes(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Json(request): Json<ClassesRequest>,
) -> ApiResult<Json<ClassesResponse>> {
    let camera = parse_camera(&raw)?;
    let classes = ClassSelection::new(request.display_classes, request.alert_classes);
    let _ops = state.camera_ops.lock().await;
    let updated = state.store.set_classes(&camera, classes).await?;

    let config = state
        .store
        .pipeline_config(&camera)
        .await
        .ok_or_else(|| ApiError::not_found(format!("camera {}", camera)))?;
    let supervisor = state.supervisor.clone();
    let outcome = blocking(move || supervisor.reconfigure(config)).await??;

    info!(camera = %camera, outcome = ?outcome, "Classes updated");
    Ok(Json(ClassesResponse {
        camera: CameraResponse::new(updated, &state),
        outcome,
    }))
}

/// Stop and start the camera's pipeline with the stored selection.
pub async fn restart_camera(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<CameraResponse>> {
    let camera = parse_camera(&raw)?;
    let _ops = state.camera_ops.lock().await;
    let config = state
        .store
        .pipeline_config(&camera)
        .await
        .ok_or_else(|| ApiError::not_found(format!("camera {}", camera)))?;

    let supervisor = state.supervisor.clone();
    blocking(move || {
        supervisor.stop(&config.camera);
        supervisor.start(config)
    })
    .await??;

    info!(camera = %camera, "Camera restarted");
    let stored = state
        .store
        .snapshot()
        .await
        .camera(&camera)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("camera {}", camera)))?;
    Ok(Json(CameraResponse::new(stored, &state)))
}

/// Latest annotated frame as JPEG.
pub async fn latest_frame(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Response> {
    let camera = parse_camera(&raw)?;
    let frame = state
        .supervisor
        .latest_frame(&camera)
        .ok_or_else(|| ApiError::not_found(format!("no frame yet for camera {}", camera)))?;

    let quality = state.jpeg_quality;
    let bytes = blocking(move || encode_jpeg(&frame.image, quality))
        .await?
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, JPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        bytes,
    )
        .into_response())
}

/// Selectable classes of the configured model.
pub async fn list_classes(State(state): State<AppState>) -> Json<ClassCatalogResponse> {
    Json(ClassCatalogResponse {
        classes: state.store.class_names().await,
    })
}
