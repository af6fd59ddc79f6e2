//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    add_camera, alert_stream, delete_camera, get_recipients, health, latest_frame, list_cameras,
    list_classes, restart_camera, set_classes, set_recipients,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let camera_routes = Router::new()
        .route("/cameras", get(list_cameras).post(add_camera))
        .route("/cameras/:camera", delete(delete_camera))
        .route("/cameras/:camera/classes", put(set_classes))
        .route("/cameras/:camera/restart", post(restart_camera))
        .route("/cameras/:camera/frame", get(latest_frame))
        .route("/classes", get(list_classes));

    let recipient_routes =
        Router::new().route("/recipients", get(get_recipients).put(set_recipients));

    let alert_routes = Router::new().route("/alerts/stream", get(alert_stream));

    let api_routes = Router::new()
        .merge(camera_routes)
        .merge(recipient_routes)
        .merge(alert_routes);

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health))
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
