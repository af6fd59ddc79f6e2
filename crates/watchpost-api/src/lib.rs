//! Axum control surface for Watchpost.
//!
//! This crate provides:
//! - Camera management (add, remove, class selection, restart)
//! - Recipient management pushed live to running pipelines
//! - Latest annotated frame per camera as JPEG
//! - Server-sent alert stream
//! - Health and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
