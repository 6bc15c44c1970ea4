mod compare;
mod compare_stream;
mod health;
mod metrics;
mod upload;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub use compare::CompareError;

pub const COMPARE_ROUTE: &str = pose_verdict::COMPARE_PATH;
pub const COMPARE_STREAM_ROUTE: &str = pose_verdict::COMPARE_STREAM_PATH;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route(COMPARE_ROUTE, post(compare::compare))
        .route(COMPARE_STREAM_ROUTE, post(compare_stream::compare_stream))
}
