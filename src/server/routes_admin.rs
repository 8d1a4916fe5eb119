//! Admin and liveness routes.
//!
//! - `GET /healthcheck` - Fixed OK status
//! - `POST /start` - Start the transcoder (idempotent)
//! - `POST /stop` - Stop the transcoder (idempotent)
//! - `GET /status` - Transcoder state and cache statistics

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::AppContext;
use crate::streaming::StoreStats;
use crate::transcoder::TranscoderStatus;

/// Create admin routes.
pub fn admin_routes() -> Router<AppContext> {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/start", post(start_transcoding))
        .route("/stop", post(stop_transcoding))
        .route("/status", get(get_status))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub transcoder: TranscoderStatus,
    pub cache: StoreStats,
}

async fn healthcheck() -> Json<MessageResponse> {
    Json(MessageResponse { message: "OK" })
}

async fn start_transcoding(State(ctx): State<AppContext>) -> Json<MessageResponse> {
    let outcome = ctx.transcoder.start();
    Json(MessageResponse {
        message: outcome.message(),
    })
}

async fn stop_transcoding(State(ctx): State<AppContext>) -> Json<MessageResponse> {
    let outcome = ctx.transcoder.stop();
    Json(MessageResponse {
        message: outcome.message(),
    })
}

async fn get_status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        transcoder: ctx.transcoder.status(),
        cache: ctx.store.stats(),
    })
}
