//! Upload and download handlers.
//!
//! Uploads are written into the [`ChunkStore`](super::ChunkStore) one body
//! frame at a time. Downloads follow the entry with a
//! [`StreamPump`](super::StreamPump) and stream whatever it emits, so a
//! consumer can start reading a fragment while the transcoder is still
//! writing it.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::convert::Infallible;

use super::classify::classify;
use super::pump::StreamPump;
use crate::error::Error;
use crate::server::AppContext;

/// Receive a file from the transcoder.
///
/// Resets the entry when it is new or a playlist, appends every body frame as
/// a chunk, then marks the entry done. Playlist uploads keep their response
/// open until the uploader disconnects or the server shuts down when
/// `server.hold_playlist_uploads` is set.
pub async fn upload(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
    body: Body,
) -> Response {
    let class = classify(&filename);
    let store = &ctx.store;

    if !store.is_cached(&filename) || class.is_playlist() {
        store.reset(&filename);
    }

    let mut frames = body.into_data_stream();
    let mut received = 0usize;
    while let Some(frame) = frames.next().await {
        let chunk = match frame {
            Ok(chunk) => chunk,
            Err(source) => {
                return rejected(Error::UploadAborted {
                    filename: filename.clone(),
                    source,
                });
            }
        };
        if chunk.is_empty() {
            continue;
        }
        received += chunk.len();
        if let Err(e) = store.append(&filename, chunk) {
            return rejected(e);
        }
    }

    if let Err(e) = store.mark_done(&filename) {
        return rejected(e);
    }
    tracing::trace!(filename = %filename, bytes = received, "Upload complete");

    if class.is_playlist() && ctx.config.server.hold_playlist_uploads {
        let held = stream::unfold(ctx.shutdown.clone(), |shutdown| async move {
            shutdown.cancelled().await;
            None::<(Result<Bytes, Infallible>, _)>
        });
        return Response::new(Body::from_stream(held));
    }

    StatusCode::OK.into_response()
}

/// Upload failures are the producer's problem, so they all map to 400.
fn rejected(err: Error) -> Response {
    tracing::warn!(error = %err, "Upload rejected");
    let body = json!({
        "error": err.to_string(),
        "code": err.code(),
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Stream a file to a consumer as it is being uploaded.
///
/// The pump is driven to its first emission before the status line is sent,
/// so a timeout before any data becomes a proper error response. Failures
/// after that abort the chunked body.
pub async fn download(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, Error> {
    let class = classify(&filename);
    let mut pump = StreamPump::new(ctx.store.clone(), filename, &ctx.config.pump);

    let first = pump.next_chunk().await.transpose()?;
    let body = stream::iter(first.map(Ok)).chain(pump.into_stream());

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    if let Some(content_type) = class.content_type() {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    if let Some(cache_control) = class.cache_control() {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
    }

    Ok(response)
}
