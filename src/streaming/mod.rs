//! Media relay streaming.
//!
//! Provides the chunk cache and the upload/download paths built on it.
//!
//! # Routes
//!
//! - `PUT /{filename}` - Upload a manifest or fragment (transcoder side)
//! - `GET /{filename}` - Stream a manifest or fragment as it arrives (player side)
//!
//! Filenames are classified by [`classify`]: `*.m4s` segments get a video
//! content type and long cache lifetime, `*.mpd` playlists are replaced on
//! every upload, and `chunk*` files are evicted some time after completion.

mod chunk_store;
mod classify;
mod pump;
mod relay;

pub use chunk_store::{ChunkSlice, ChunkStore, StoreStats};
pub use classify::{classify, FileClass, FileKind};
pub use pump::{PumpState, StreamPump, Tick};
pub use relay::{download, upload};

use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::server::AppContext;

/// Create the upload/download router.
pub fn relay_router() -> Router<AppContext> {
    Router::new()
        .route("/:filename", get(download).put(upload))
        .layer(DefaultBodyLimit::disable())
}
