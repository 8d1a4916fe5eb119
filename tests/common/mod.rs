//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wraps a full [`AppContext`] built from a
//! fast-polling test configuration. The [`TestHarness::with_server`]
//! constructor starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use ull_relay::config::{Config, PumpConfig, TranscoderConfig};
use ull_relay::server::{create_router, AppContext};

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
}

/// Config with short poll/idle windows, unheld playlist uploads and a
/// harmless long-running transcoder stand-in.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.pump = PumpConfig {
        poll_interval_ms: 10,
        max_idle_secs: 1,
    };
    config.server.hold_playlist_uploads = false;
    config.transcoder = TranscoderConfig {
        program: "sleep".to_string(),
        args: vec!["30".to_string()],
        autostart: false,
    };
    config
}

impl TestHarness {
    /// Create a new harness with the test configuration.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a new harness with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            ctx: AppContext::new(config),
        }
    }

    /// Build a router over this harness's context.
    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(test_config()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}
