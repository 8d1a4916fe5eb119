use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub pump: PumpConfig,

    #[serde(default)]
    pub transcoder: TranscoderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Keep playlist upload responses open until the uploader disconnects,
    /// so a persistent-HTTP producer can keep rewriting the manifest.
    #[serde(default = "default_true")]
    pub hold_playlist_uploads: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3104
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            hold_playlist_uploads: default_true(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Seconds a temp-cached entry survives after it is marked done.
    #[serde(default = "default_eviction_secs")]
    pub eviction_secs: u64,
}

fn default_eviction_secs() -> u64 {
    3000
}

impl CacheConfig {
    pub fn eviction_delay(&self) -> Duration {
        Duration::from_secs(self.eviction_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            eviction_secs: default_eviction_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PumpConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Longest a download may wait without receiving new data.
    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    50
}
fn default_max_idle_secs() -> u64 {
    10
}

impl PumpConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }

    /// Number of idle poll cycles allowed before a pump times out.
    pub fn max_idle_ticks(&self) -> u32 {
        let ticks = self.max_idle().as_millis() / self.poll_interval_ms.max(1) as u128;
        ticks.min(u32::MAX as u128) as u32
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_idle_secs: default_max_idle_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscoderConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Start the transcoder as soon as the server is listening.
    #[serde(default)]
    pub autostart: bool,
}

fn default_program() -> String {
    "ffmpeg".to_string()
}

/// Low-latency DASH from a synthetic test source, PUT back to this server.
fn default_args() -> Vec<String> {
    [
        "-hide_banner",
        "-re",
        "-f",
        "lavfi",
        "-i",
        "testsrc2=size=1280x720:rate=30",
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-tune",
        "zerolatency",
        "-g",
        "30",
        "-f",
        "dash",
        "-seg_duration",
        "1",
        "-streaming",
        "1",
        "-ldash",
        "1",
        "-use_template",
        "1",
        "-use_timeline",
        "0",
        "-init_seg_name",
        "init-$RepresentationID$.m4s",
        "-media_seg_name",
        "chunk-$RepresentationID$-$Number%05d$.m4s",
        "-method",
        "PUT",
        "-http_persistent",
        "1",
        "http://127.0.0.1:3104/manifest.mpd",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            autostart: false,
        }
    }
}
