//! Per-consumer stream pump.
//!
//! A [`StreamPump`] follows one cache entry from a single download's point of
//! view. It polls the [`ChunkStore`] on a fixed interval, forwards whatever was
//! appended since its last read as one buffer, and finishes once the entry is
//! marked done and fully drained.
//!
//! ```text
//! WaitExist ──entry created──▶ WaitData ◀──────┐
//!     ▲                           │            │
//!     └──entry evicted            │ new chunks │
//!                                 ▼            │
//!                               Drain ─────────┘
//!                                 │ done + drained
//!                                 ▼
//!                               Done
//! ```
//!
//! Every poll that makes no progress counts toward an idle ceiling; exceeding
//! it fails the pump with [`Error::Timeout`]. The count resets on every drain,
//! so the ceiling bounds idle time, not transfer time.

use bytes::Bytes;
use futures::stream::{self, Stream};
use std::time::Duration;

use super::chunk_store::ChunkStore;
use crate::config::PumpConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// The entry does not exist yet.
    WaitExist,
    /// The entry exists but has nothing new.
    WaitData,
    /// The last tick emitted data.
    Drain,
    /// The entry is done and everything was emitted.
    Done,
    /// The pump gave up.
    Failed,
}

/// Outcome of a single scheduling step.
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    /// New data to forward to the consumer.
    Emit(Bytes),
    /// Nothing new; suspend for one poll interval and tick again.
    Idle,
    /// The stream is complete.
    Finished,
}

pub struct StreamPump {
    store: ChunkStore,
    filename: String,
    cursor: usize,
    generation: Option<u64>,
    idle_ticks: u32,
    max_idle_ticks: u32,
    poll_interval: Duration,
    state: PumpState,
    pause_pending: bool,
    bytes_sent: u64,
}

impl StreamPump {
    pub fn new(store: ChunkStore, filename: impl Into<String>, config: &PumpConfig) -> Self {
        Self {
            store,
            filename: filename.into(),
            cursor: 0,
            generation: None,
            idle_ticks: 0,
            max_idle_ticks: config.max_idle_ticks(),
            poll_interval: config.poll_interval(),
            state: PumpState::WaitExist,
            pause_pending: false,
            bytes_sent: 0,
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Perform one non-blocking step of the protocol.
    pub fn tick(&mut self) -> Result<Tick> {
        if matches!(self.state, PumpState::Done | PumpState::Failed) {
            return Ok(Tick::Finished);
        }

        let slice = match self.store.read(&self.filename, self.cursor) {
            Ok(slice) => slice,
            Err(Error::NotFound { .. }) => {
                self.state = PumpState::WaitExist;
                return self.idle();
            }
            Err(e) => return Err(self.fail(e)),
        };

        // Only a pump that already emitted data can be handed a mix of versions.
        if let Some(generation) = self.generation {
            if generation != slice.generation && self.cursor > 0 {
                return Err(self.fail(Error::Superseded {
                    filename: self.filename.clone(),
                }));
            }
        }
        self.generation = Some(slice.generation);

        if !slice.is_empty() {
            let data = slice.concat();
            self.cursor = slice.next_index;
            self.idle_ticks = 0;
            self.bytes_sent += data.len() as u64;
            self.state = PumpState::Drain;
            return Ok(Tick::Emit(data));
        }

        if slice.done {
            self.state = PumpState::Done;
            tracing::debug!(
                filename = %self.filename,
                bytes = self.bytes_sent,
                chunks = self.cursor,
                "Stream complete"
            );
            return Ok(Tick::Finished);
        }

        self.state = PumpState::WaitData;
        self.idle()
    }

    fn idle(&mut self) -> Result<Tick> {
        if self.idle_ticks > self.max_idle_ticks {
            let waited = self.poll_interval * self.idle_ticks;
            return Err(self.fail(Error::Timeout {
                filename: self.filename.clone(),
                waited,
            }));
        }
        self.idle_ticks += 1;
        Ok(Tick::Idle)
    }

    fn fail(&mut self, err: Error) -> Error {
        tracing::warn!(
            filename = %self.filename,
            state = ?self.state,
            bytes = self.bytes_sent,
            error = %err,
            "Stream pump failed"
        );
        self.state = PumpState::Failed;
        err
    }

    /// Drive the pump until it has data, finishes or fails.
    ///
    /// Returns `None` once the stream is complete. After a drain the pump
    /// waits one poll interval before reading again.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        loop {
            if self.pause_pending {
                self.pause_pending = false;
                tokio::time::sleep(self.poll_interval).await;
            }

            match self.tick() {
                Ok(Tick::Emit(data)) => {
                    self.pause_pending = true;
                    return Some(Ok(data));
                }
                Ok(Tick::Idle) => tokio::time::sleep(self.poll_interval).await,
                Ok(Tick::Finished) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Turn the pump into a stream of buffers.
    ///
    /// Dropping the stream stops the pump at its next suspension point.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
        stream::unfold(self, |mut pump| async move {
            let item = pump.next_chunk().await?;
            Some((item, pump))
        })
    }
}

impl Drop for StreamPump {
    fn drop(&mut self) {
        if !matches!(self.state, PumpState::Done | PumpState::Failed) {
            tracing::debug!(
                filename = %self.filename,
                bytes = self.bytes_sent,
                "Consumer went away before stream completed"
            );
        }
    }
}
