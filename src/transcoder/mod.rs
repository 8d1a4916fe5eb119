//! Transcoder process control.
//!
//! The relay feeds its cache from a single external encoder (ffmpeg by
//! default) that PUTs DASH manifests and fragments back to the server. This
//! module starts and stops that process:
//!
//! - at most one process runs at a time; repeated starts are no-ops
//! - the first diagnostic output is logged once as a readiness signal
//! - unexpected exits are logged, never restarted

mod supervisor;

pub use supervisor::{StartOutcome, StopOutcome, TranscoderStatus, TranscoderSupervisor};
