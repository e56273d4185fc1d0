//! Hand-off points between a backend and the host's audio/video renderers.
//!
//! These are intentionally small to make it easy to bridge either backend to
//! different hosts:
//! - in-memory buffers (unit tests)
//! - the front-end's ring-buffer renderers
//!
//! Sinks are shared handles: the backend holds one clone to deliver data, the
//! session façade holds another to drive the frame-processing hook. A backend
//! with no sink registered drops the data silently.

use std::sync::{Arc, Mutex};

/// Receives raw PCM bytes (44.1 kHz mono s16) as the core produces them.
pub trait AudioSink {
    fn write_samples(&mut self, bytes: &[u8]);
}

/// Receives decoded RGB565 frames and exposes the host's per-frame
/// processing hook.
pub trait VideoSink {
    /// Copy one complete frame into the renderer's buffer.
    fn write_frame(&mut self, frame: &[u8]);

    /// The host's frame-processing hook, invoked once per `run_frame` call
    /// that requested video processing — after the frame step completed.
    fn process_frame(&mut self);
}

/// Notified when the core flushes battery-backed save data on its own.
pub trait SaveObserver {
    fn save_updated(&mut self);
}

pub type SharedAudioSink = Arc<Mutex<dyn AudioSink + Send>>;
pub type SharedVideoSink = Arc<Mutex<dyn VideoSink + Send>>;
pub type SharedSaveObserver = Arc<Mutex<dyn SaveObserver + Send>>;
