//! Message-channel payloads exchanged between the sandboxed core runtime and
//! the host bridge.
//!
//! The hosted core posts small JSON messages to the bridge:
//! `{ "type": "ready" | "audio" | "video" | "save", "data"?: ... }`. This
//! crate owns the payload model and is deliberately small:
//! - tagged [`Message`] variants, decoded strictly (unknown tags are errors
//!   here; the router decides whether to drop them),
//! - the video-frame transport codec, including the legacy UTF-16 packed
//!   string form (see [`frame`]),
//! - the frame/audio geometry both backends and renderers must agree on.
//!
//! Messages are advisory telemetry from an otherwise-opaque runtime; they are
//! consumed immediately by the router and never retained.
#![forbid(unsafe_code)]

pub mod frame;

mod error;
mod message;

pub use error::MessageError;
pub use message::Message;

/// Output width of the core's video buffer, in pixels.
pub const FRAME_WIDTH: usize = 256;

/// Output height of the core's video buffer, in pixels.
pub const FRAME_HEIGHT: usize = 240;

/// Bytes per output pixel (RGB565).
pub const FRAME_BYTES_PER_PIXEL: usize = 2;

/// Size in bytes of one complete video frame.
pub const FRAME_BUFFER_BYTES: usize = FRAME_WIDTH * FRAME_HEIGHT * FRAME_BYTES_PER_PIXEL;

/// Audio sample rate produced by the core (mono, signed 16-bit).
pub const AUDIO_SAMPLE_RATE_HZ: u32 = 44_100;

/// Defensive upper bound for a single inbound payload's data field.
///
/// A video frame is ~120 KiB and an audio chunk under 2 KiB, so anything near
/// this cap is garbage from a misbehaving runtime rather than a real message.
pub const MAX_PAYLOAD_BYTES: usize = 1 << 20; // 1 MiB

/// Number of audio samples the core emits per video frame at `frame_rate` Hz.
pub fn preferred_audio_frame_len(frame_rate: u32) -> usize {
    (AUDIO_SAMPLE_RATE_HZ / frame_rate) as usize
}
