//! Capability surface shared by both NES execution backends, plus the
//! native call-through backend itself.
//!
//! The front-end drives the emulation core through [`EmulatorBackend`],
//! never through a concrete core API. Two implementations exist:
//! - [`native::NativeBackend`] (this crate): direct synchronous calls into
//!   the statically linked core's C entry points.
//! - `nes_script::ScriptBackend`: the same core compiled to a script
//!   payload, hosted in a sandboxed runtime and reached via asynchronous
//!   evaluation.
//!
//! Exactly one of the two is selected per build; the session façade in
//! `nes-session` owns that choice.

pub mod av;
pub mod native;

mod backend;
mod cheats;
mod error;
mod input;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{EmulatorBackend, SaveDirection};
pub use cheats::{CheatKind, SUPPORTED_CHEAT_KINDS};
pub use error::{BackendError, BackendResult};
pub use input::JoypadInput;

/// Frame duration reported for NTSC cores, in seconds.
pub const FRAME_DURATION_NTSC: f64 = 1.0 / 60.0;

/// Frame duration reported for PAL cores, in seconds.
pub const FRAME_DURATION_PAL: f64 = 1.0 / 50.0;

/// Conventional file extension for battery-backed game saves.
pub const GAME_SAVE_EXTENSION: &str = "sav";
