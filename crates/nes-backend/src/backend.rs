use std::path::Path;

use crate::av::{SharedAudioSink, SharedSaveObserver, SharedVideoSink};
use crate::cheats::{CheatKind, SUPPORTED_CHEAT_KINDS};
use crate::error::BackendResult;

/// Direction of a save-state or game-save transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDirection {
    /// Core state out to the host path.
    Save,
    /// Host path contents into the core.
    Load,
}

/// The emulator control surface, identical across execution backends.
///
/// Implementations translate each operation into whatever the backing core
/// understands (direct C calls, or script evaluation inside a sandboxed
/// runtime) but must preserve call ordering and the documented result
/// semantics. `pause`/`resume` do not appear here: the core has no pause
/// primitive, so they are façade-level no-ops.
pub trait EmulatorBackend: Send {
    /// Seconds per emulated frame as reported by the core (NTSC 1/60,
    /// PAL 1/50).
    fn frame_duration(&self) -> f64;

    /// Initialize the given game resource. `Ok(false)` means the core
    /// rejected the resource; the session stays stopped.
    fn start(&mut self, game: &Path) -> BackendResult<bool>;

    /// Halt emulation. Safe to call when already stopped.
    fn stop(&mut self) -> BackendResult<()>;

    /// Advance emulation by one frame.
    fn run_frame(&mut self) -> BackendResult<()>;

    fn activate_input(&mut self, code: u32) -> BackendResult<()>;
    fn deactivate_input(&mut self, code: u32) -> BackendResult<()>;
    fn reset_inputs(&mut self) -> BackendResult<()>;

    fn save_state(&mut self, direction: SaveDirection, path: &Path) -> BackendResult<()>;
    fn game_save(&mut self, direction: SaveDirection, path: &Path) -> BackendResult<()>;

    /// Apply one cheat code. The declared `kind` has already been validated
    /// against [`EmulatorBackend::supported_cheats`] by the caller; the core
    /// decodes the code text itself and `Ok(false)` means it rejected it.
    fn add_cheat(&mut self, code: &str, kind: CheatKind) -> BackendResult<bool>;

    fn reset_cheats(&mut self) -> BackendResult<()>;

    /// Cheat formats the backing core declares as supported.
    fn supported_cheats(&self) -> &[CheatKind] {
        SUPPORTED_CHEAT_KINDS
    }

    fn set_audio_sink(&mut self, sink: Option<SharedAudioSink>);
    fn set_video_sink(&mut self, sink: Option<SharedVideoSink>);
    fn set_save_observer(&mut self, observer: Option<SharedSaveObserver>);
}
