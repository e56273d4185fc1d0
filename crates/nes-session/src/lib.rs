//! The single shared emulator session driven by the front-end.
//!
//! [`EmulatorBridge`] selects one execution backend at construction and
//! forwards the whole control surface to it. Backend selection is a
//! build-configuration choice via the `native-core` / `script-core` cargo
//! features, never runtime negotiation — exactly one variant exists per
//! production build, so no state is ever shared across backends.
//!
//! The front-end requirement is "one active NES session per process,
//! reachable from anywhere". That is modeled as an explicitly constructed
//! object owned by the host's emulator-management layer; "at most one live
//! instance" is a runtime-checked invariant, not a language-level singleton.
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use nes_backend::av::{SharedAudioSink, SharedSaveObserver, SharedVideoSink};
use nes_backend::{BackendError, CheatKind, EmulatorBackend, SaveDirection};

#[cfg(feature = "native-core")]
use nes_backend::native::{NativeBackend, NativeCoreApi};

#[cfg(feature = "script-core")]
pub use nes_script::{runtime::ScriptRuntime, ScriptBackend, ScriptBackendConfig};

pub use nes_backend::{JoypadInput, SUPPORTED_CHEAT_KINDS};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("another emulator session is already live in this process")]
    SessionActive,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Claim on the process-wide session slot; released on drop.
struct SessionSlot;

impl SessionSlot {
    fn claim() -> Result<Self, SessionError> {
        if SESSION_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(SessionError::SessionActive);
        }
        Ok(SessionSlot)
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// Façade over the single active backend.
///
/// Lives as long as the host keeps it; the game locator is set by a
/// successful [`EmulatorBridge::start`] and cleared by
/// [`EmulatorBridge::stop`].
pub struct EmulatorBridge {
    backend: Box<dyn EmulatorBackend>,
    game: Option<PathBuf>,
    video: Option<SharedVideoSink>,
    _slot: SessionSlot,
}

impl EmulatorBridge {
    /// Wrap an explicitly constructed backend. Fails while another session
    /// is live in this process.
    pub fn with_backend(backend: Box<dyn EmulatorBackend>) -> Result<Self, SessionError> {
        let slot = SessionSlot::claim()?;
        Ok(Self {
            backend,
            game: None,
            video: None,
            _slot: slot,
        })
    }

    /// Session over the statically linked core.
    #[cfg(feature = "native-core")]
    pub fn native(api: NativeCoreApi, resource_dir: &Path) -> Result<Self, SessionError> {
        let slot = SessionSlot::claim()?;
        let backend = NativeBackend::new(api, resource_dir)?;
        Ok(Self {
            backend: Box::new(backend),
            game: None,
            video: None,
            _slot: slot,
        })
    }

    /// Session over the script-hosted core. Triggers the runtime bootstrap;
    /// control operations block until it completes.
    #[cfg(feature = "script-core")]
    pub fn script(
        runtime: Box<dyn ScriptRuntime>,
        config: ScriptBackendConfig,
    ) -> Result<Self, SessionError> {
        let slot = SessionSlot::claim()?;
        let backend = ScriptBackend::new(runtime, config)?;
        Ok(Self {
            backend: Box::new(backend),
            game: None,
            video: None,
            _slot: slot,
        })
    }

    /// Seconds per emulated frame, as the active core reports it.
    pub fn frame_duration(&self) -> f64 {
        self.backend.frame_duration()
    }

    /// Locator of the running game, absent when stopped.
    pub fn game(&self) -> Option<&Path> {
        self.game.as_deref()
    }

    /// Start the given game. Blocks until the backend is ready, then
    /// delegates; failure is non-fatal and logged, and the session stays
    /// stopped.
    pub fn start(&mut self, game: &Path) -> bool {
        match self.backend.start(game) {
            Ok(true) => {
                self.game = Some(game.to_owned());
                true
            }
            Ok(false) => {
                tracing::warn!(game = %game.display(), "core could not initialize the game");
                false
            }
            Err(err) => {
                tracing::warn!(%err, game = %game.display(), "start failed");
                false
            }
        }
    }

    /// Halt emulation and clear the game locator. Calling while already
    /// stopped is a downstream no-op.
    pub fn stop(&mut self) {
        if let Err(err) = self.backend.stop() {
            tracing::warn!(%err, "stop failed");
        }
        self.game = None;
    }

    /// No-op: the underlying core has no pause primitive.
    pub fn pause(&mut self) {}

    /// No-op: the underlying core has no resume primitive.
    pub fn resume(&mut self) {}

    /// Advance emulation by one frame. With `process_video`, the video
    /// sink's frame-processing hook runs exactly once after the backend's
    /// frame step returns.
    pub fn run_frame(&mut self, process_video: bool) -> Result<(), SessionError> {
        self.backend.run_frame()?;
        if process_video {
            if let Some(sink) = &self.video {
                if let Ok(mut sink) = sink.lock() {
                    sink.process_frame();
                }
            }
        }
        Ok(())
    }

    pub fn activate_input(&mut self, code: u32) -> Result<(), SessionError> {
        Ok(self.backend.activate_input(code)?)
    }

    pub fn deactivate_input(&mut self, code: u32) -> Result<(), SessionError> {
        Ok(self.backend.deactivate_input(code)?)
    }

    pub fn reset_inputs(&mut self) -> Result<(), SessionError> {
        Ok(self.backend.reset_inputs()?)
    }

    pub fn save_state(&mut self, direction: SaveDirection, path: &Path) -> Result<(), SessionError> {
        Ok(self.backend.save_state(direction, path)?)
    }

    pub fn game_save(&mut self, direction: SaveDirection, path: &Path) -> Result<(), SessionError> {
        Ok(self.backend.game_save(direction, path)?)
    }

    /// Apply cheat codes. Formats the active core does not declare are
    /// rejected before any backend call. Newline-separated codes apply
    /// independently, in order, until the first failure; the remainder is
    /// skipped and the aggregate result is failure.
    pub fn add_cheat(&mut self, code: &str, kind: CheatKind) -> bool {
        if !self.backend.supported_cheats().contains(&kind) {
            tracing::warn!(kind = kind.name(), "cheat format not supported by the active core");
            return false;
        }
        for line in code.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.backend.add_cheat(line, kind) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(code = line, "core rejected cheat code");
                    return false;
                }
                Err(err) => {
                    tracing::warn!(%err, code = line, "cheat application failed");
                    return false;
                }
            }
        }
        true
    }

    pub fn reset_cheats(&mut self) -> Result<(), SessionError> {
        Ok(self.backend.reset_cheats()?)
    }

    pub fn set_audio_sink(&mut self, sink: Option<SharedAudioSink>) {
        self.backend.set_audio_sink(sink);
    }

    /// Register the video renderer. The façade keeps its own handle to
    /// drive the frame-processing hook from [`EmulatorBridge::run_frame`].
    pub fn set_video_sink(&mut self, sink: Option<SharedVideoSink>) {
        self.video = sink.clone();
        self.backend.set_video_sink(sink);
    }

    pub fn set_save_observer(&mut self, observer: Option<SharedSaveObserver>) {
        self.backend.set_save_observer(observer);
    }
}
