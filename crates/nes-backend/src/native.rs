//! Direct call-through backend for the statically linked core.
//!
//! Every operation is a synchronous call into the core's C entry points,
//! inheriting the caller's thread. Host paths are translated to flat
//! NUL-terminated byte paths, host integers to the native parameter types.
//! The core delivers audio/video/save callbacks through C function pointers,
//! which cannot capture state; the registered trampolines therefore forward
//! into process-wide sink slots.

use std::ffi::{c_char, c_int, CString};
use std::path::Path;
use std::sync::{Mutex, Once};

use crate::av::{SharedAudioSink, SharedSaveObserver, SharedVideoSink};
use crate::backend::{EmulatorBackend, SaveDirection};
use crate::cheats::CheatKind;
use crate::error::{BackendError, BackendResult};

/// Byte-buffer callback as the core declares it.
pub type BufferCallback = extern "C" fn(buffer: *const u8, len: c_int);

/// Zero-argument callback as the core declares it.
pub type VoidCallback = extern "C" fn();

/// File name of the cartridge compatibility database the core loads once
/// per process, before the first start.
pub const DATABASE_FILE: &str = "NstDatabase.xml";

/// Controller slot the bridge drives. Multi-player input is out of scope.
const PLAYER_ONE: c_int = 0;

/// Function table over the core's C entry points.
///
/// # Safety
///
/// Every entry must point at the corresponding symbol of the linked core
/// (or a test stub with identical semantics). Path pointers passed to the
/// table are NUL-terminated and live for the duration of the call only.
#[derive(Clone, Copy, Debug)]
pub struct NativeCoreApi {
    pub initialize: unsafe extern "C" fn(database_path: *const c_char),
    pub frame_duration: unsafe extern "C" fn() -> f64,
    pub start: unsafe extern "C" fn(game_path: *const c_char) -> bool,
    pub stop: unsafe extern "C" fn(),
    pub run_frame: unsafe extern "C" fn(),
    pub activate_input: unsafe extern "C" fn(input: c_int, player_index: c_int),
    pub deactivate_input: unsafe extern "C" fn(input: c_int, player_index: c_int),
    pub reset_inputs: unsafe extern "C" fn(),
    pub save_save_state: unsafe extern "C" fn(path: *const c_char),
    pub load_save_state: unsafe extern "C" fn(path: *const c_char),
    pub save_game_save: unsafe extern "C" fn(path: *const c_char),
    pub load_game_save: unsafe extern "C" fn(path: *const c_char),
    pub add_cheat_code: unsafe extern "C" fn(code: *const c_char) -> bool,
    pub reset_cheats: unsafe extern "C" fn(),
    pub set_audio_callback: unsafe extern "C" fn(callback: Option<BufferCallback>),
    pub set_video_callback: unsafe extern "C" fn(callback: Option<BufferCallback>),
    pub set_save_callback: unsafe extern "C" fn(callback: Option<VoidCallback>),
}

static CORE_INIT: Once = Once::new();

static AUDIO_SINK: Mutex<Option<SharedAudioSink>> = Mutex::new(None);
static VIDEO_SINK: Mutex<Option<SharedVideoSink>> = Mutex::new(None);
static SAVE_OBSERVER: Mutex<Option<SharedSaveObserver>> = Mutex::new(None);

/// Backend reaching the core through direct calls.
#[derive(Debug)]
pub struct NativeBackend {
    api: NativeCoreApi,
}

impl NativeBackend {
    /// Build the backend over `api`, with packaged resources (the
    /// compatibility database) under `resource_dir`.
    ///
    /// The first construction in the process loads the database and performs
    /// the core's one-time initialization; later constructions reuse it.
    pub fn new(api: NativeCoreApi, resource_dir: &Path) -> BackendResult<Self> {
        let database = resource_dir.join(DATABASE_FILE);
        if !database.is_file() {
            return Err(BackendError::MissingResource(database));
        }
        let database_c = flat_path(&database)?;

        CORE_INIT.call_once(|| unsafe {
            (api.initialize)(database_c.as_ptr());
            (api.set_audio_callback)(Some(audio_trampoline));
            (api.set_video_callback)(Some(video_trampoline));
            (api.set_save_callback)(Some(save_trampoline));
        });

        Ok(Self { api })
    }
}

impl EmulatorBackend for NativeBackend {
    fn frame_duration(&self) -> f64 {
        unsafe { (self.api.frame_duration)() }
    }

    fn start(&mut self, game: &Path) -> BackendResult<bool> {
        let path = flat_path(game)?;
        Ok(unsafe { (self.api.start)(path.as_ptr()) })
    }

    fn stop(&mut self) -> BackendResult<()> {
        unsafe { (self.api.stop)() };
        Ok(())
    }

    fn run_frame(&mut self) -> BackendResult<()> {
        unsafe { (self.api.run_frame)() };
        Ok(())
    }

    fn activate_input(&mut self, code: u32) -> BackendResult<()> {
        unsafe { (self.api.activate_input)(code as c_int, PLAYER_ONE) };
        Ok(())
    }

    fn deactivate_input(&mut self, code: u32) -> BackendResult<()> {
        unsafe { (self.api.deactivate_input)(code as c_int, PLAYER_ONE) };
        Ok(())
    }

    fn reset_inputs(&mut self) -> BackendResult<()> {
        unsafe { (self.api.reset_inputs)() };
        Ok(())
    }

    fn save_state(&mut self, direction: SaveDirection, path: &Path) -> BackendResult<()> {
        let path = flat_path(path)?;
        unsafe {
            match direction {
                SaveDirection::Save => (self.api.save_save_state)(path.as_ptr()),
                SaveDirection::Load => (self.api.load_save_state)(path.as_ptr()),
            }
        }
        Ok(())
    }

    fn game_save(&mut self, direction: SaveDirection, path: &Path) -> BackendResult<()> {
        let path = flat_path(path)?;
        unsafe {
            match direction {
                SaveDirection::Save => (self.api.save_game_save)(path.as_ptr()),
                SaveDirection::Load => (self.api.load_game_save)(path.as_ptr()),
            }
        }
        Ok(())
    }

    fn add_cheat(&mut self, code: &str, _kind: CheatKind) -> BackendResult<bool> {
        // A code with an interior NUL cannot reach the core; it would be
        // rejected by the decoder anyway.
        let Ok(code) = CString::new(code) else {
            return Ok(false);
        };
        Ok(unsafe { (self.api.add_cheat_code)(code.as_ptr()) })
    }

    fn reset_cheats(&mut self) -> BackendResult<()> {
        unsafe { (self.api.reset_cheats)() };
        Ok(())
    }

    fn set_audio_sink(&mut self, sink: Option<SharedAudioSink>) {
        *AUDIO_SINK.lock().expect("audio sink slot poisoned") = sink;
    }

    fn set_video_sink(&mut self, sink: Option<SharedVideoSink>) {
        *VIDEO_SINK.lock().expect("video sink slot poisoned") = sink;
    }

    fn set_save_observer(&mut self, observer: Option<SharedSaveObserver>) {
        *SAVE_OBSERVER.lock().expect("save observer slot poisoned") = observer;
    }
}

fn flat_path(path: &Path) -> BackendResult<CString> {
    let text = path
        .to_str()
        .ok_or_else(|| BackendError::InvalidPath(path.to_owned()))?;
    CString::new(text).map_err(|_| BackendError::InvalidPath(path.to_owned()))
}

// The trampolines run inside core callbacks; they must never unwind across
// the C boundary, so lock failures and absent sinks are silent drops.

extern "C" fn audio_trampoline(buffer: *const u8, len: c_int) {
    if buffer.is_null() || len <= 0 {
        return;
    }
    let bytes = unsafe { std::slice::from_raw_parts(buffer, len as usize) };
    let sink = AUDIO_SINK.lock().ok().and_then(|slot| slot.clone());
    if let Some(sink) = sink {
        if let Ok(mut sink) = sink.lock() {
            sink.write_samples(bytes);
        }
    }
}

extern "C" fn video_trampoline(buffer: *const u8, len: c_int) {
    if buffer.is_null() || len <= 0 {
        return;
    }
    let frame = unsafe { std::slice::from_raw_parts(buffer, len as usize) };
    let sink = VIDEO_SINK.lock().ok().and_then(|slot| slot.clone());
    if let Some(sink) = sink {
        if let Ok(mut sink) = sink.lock() {
            sink.write_frame(frame);
        }
    }
}

extern "C" fn save_trampoline() {
    let observer = SAVE_OBSERVER.lock().ok().and_then(|slot| slot.clone());
    if let Some(observer) = observer {
        if let Ok(mut observer) = observer.lock() {
            observer.save_updated();
        }
    }
}
