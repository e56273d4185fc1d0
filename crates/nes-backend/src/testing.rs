//! Deterministic test doubles shared with the workspace harness.
//!
//! [`stub_core_api`] is a C-ABI stub standing in for the linked core: it
//! records every entry-point call, advances a tiny deterministic machine per
//! frame, and writes/restores textual "save states" so round-trip tests have
//! real observable output. There is one stub per process, like the real
//! core; tests that touch it must hold [`lock_stub_core`] for their whole
//! body.

use std::ffi::{c_char, c_int, CStr};
use std::sync::{Mutex, MutexGuard};

use crate::av::{AudioSink, SaveObserver, VideoSink};
use crate::native::{BufferCallback, NativeCoreApi, VoidCallback};
use crate::FRAME_DURATION_NTSC;

const STUB_FRAME_BYTES: usize = 256 * 240 * 2;
const STUB_AUDIO_BYTES: usize = 735 * 2;

/// Observable state of the process-wide stub core.
pub struct StubCore {
    /// Every entry-point call, in order.
    pub calls: Vec<String>,
    pub init_count: u32,
    pub initialized_with: Option<String>,
    pub started: Option<String>,
    pub frames: u64,
    pub inputs: u32,
    pub cheats: Vec<String>,
    pub battery: Option<String>,
    audio_callback: Option<BufferCallback>,
    video_callback: Option<BufferCallback>,
    save_callback: Option<VoidCallback>,
}

impl StubCore {
    const fn new() -> Self {
        Self {
            calls: Vec::new(),
            init_count: 0,
            initialized_with: None,
            started: None,
            frames: 0,
            inputs: 0,
            cheats: Vec::new(),
            battery: None,
            audio_callback: None,
            video_callback: None,
            save_callback: None,
        }
    }

    /// The frame the stub would render right now; a pure function of the
    /// machine state so save/load round trips are observable.
    pub fn current_frame(&self) -> Vec<u8> {
        render_frame(self.frames, self.inputs)
    }
}

static STUB: Mutex<StubCore> = Mutex::new(StubCore::new());
static STUB_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that drive the stub core. Hold the guard for the whole
/// test body.
pub fn lock_stub_core() -> MutexGuard<'static, ()> {
    STUB_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reset the machine state and call log. Registered callbacks survive, as
/// they would in the real core.
pub fn reset_stub_core() {
    let mut core = STUB.lock().unwrap();
    core.calls.clear();
    core.started = None;
    core.frames = 0;
    core.inputs = 0;
    core.cheats.clear();
    core.battery = None;
}

pub fn with_stub_core<R>(f: impl FnOnce(&mut StubCore) -> R) -> R {
    f(&mut STUB.lock().unwrap())
}

/// Fire the registered save callback, as the core does when the game
/// flushes battery-backed memory on its own.
pub fn trigger_save_flush() {
    let callback = STUB.lock().unwrap().save_callback;
    if let Some(callback) = callback {
        callback();
    }
}

/// Function table over the stub entry points.
pub fn stub_core_api() -> NativeCoreApi {
    NativeCoreApi {
        initialize: stub_initialize,
        frame_duration: stub_frame_duration,
        start: stub_start,
        stop: stub_stop,
        run_frame: stub_run_frame,
        activate_input: stub_activate_input,
        deactivate_input: stub_deactivate_input,
        reset_inputs: stub_reset_inputs,
        save_save_state: stub_save_save_state,
        load_save_state: stub_load_save_state,
        save_game_save: stub_save_game_save,
        load_game_save: stub_load_game_save,
        add_cheat_code: stub_add_cheat_code,
        reset_cheats: stub_reset_cheats,
        set_audio_callback: stub_set_audio_callback,
        set_video_callback: stub_set_video_callback,
        set_save_callback: stub_set_save_callback,
    }
}

fn render_frame(frames: u64, inputs: u32) -> Vec<u8> {
    let seed = frames.wrapping_mul(31).wrapping_add(inputs as u64);
    (0..STUB_FRAME_BYTES)
        .map(|i| (seed.wrapping_add(i as u64) & 0xff) as u8)
        .collect()
}

unsafe fn cstr_lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

unsafe extern "C" fn stub_initialize(database_path: *const c_char) {
    let path = cstr_lossy(database_path);
    let mut core = STUB.lock().unwrap();
    core.init_count += 1;
    core.initialized_with = Some(path);
    core.calls.push("initialize".to_owned());
}

unsafe extern "C" fn stub_frame_duration() -> f64 {
    FRAME_DURATION_NTSC
}

unsafe extern "C" fn stub_start(game_path: *const c_char) -> bool {
    let path = cstr_lossy(game_path);
    let mut core = STUB.lock().unwrap();
    core.calls.push(format!("start {path}"));
    if path.ends_with(".nes") {
        core.started = Some(path);
        true
    } else {
        false
    }
}

unsafe extern "C" fn stub_stop() {
    let mut core = STUB.lock().unwrap();
    core.calls.push("stop".to_owned());
    core.started = None;
}

unsafe extern "C" fn stub_run_frame() {
    let (audio_callback, video_callback, frame, audio) = {
        let mut core = STUB.lock().unwrap();
        core.calls.push("run-frame".to_owned());
        core.frames += 1;
        let frame = render_frame(core.frames, core.inputs);
        let audio: Vec<u8> = (0..STUB_AUDIO_BYTES)
            .map(|i| (core.frames.wrapping_add(i as u64) & 0xff) as u8)
            .collect();
        (core.audio_callback, core.video_callback, frame, audio)
    };
    // Callbacks run outside the stub lock, as the real core's do.
    if let Some(callback) = audio_callback {
        callback(audio.as_ptr(), audio.len() as c_int);
    }
    if let Some(callback) = video_callback {
        callback(frame.as_ptr(), frame.len() as c_int);
    }
}

unsafe extern "C" fn stub_activate_input(input: c_int, player_index: c_int) {
    let mut core = STUB.lock().unwrap();
    core.inputs |= input as u32;
    core.calls
        .push(format!("activate {input:#x} p{player_index}"));
}

unsafe extern "C" fn stub_deactivate_input(input: c_int, player_index: c_int) {
    let mut core = STUB.lock().unwrap();
    core.inputs &= !(input as u32);
    core.calls
        .push(format!("deactivate {input:#x} p{player_index}"));
}

unsafe extern "C" fn stub_reset_inputs() {
    let mut core = STUB.lock().unwrap();
    core.inputs = 0;
    core.calls.push("reset-inputs".to_owned());
}

unsafe extern "C" fn stub_save_save_state(path: *const c_char) {
    let path = cstr_lossy(path);
    let mut core = STUB.lock().unwrap();
    core.calls.push(format!("save-state {path}"));
    let blob = format!("stub-state frames={} inputs={:#x}", core.frames, core.inputs);
    let _ = std::fs::write(&path, blob);
}

unsafe extern "C" fn stub_load_save_state(path: *const c_char) {
    let path = cstr_lossy(path);
    let mut core = STUB.lock().unwrap();
    core.calls.push(format!("load-state {path}"));
    let Ok(blob) = std::fs::read_to_string(&path) else {
        return;
    };
    if let Some((frames, inputs)) = parse_state_blob(&blob) {
        core.frames = frames;
        core.inputs = inputs;
    }
}

unsafe extern "C" fn stub_save_game_save(path: *const c_char) {
    let path = cstr_lossy(path);
    let mut core = STUB.lock().unwrap();
    core.calls.push(format!("save-game {path}"));
    let game = core.started.as_deref().unwrap_or("");
    let _ = std::fs::write(&path, format!("battery for {game}"));
}

unsafe extern "C" fn stub_load_game_save(path: *const c_char) {
    let path = cstr_lossy(path);
    let mut core = STUB.lock().unwrap();
    core.calls.push(format!("load-game {path}"));
    if let Ok(blob) = std::fs::read_to_string(&path) {
        core.battery = Some(blob);
    }
}

unsafe extern "C" fn stub_add_cheat_code(code: *const c_char) -> bool {
    let code = cstr_lossy(code);
    let mut core = STUB.lock().unwrap();
    core.calls.push(format!("add-cheat {code}"));
    let decodable =
        (code.len() == 6 || code.len() == 8) && code.bytes().all(|b| b.is_ascii_alphabetic());
    if decodable {
        core.cheats.push(code);
    }
    decodable
}

unsafe extern "C" fn stub_reset_cheats() {
    let mut core = STUB.lock().unwrap();
    core.calls.push("reset-cheats".to_owned());
    core.cheats.clear();
}

unsafe extern "C" fn stub_set_audio_callback(callback: Option<BufferCallback>) {
    STUB.lock().unwrap().audio_callback = callback;
}

unsafe extern "C" fn stub_set_video_callback(callback: Option<BufferCallback>) {
    STUB.lock().unwrap().video_callback = callback;
}

unsafe extern "C" fn stub_set_save_callback(callback: Option<VoidCallback>) {
    STUB.lock().unwrap().save_callback = callback;
}

fn parse_state_blob(blob: &str) -> Option<(u64, u32)> {
    let rest = blob.strip_prefix("stub-state frames=")?;
    let (frames, rest) = rest.split_once(" inputs=")?;
    let frames = frames.parse().ok()?;
    let inputs = u32::from_str_radix(rest.trim().trim_start_matches("0x"), 16).ok()?;
    Some((frames, inputs))
}

/// In-memory audio sink capturing everything the backend delivers.
#[derive(Default)]
pub struct CaptureAudioSink {
    pub bytes: Vec<u8>,
    pub writes: usize,
}

impl AudioSink for CaptureAudioSink {
    fn write_samples(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
        self.writes += 1;
    }
}

/// In-memory video sink capturing frames and counting processing hooks.
#[derive(Default)]
pub struct CaptureVideoSink {
    pub frames: Vec<Vec<u8>>,
    pub processed: usize,
}

impl VideoSink for CaptureVideoSink {
    fn write_frame(&mut self, frame: &[u8]) {
        self.frames.push(frame.to_vec());
    }

    fn process_frame(&mut self) {
        self.processed += 1;
    }
}

/// Save observer counting notifications.
#[derive(Default)]
pub struct CountingSaveObserver {
    pub updates: usize,
}

impl SaveObserver for CountingSaveObserver {
    fn save_updated(&mut self) {
        self.updates += 1;
    }
}
