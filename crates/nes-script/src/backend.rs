use std::path::Path;
use std::time::Duration;

use nes_backend::av::{SharedAudioSink, SharedSaveObserver, SharedVideoSink};
use nes_backend::{
    BackendError, BackendResult, CheatKind, EmulatorBackend, SaveDirection, FRAME_DURATION_NTSC,
};

use crate::call::SyncCallBridge;
use crate::host::RuntimeHost;
use crate::readiness::ReadinessGate;
use crate::router::CallbackRouter;
use crate::runtime::{ScriptRuntime, ScriptValue};
use crate::vfs::{js_string, virtual_path_for, VirtualFileChannel};

use std::sync::Arc;

/// Minimal document loaded into the fresh runtime before the core payload
/// is injected.
pub const EMPTY_DOCUMENT: &str = "<!DOCTYPE html><html><head></head><body></body></html>";

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for [`ScriptBackend::new`].
pub struct ScriptBackendConfig {
    /// The compiled core, as script text to inject once the bootstrap
    /// document finished loading.
    pub core_payload: String,
    /// Document loaded into the fresh runtime instance.
    pub bootstrap_document: String,
    /// Bound on waiting for the runtime's `ready` message.
    pub ready_timeout: Duration,
    /// Bound on waiting for any single evaluation to complete.
    pub eval_timeout: Duration,
}

impl ScriptBackendConfig {
    pub fn new(core_payload: impl Into<String>) -> Self {
        Self {
            core_payload: core_payload.into(),
            bootstrap_document: EMPTY_DOCUMENT.to_owned(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            eval_timeout: DEFAULT_EVAL_TIMEOUT,
        }
    }
}

/// Backend reaching the core through script evaluation in the sandboxed
/// runtime.
///
/// Bootstrap is a three-step machine: runtime created and the empty document
/// loaded (uninitialized) → document loaded, core payload injected → the
/// hosted core posts `ready` once its callbacks are registered. Only then do
/// control operations pass the readiness gate; until ready they block, up to
/// the configured bound.
pub struct ScriptBackend {
    // Field order matters on drop: `calls`/`files` hold job-queue handles
    // that must be gone before `host` joins the designated thread.
    calls: SyncCallBridge,
    files: VirtualFileChannel,
    gate: Arc<ReadinessGate>,
    ready_timeout: Duration,
    frame_duration: f64,
    host: RuntimeHost,
}

impl ScriptBackend {
    pub fn new(runtime: Box<dyn ScriptRuntime>, config: ScriptBackendConfig) -> BackendResult<Self> {
        let gate = Arc::new(ReadinessGate::new());
        let router = CallbackRouter::new(Arc::clone(&gate));
        let host = RuntimeHost::spawn(
            runtime,
            router,
            config.core_payload,
            config.bootstrap_document,
        )?;
        let calls = SyncCallBridge::new(host.handle(), config.eval_timeout);
        let files = VirtualFileChannel::new(calls.clone());
        Ok(Self {
            calls,
            files,
            gate,
            ready_timeout: config.ready_timeout,
            frame_duration: FRAME_DURATION_NTSC,
            host,
        })
    }

    /// Block until the runtime reported ready.
    fn ready(&self) -> BackendResult<()> {
        self.gate.wait(self.ready_timeout)
    }

    fn update_router(&self, update: impl FnOnce(&mut CallbackRouter) + Send + 'static) {
        if let Err(err) = self.host.handle().run(move |cx| update(cx.router_mut())) {
            tracing::warn!(%err, "dropping sink registration");
        }
    }
}

impl EmulatorBackend for ScriptBackend {
    fn frame_duration(&self) -> f64 {
        self.frame_duration
    }

    fn start(&mut self, game: &Path) -> BackendResult<bool> {
        self.ready()?;
        let virtual_path = self.files.import_file(game)?;
        let script = format!("NESStartEmulation({});", js_string(&virtual_path));
        let started = expect_bool(self.calls.eval(&script)?)?;
        if started {
            self.frame_duration = expect_number(self.calls.eval("NESFrameDuration();")?)?;
        }
        Ok(started)
    }

    fn stop(&mut self) -> BackendResult<()> {
        self.ready()?;
        self.calls.eval("NESStopEmulation();")?;
        Ok(())
    }

    fn run_frame(&mut self) -> BackendResult<()> {
        self.ready()?;
        self.calls.eval("NESRunFrame();")?;
        Ok(())
    }

    fn activate_input(&mut self, code: u32) -> BackendResult<()> {
        self.ready()?;
        self.calls
            .eval(&format!("NESActivateInput({code}, 0);"))?;
        Ok(())
    }

    fn deactivate_input(&mut self, code: u32) -> BackendResult<()> {
        self.ready()?;
        self.calls
            .eval(&format!("NESDeactivateInput({code}, 0);"))?;
        Ok(())
    }

    fn reset_inputs(&mut self) -> BackendResult<()> {
        self.ready()?;
        self.calls.eval("NESResetInputs();")?;
        Ok(())
    }

    fn save_state(&mut self, direction: SaveDirection, path: &Path) -> BackendResult<()> {
        self.ready()?;
        match direction {
            SaveDirection::Save => {
                let virtual_path = virtual_path_for(path)?;
                self.calls
                    .eval(&format!("NESSaveSaveState({});", js_string(&virtual_path)))?;
                self.files.export_file(&virtual_path, path)
            }
            SaveDirection::Load => {
                let virtual_path = self.files.import_file(path)?;
                self.calls
                    .eval(&format!("NESLoadSaveState({});", js_string(&virtual_path)))?;
                Ok(())
            }
        }
    }

    fn game_save(&mut self, direction: SaveDirection, path: &Path) -> BackendResult<()> {
        self.ready()?;
        match direction {
            SaveDirection::Save => {
                let virtual_path = virtual_path_for(path)?;
                self.calls
                    .eval(&format!("NESSaveGameSave({});", js_string(&virtual_path)))?;
                self.files.export_file(&virtual_path, path)
            }
            SaveDirection::Load => {
                let virtual_path = self.files.import_file(path)?;
                self.calls
                    .eval(&format!("NESLoadGameSave({});", js_string(&virtual_path)))?;
                Ok(())
            }
        }
    }

    fn add_cheat(&mut self, code: &str, _kind: CheatKind) -> BackendResult<bool> {
        self.ready()?;
        let script = format!("NESAddCheatCode({});", js_string(code));
        expect_bool(self.calls.eval(&script)?)
    }

    fn reset_cheats(&mut self) -> BackendResult<()> {
        self.ready()?;
        self.calls.eval("NESResetCheats();")?;
        Ok(())
    }

    fn set_audio_sink(&mut self, sink: Option<SharedAudioSink>) {
        self.update_router(move |router| router.set_audio_sink(sink));
    }

    fn set_video_sink(&mut self, sink: Option<SharedVideoSink>) {
        self.update_router(move |router| router.set_video_sink(sink));
    }

    fn set_save_observer(&mut self, observer: Option<SharedSaveObserver>) {
        self.update_router(move |router| router.set_save_observer(observer));
    }
}

// Numeric/boolean results of evaluated script come back in a fixed shape; an
// unexpected shape is a programming-contract violation and fails loudly
// rather than coercing.

fn expect_bool(value: ScriptValue) -> BackendResult<bool> {
    match value {
        ScriptValue::Bool(value) => Ok(value),
        other => Err(BackendError::ContractViolation {
            expected: "a boolean",
            got: other.type_name().to_owned(),
        }),
    }
}

fn expect_number(value: ScriptValue) -> BackendResult<f64> {
    match value {
        ScriptValue::Number(value) => Ok(value),
        other => Err(BackendError::ContractViolation {
            expected: "a number",
            got: other.type_name().to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use nes_backend::testing::{CaptureAudioSink, CaptureVideoSink};
    use nes_protocol::FRAME_BUFFER_BYTES;

    use super::*;
    use crate::testing::{expected_frame, ScriptedNesRuntime, CORE_PAYLOAD};

    fn test_config() -> ScriptBackendConfig {
        let mut config = ScriptBackendConfig::new(CORE_PAYLOAD);
        config.ready_timeout = Duration::from_secs(5);
        config.eval_timeout = Duration::from_secs(5);
        config
    }

    fn write_rom(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let rom = dir.path().join("mario.nes");
        std::fs::write(&rom, b"NES\x1a test rom").unwrap();
        rom
    }

    #[test]
    fn lifecycle_and_frame_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let rom = write_rom(&dir);
        let runtime = ScriptedNesRuntime::new();
        let log = runtime.eval_log();
        let mut backend = ScriptBackend::new(Box::new(runtime), test_config()).unwrap();

        let audio = Arc::new(Mutex::new(CaptureAudioSink::default()));
        let video = Arc::new(Mutex::new(CaptureVideoSink::default()));
        backend.set_audio_sink(Some(audio.clone()));
        backend.set_video_sink(Some(video.clone()));

        assert!(backend.start(&rom).unwrap());
        assert_eq!(backend.frame_duration(), 1.0 / 60.0);

        backend.run_frame().unwrap();
        backend.run_frame().unwrap();
        assert_eq!(audio.lock().unwrap().writes, 2);
        let frames = video.lock().unwrap().frames.clone();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), FRAME_BUFFER_BYTES);
        assert_eq!(frames[1], expected_frame(2, 0));

        // Delegated input evaluations keep the issued order and codes.
        backend.activate_input(0x01).unwrap();
        backend.activate_input(0x10).unwrap();
        backend.deactivate_input(0x01).unwrap();
        backend.reset_inputs().unwrap();
        let issued: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|script| script.contains("Input"))
            .cloned()
            .collect();
        assert_eq!(
            issued,
            [
                "NESActivateInput(1, 0);",
                "NESActivateInput(16, 0);",
                "NESDeactivateInput(1, 0);",
                "NESResetInputs();"
            ]
        );

        assert!(backend.add_cheat("SXIOPO", CheatKind::GameGenie6).unwrap());
        assert!(!backend.add_cheat("NOPE", CheatKind::GameGenie6).unwrap());
        backend.reset_cheats().unwrap();

        backend.stop().unwrap();
        backend.stop().unwrap();
    }

    #[test]
    fn save_state_round_trip_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let rom = write_rom(&dir);
        let mut backend =
            ScriptBackend::new(Box::new(ScriptedNesRuntime::new()), test_config()).unwrap();
        let video = Arc::new(Mutex::new(CaptureVideoSink::default()));
        backend.set_video_sink(Some(video.clone()));

        assert!(backend.start(&rom).unwrap());
        for _ in 0..3 {
            backend.run_frame().unwrap();
        }
        let state = dir.path().join("mario.state");
        backend.save_state(SaveDirection::Save, &state).unwrap();
        assert!(state.is_file());

        backend.run_frame().unwrap();
        let frame_after_save = video.lock().unwrap().frames.last().cloned().unwrap();

        backend.save_state(SaveDirection::Load, &state).unwrap();
        backend.run_frame().unwrap();
        let frame_after_load = video.lock().unwrap().frames.last().cloned().unwrap();
        assert_eq!(frame_after_save, frame_after_load);
    }

    #[test]
    fn game_save_exports_battery_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let rom = write_rom(&dir);
        let mut backend =
            ScriptBackend::new(Box::new(ScriptedNesRuntime::new()), test_config()).unwrap();
        assert!(backend.start(&rom).unwrap());

        let battery = dir.path().join("mario.sav");
        backend.game_save(SaveDirection::Save, &battery).unwrap();
        assert!(std::fs::read_to_string(&battery)
            .unwrap()
            .starts_with("battery for"));
        backend.game_save(SaveDirection::Load, &battery).unwrap();
    }

    #[test]
    fn start_blocks_until_the_runtime_reports_ready() {
        let dir = tempfile::tempdir().unwrap();
        let rom = write_rom(&dir);
        let latch = Arc::new(AtomicBool::new(false));
        let runtime = ScriptedNesRuntime::with_ready_latch(Arc::clone(&latch));
        let mut backend = ScriptBackend::new(Box::new(runtime), test_config()).unwrap();

        let opener = {
            let latch = Arc::clone(&latch);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(150));
                latch.store(true, Ordering::SeqCst);
            })
        };
        let begun = Instant::now();
        assert!(backend.start(&rom).unwrap());
        assert!(begun.elapsed() >= Duration::from_millis(150));
        opener.join().unwrap();
    }

    #[test]
    fn never_ready_runtime_times_out_instead_of_hanging() {
        let mut config = test_config();
        config.ready_timeout = Duration::from_millis(100);
        let mut backend =
            ScriptBackend::new(Box::new(ScriptedNesRuntime::failing_injection()), config).unwrap();
        let err = backend.run_frame().unwrap_err();
        assert!(matches!(err, BackendError::NotReady(_)));
    }

    #[test]
    fn legacy_video_transport_delivers_identical_frames() {
        let dir = tempfile::tempdir().unwrap();
        let rom = write_rom(&dir);
        let mut backend =
            ScriptBackend::new(Box::new(ScriptedNesRuntime::legacy_video()), test_config())
                .unwrap();
        let video = Arc::new(Mutex::new(CaptureVideoSink::default()));
        backend.set_video_sink(Some(video.clone()));

        assert!(backend.start(&rom).unwrap());
        backend.run_frame().unwrap();
        assert_eq!(
            video.lock().unwrap().frames.last().unwrap(),
            &expected_frame(1, 0)
        );
    }

    #[test]
    fn load_from_unreadable_host_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let rom = write_rom(&dir);
        let mut backend =
            ScriptBackend::new(Box::new(ScriptedNesRuntime::new()), test_config()).unwrap();
        assert!(backend.start(&rom).unwrap());
        let err = backend
            .save_state(SaveDirection::Load, &dir.path().join("absent.state"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }

    #[test]
    fn unexpected_result_shapes_fail_loudly() {
        assert!(expect_bool(ScriptValue::Bool(true)).unwrap());
        let err = expect_bool(ScriptValue::Number(1.0)).unwrap_err();
        assert!(matches!(err, BackendError::ContractViolation { .. }));
        let err = expect_number(ScriptValue::Null).unwrap_err();
        assert!(matches!(err, BackendError::ContractViolation { .. }));
    }
}
