//! End-to-end session scenarios over the script-hosted backend, driven
//! against the scripted in-memory runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use nes_backend::testing::{CaptureAudioSink, CaptureVideoSink};
use nes_backend::{CheatKind, SaveDirection};
use nes_script::testing::{ScriptedNesRuntime, CORE_PAYLOAD};
use nes_session::{EmulatorBridge, ScriptBackendConfig, SessionError};

// One live session per process; every test here creates one.
static SESSION_TEST_LOCK: Mutex<()> = Mutex::new(());

fn session_lock() -> MutexGuard<'static, ()> {
    SESSION_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn test_config() -> ScriptBackendConfig {
    let mut config = ScriptBackendConfig::new(CORE_PAYLOAD);
    config.ready_timeout = Duration::from_secs(5);
    config.eval_timeout = Duration::from_secs(5);
    config
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn script_session_end_to_end() {
    init_tracing();
    let _guard = session_lock();
    let dir = tempfile::tempdir().unwrap();
    let rom = dir.path().join("mario.nes");
    std::fs::write(&rom, b"NES\x1a test rom").unwrap();

    let mut session =
        EmulatorBridge::script(Box::new(ScriptedNesRuntime::new()), test_config()).unwrap();

    let video = Arc::new(Mutex::new(CaptureVideoSink::default()));
    let audio = Arc::new(Mutex::new(CaptureAudioSink::default()));
    session.set_video_sink(Some(video.clone()));
    session.set_audio_sink(Some(audio.clone()));

    assert!(session.start(&rom));
    assert_eq!(session.game(), Some(rom.as_path()));
    assert_eq!(session.frame_duration(), 1.0 / 60.0);

    session.run_frame(true).unwrap();
    session.run_frame(true).unwrap();
    assert_eq!(video.lock().unwrap().frames.len(), 2);
    assert_eq!(video.lock().unwrap().processed, 2);
    assert_eq!(audio.lock().unwrap().writes, 2);

    // Save-state round trip through the sandboxed filesystem.
    let state = dir.path().join("mario.state");
    session.save_state(SaveDirection::Save, &state).unwrap();
    assert!(state.is_file());
    session.run_frame(false).unwrap();
    let after_save = video.lock().unwrap().frames.last().cloned().unwrap();
    session.save_state(SaveDirection::Load, &state).unwrap();
    session.run_frame(false).unwrap();
    assert_eq!(
        video.lock().unwrap().frames.last().cloned().unwrap(),
        after_save
    );

    assert!(session.add_cheat("SXIOPO", CheatKind::GameGenie6));
    assert!(!session.add_cheat("SXIOPO\nBAD", CheatKind::GameGenie6));
    session.reset_cheats().unwrap();

    session.stop();
    session.stop();
    assert!(session.game().is_none());

    // A game file the host cannot read never reaches the core.
    assert!(!session.start(&dir.path().join("missing.nes")));
    assert!(session.game().is_none());
}

#[test]
fn script_session_start_blocks_until_ready() {
    let _guard = session_lock();
    let dir = tempfile::tempdir().unwrap();
    let rom = dir.path().join("mario.nes");
    std::fs::write(&rom, b"NES\x1a").unwrap();

    let latch = Arc::new(AtomicBool::new(false));
    let runtime = ScriptedNesRuntime::with_ready_latch(Arc::clone(&latch));
    let mut session = EmulatorBridge::script(Box::new(runtime), test_config()).unwrap();

    let opener = {
        let latch = Arc::clone(&latch);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            latch.store(true, Ordering::SeqCst);
        })
    };
    let begun = Instant::now();
    assert!(session.start(&rom));
    assert!(begun.elapsed() >= Duration::from_millis(150));
    opener.join().unwrap();
}

#[test]
fn second_session_is_rejected_while_the_first_lives() {
    let _guard = session_lock();
    let first =
        EmulatorBridge::script(Box::new(ScriptedNesRuntime::new()), test_config()).unwrap();
    let err = EmulatorBridge::script(Box::new(ScriptedNesRuntime::new()), test_config())
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::SessionActive));
    drop(first);
    EmulatorBridge::script(Box::new(ScriptedNesRuntime::new()), test_config()).unwrap();
}
