//! Demultiplexes out-of-band runtime messages to host handlers.

use std::sync::Arc;

use nes_backend::av::{SharedAudioSink, SharedSaveObserver, SharedVideoSink};
use nes_protocol::{Message, FRAME_BUFFER_BYTES};

use crate::readiness::ReadinessGate;

/// Routes each inbound payload to the readiness gate, the registered
/// renderers, or the save observer.
///
/// The channel is best-effort telemetry from an otherwise-opaque runtime:
/// malformed payloads and messages with no registered handler are dropped
/// silently, never escalated.
pub struct CallbackRouter {
    gate: Arc<ReadinessGate>,
    audio: Option<SharedAudioSink>,
    video: Option<SharedVideoSink>,
    save: Option<SharedSaveObserver>,
}

impl CallbackRouter {
    pub fn new(gate: Arc<ReadinessGate>) -> Self {
        Self {
            gate,
            audio: None,
            video: None,
            save: None,
        }
    }

    pub fn set_audio_sink(&mut self, sink: Option<SharedAudioSink>) {
        self.audio = sink;
    }

    pub fn set_video_sink(&mut self, sink: Option<SharedVideoSink>) {
        self.video = sink;
    }

    pub fn set_save_observer(&mut self, observer: Option<SharedSaveObserver>) {
        self.save = observer;
    }

    /// Validate and dispatch one payload. Consumes the message; nothing is
    /// retained past this call.
    pub fn route(&mut self, payload: &str) {
        let message = match Message::from_json_str(payload) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(%err, "dropping malformed runtime message");
                return;
            }
        };
        match message {
            Message::Ready => self.gate.signal(),
            Message::Audio(bytes) => {
                if let Some(sink) = &self.audio {
                    if let Ok(mut sink) = sink.lock() {
                        sink.write_samples(&bytes);
                    }
                }
            }
            Message::Video(frame) => {
                if frame.len() != FRAME_BUFFER_BYTES {
                    tracing::debug!(len = frame.len(), "dropping video frame of unexpected size");
                    return;
                }
                if let Some(sink) = &self.video {
                    if let Ok(mut sink) = sink.lock() {
                        sink.write_frame(&frame);
                    }
                }
            }
            Message::SaveRequested => {
                if let Some(observer) = &self.save {
                    if let Ok(mut observer) = observer.lock() {
                        observer.save_updated();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use nes_backend::testing::{CaptureAudioSink, CaptureVideoSink, CountingSaveObserver};

    use super::*;

    fn router_with_sinks() -> (
        CallbackRouter,
        Arc<ReadinessGate>,
        Arc<Mutex<CaptureAudioSink>>,
        Arc<Mutex<CaptureVideoSink>>,
        Arc<Mutex<CountingSaveObserver>>,
    ) {
        let gate = Arc::new(ReadinessGate::new());
        let audio = Arc::new(Mutex::new(CaptureAudioSink::default()));
        let video = Arc::new(Mutex::new(CaptureVideoSink::default()));
        let save = Arc::new(Mutex::new(CountingSaveObserver::default()));
        let mut router = CallbackRouter::new(Arc::clone(&gate));
        router.set_audio_sink(Some(audio.clone()));
        router.set_video_sink(Some(video.clone()));
        router.set_save_observer(Some(save.clone()));
        (router, gate, audio, video, save)
    }

    #[test]
    fn save_message_fires_observer_exactly_once() {
        let (mut router, _gate, audio, video, save) = router_with_sinks();
        router.route(r#"{"type":"save"}"#);
        assert_eq!(save.lock().unwrap().updates, 1);
        assert_eq!(audio.lock().unwrap().writes, 0);
        assert!(video.lock().unwrap().frames.is_empty());
    }

    #[test]
    fn ready_message_opens_the_gate() {
        let (mut router, gate, ..) = router_with_sinks();
        assert!(!gate.is_ready());
        router.route(r#"{"type":"ready"}"#);
        assert!(gate.is_ready());
    }

    #[test]
    fn audio_bytes_reach_the_sink() {
        let (mut router, _gate, audio, ..) = router_with_sinks();
        router.route(r#"{"type":"audio","data":[1,2,3]}"#);
        assert_eq!(audio.lock().unwrap().bytes, vec![1, 2, 3]);
    }

    #[test]
    fn short_video_frames_are_dropped() {
        let (mut router, _gate, _audio, video, _save) = router_with_sinks();
        router.route(r#"{"type":"video","data":[1,2,3,4]}"#);
        assert!(video.lock().unwrap().frames.is_empty());
    }

    #[test]
    fn malformed_and_unknown_payloads_touch_nothing() {
        let (mut router, gate, audio, video, save) = router_with_sinks();
        router.route(r#"{"type":"bogus"}"#);
        router.route(r#"{"no":"tag"}"#);
        router.route("not json at all");
        router.route(r#"{"type":"audio","data":"wrong"}"#);
        assert!(!gate.is_ready());
        assert_eq!(audio.lock().unwrap().writes, 0);
        assert!(video.lock().unwrap().frames.is_empty());
        assert_eq!(save.lock().unwrap().updates, 0);
    }

    #[test]
    fn absent_sinks_drop_silently() {
        let gate = Arc::new(ReadinessGate::new());
        let mut router = CallbackRouter::new(gate);
        router.route(r#"{"type":"audio","data":[1]}"#);
        router.route(r#"{"type":"save"}"#);
    }
}
