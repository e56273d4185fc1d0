//! In-memory scripted runtime standing in for a real script engine.
//!
//! [`ScriptedNesRuntime`] hosts a tiny deterministic "core": it understands
//! exactly the entry points the backend evaluates, keeps a private file map,
//! and posts ready/audio/video messages the way the real payload does. All
//! behavior is synchronous inside `submit`, so tests are deterministic; the
//! ready announcement can be latched open later to exercise blocking
//! callers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use nes_protocol::{frame, Message, FRAME_BUFFER_BYTES};
use serde_json::json;

use crate::runtime::{
    RuntimeCommand, RuntimeEvent, ScriptError, ScriptRuntime, ScriptValue, BOOTSTRAP_CALL_ID,
};

/// Stand-in for the compiled core payload injected at bootstrap.
pub const CORE_PAYLOAD: &str = "globalThis.NESBridge = bootNesCore();";

const AUDIO_CHUNK_BYTES: usize = 735 * 2;

/// The frame the scripted core renders for a given machine state; exposed so
/// tests can assert delivered frames byte-for-byte.
pub fn expected_frame(frames: u64, inputs: u32) -> Vec<u8> {
    let seed = frames
        .wrapping_mul(2_654_435_761)
        .wrapping_add(inputs as u64);
    let mut bytes = Vec::with_capacity(FRAME_BUFFER_BYTES);
    for i in 0..FRAME_BUFFER_BYTES / 2 {
        // Masked to stay clear of the surrogate range so the legacy string
        // transport can carry every frame the fake produces.
        let unit = (seed.wrapping_add(i as u64) & 0x3fff) as u16;
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

pub struct ScriptedNesRuntime {
    events: VecDeque<RuntimeEvent>,
    files: HashMap<String, Vec<u8>>,
    started: Option<String>,
    frames: u64,
    inputs: u32,
    cheats: Vec<String>,
    injected: bool,
    announced_ready: bool,
    fail_injection: bool,
    legacy_video: bool,
    ready_latch: Option<Arc<AtomicBool>>,
    eval_log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedNesRuntime {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            files: HashMap::new(),
            started: None,
            frames: 0,
            inputs: 0,
            cheats: Vec::new(),
            injected: false,
            announced_ready: false,
            fail_injection: false,
            legacy_video: false,
            ready_latch: None,
            eval_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Announce ready only once `latch` is set, instead of right after the
    /// payload injection.
    pub fn with_ready_latch(latch: Arc<AtomicBool>) -> Self {
        Self {
            ready_latch: Some(latch),
            ..Self::new()
        }
    }

    /// Reject the injected core payload; the runtime never becomes ready.
    pub fn failing_injection() -> Self {
        Self {
            fail_injection: true,
            ..Self::new()
        }
    }

    /// Ship video frames over the legacy UTF-16 packed-string transport.
    pub fn legacy_video() -> Self {
        Self {
            legacy_video: true,
            ..Self::new()
        }
    }

    /// Every script evaluated so far, in order.
    pub fn eval_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.eval_log)
    }

    fn post(&mut self, message: Message) {
        self.events.push_back(RuntimeEvent::Message {
            payload: message.to_json().to_string(),
        });
    }

    fn dispatch(&mut self, script: &str) -> Result<ScriptValue, ScriptError> {
        let Some((name, args)) = parse_call(script) else {
            return Err(ScriptError(format!("SyntaxError: {script}")));
        };
        match name {
            "NESBridge.writeFile" => {
                let bytes = BASE64
                    .decode(arg(&args, 1)?)
                    .map_err(|err| ScriptError(format!("Error: bad file payload: {err}")))?;
                self.files.insert(arg(&args, 0)?.to_owned(), bytes);
                Ok(ScriptValue::Null)
            }
            "NESBridge.readFile" => Ok(self
                .files
                .get(arg(&args, 0)?)
                .map(|bytes| ScriptValue::Bytes(bytes.clone()))
                .unwrap_or(ScriptValue::Null)),
            "NESStartEmulation" => {
                let path = arg(&args, 0)?;
                if self.files.contains_key(path) {
                    self.started = Some(path.to_owned());
                    self.frames = 0;
                    self.inputs = 0;
                    Ok(ScriptValue::Bool(true))
                } else {
                    Ok(ScriptValue::Bool(false))
                }
            }
            "NESStopEmulation" => {
                self.started = None;
                Ok(ScriptValue::Null)
            }
            "NESFrameDuration" => Ok(ScriptValue::Number(1.0 / 60.0)),
            "NESRunFrame" => {
                self.frames += 1;
                let audio: Vec<u8> = (0..AUDIO_CHUNK_BYTES)
                    .map(|i| (self.frames.wrapping_add(i as u64) & 0xff) as u8)
                    .collect();
                self.post(Message::Audio(audio));
                let video = expected_frame(self.frames, self.inputs);
                if self.legacy_video {
                    let packed = frame::pack_utf16(&video).expect("fake frame packs cleanly");
                    self.events.push_back(RuntimeEvent::Message {
                        payload: json!({ "type": "video", "data": packed }).to_string(),
                    });
                } else {
                    self.post(Message::Video(video));
                }
                Ok(ScriptValue::Null)
            }
            "NESActivateInput" => {
                self.inputs |= number_arg(&args, 0)?;
                Ok(ScriptValue::Null)
            }
            "NESDeactivateInput" => {
                self.inputs &= !number_arg(&args, 0)?;
                Ok(ScriptValue::Null)
            }
            "NESResetInputs" => {
                self.inputs = 0;
                Ok(ScriptValue::Null)
            }
            "NESSaveSaveState" => {
                let blob = format!("state frames={} inputs={}", self.frames, self.inputs);
                self.files.insert(arg(&args, 0)?.to_owned(), blob.into_bytes());
                Ok(ScriptValue::Null)
            }
            "NESLoadSaveState" => {
                let path = arg(&args, 0)?;
                let blob = self
                    .files
                    .get(path)
                    .ok_or_else(|| ScriptError(format!("Error: no virtual file {path}")))?;
                let blob = String::from_utf8_lossy(blob);
                let (frames, inputs) = parse_state_blob(&blob)
                    .ok_or_else(|| ScriptError("Error: corrupt save state".to_owned()))?;
                self.frames = frames;
                self.inputs = inputs;
                Ok(ScriptValue::Null)
            }
            "NESSaveGameSave" => {
                let game = self.started.clone().unwrap_or_default();
                self.files.insert(
                    arg(&args, 0)?.to_owned(),
                    format!("battery for {game}").into_bytes(),
                );
                Ok(ScriptValue::Null)
            }
            "NESLoadGameSave" => {
                let path = arg(&args, 0)?;
                if self.files.contains_key(path) {
                    Ok(ScriptValue::Null)
                } else {
                    Err(ScriptError(format!("Error: no virtual file {path}")))
                }
            }
            "NESAddCheatCode" => {
                let code = arg(&args, 0)?;
                let decodable = (code.len() == 6 || code.len() == 8)
                    && code.bytes().all(|b| b.is_ascii_alphabetic());
                if decodable {
                    self.cheats.push(code.to_owned());
                }
                Ok(ScriptValue::Bool(decodable))
            }
            "NESResetCheats" => {
                self.cheats.clear();
                Ok(ScriptValue::Null)
            }
            other => Err(ScriptError(format!("ReferenceError: {other} is not defined"))),
        }
    }
}

impl Default for ScriptedNesRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRuntime for ScriptedNesRuntime {
    fn submit(&mut self, command: RuntimeCommand) {
        match command {
            RuntimeCommand::LoadDocument { .. } => {
                self.events.push_back(RuntimeEvent::DocumentLoaded);
            }
            RuntimeCommand::Evaluate { id, script } => {
                self.eval_log.lock().unwrap().push(script.clone());
                if id == BOOTSTRAP_CALL_ID {
                    let result = if self.fail_injection {
                        Err(ScriptError("SyntaxError: unexpected token".to_owned()))
                    } else {
                        self.injected = true;
                        Ok(ScriptValue::Null)
                    };
                    self.events
                        .push_back(RuntimeEvent::EvaluationFinished { id, result });
                } else {
                    let result = self.dispatch(&script);
                    self.events
                        .push_back(RuntimeEvent::EvaluationFinished { id, result });
                }
            }
        }
    }

    fn poll_event(&mut self) -> Option<RuntimeEvent> {
        let latch_open = self
            .ready_latch
            .as_ref()
            .map_or(true, |latch| latch.load(Ordering::SeqCst));
        if self.injected && !self.announced_ready && latch_open {
            self.announced_ready = true;
            let payload = Message::Ready.to_json().to_string();
            self.events.push_back(RuntimeEvent::Message { payload });
        }
        self.events.pop_front()
    }
}

fn arg<'a>(args: &'a [String], index: usize) -> Result<&'a str, ScriptError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| ScriptError(format!("TypeError: missing argument {index}")))
}

fn number_arg(args: &[String], index: usize) -> Result<u32, ScriptError> {
    arg(args, index)?
        .parse()
        .map_err(|_| ScriptError(format!("TypeError: argument {index} is not a number")))
}

fn parse_state_blob(blob: &str) -> Option<(u64, u32)> {
    let rest = blob.strip_prefix("state frames=")?;
    let (frames, inputs) = rest.split_once(" inputs=")?;
    Some((frames.parse().ok()?, inputs.trim().parse().ok()?))
}

/// Parse `Name(arg, 'quoted arg');` into the name and unquoted argument
/// texts. Only as smart as the machine-generated snippets require.
fn parse_call(script: &str) -> Option<(&str, Vec<String>)> {
    let script = script.trim().trim_end_matches(';');
    let open = script.find('(')?;
    let close = script.rfind(')')?;
    let name = &script[..open];
    let inside = &script[open + 1..close];
    Some((name, split_args(inside)))
}

fn split_args(inside: &str) -> Vec<String> {
    let mut args = Vec::new();
    if inside.trim().is_empty() {
        return args;
    }
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quote = false;
    let mut escaped = false;
    for ch in inside.chars() {
        if escaped {
            current.push(match ch {
                'n' => '\n',
                'r' => '\r',
                other => other,
            });
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quote => escaped = true,
            '\'' => {
                in_quote = !in_quote;
                quoted = true;
            }
            ',' if !in_quote => {
                args.push(finish_arg(&mut current, &mut quoted));
            }
            _ if !in_quote && ch.is_whitespace() => {}
            _ => current.push(ch),
        }
    }
    args.push(finish_arg(&mut current, &mut quoted));
    args
}

fn finish_arg(current: &mut String, quoted: &mut bool) -> String {
    let text = if *quoted {
        current.clone()
    } else {
        current.trim().to_owned()
    };
    current.clear();
    *quoted = false;
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generated_snippets() {
        let (name, args) = parse_call("NESActivateInput(16, 0);").unwrap();
        assert_eq!(name, "NESActivateInput");
        assert_eq!(args, ["16", "0"]);

        let (name, args) = parse_call(r"NESBridge.writeFile('it\'s.nes', 'QUJD');").unwrap();
        assert_eq!(name, "NESBridge.writeFile");
        assert_eq!(args, ["it's.nes", "QUJD"]);

        let (name, args) = parse_call("NESResetInputs();").unwrap();
        assert_eq!(name, "NESResetInputs");
        assert!(args.is_empty());
    }

    #[test]
    fn expected_frame_is_deterministic_and_packable() {
        let frame_bytes = expected_frame(7, 0x11);
        assert_eq!(frame_bytes.len(), FRAME_BUFFER_BYTES);
        assert_eq!(frame_bytes, expected_frame(7, 0x11));
        assert_ne!(frame_bytes, expected_frame(8, 0x11));
        let packed = frame::pack_utf16(&frame_bytes).unwrap();
        assert_eq!(frame::unpack_utf16(&packed), frame_bytes);
    }
}
