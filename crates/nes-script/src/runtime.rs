//! Command/event surface of the sandboxed script engine.
//!
//! The engine itself is an external collaborator (a JS-core instance, a web
//! view, an in-memory fake); the bridge only assumes:
//! - commands are accepted without blocking and take effect asynchronously,
//! - every `Evaluate` eventually produces exactly one `EvaluationFinished`
//!   with the same id,
//! - out-of-band messages from the hosted core surface as `Message` events,
//! - all of it happens on the single designated thread that polls the
//!   runtime (the engine is moved there and never touched from elsewhere).

use thiserror::Error;

/// Correlates an `Evaluate` command with its `EvaluationFinished` event.
pub type CallId = u64;

/// Call id reserved for the core payload injected during bootstrap.
pub const BOOTSTRAP_CALL_ID: CallId = 0;

/// Result value of a finished evaluation, in the fixed set of shapes the
/// bridge understands. Anything else a real engine produces maps to the
/// closest variant (or `Null`) at the engine adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl ScriptValue {
    /// Human-readable shape name for contract-violation reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "a boolean",
            ScriptValue::Number(_) => "a number",
            ScriptValue::Text(_) => "a string",
            ScriptValue::Bytes(_) => "a byte buffer",
        }
    }
}

/// Error raised by an evaluation inside the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ScriptError(pub String);

/// Host → runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCommand {
    /// Load a document into the fresh runtime instance. Completion surfaces
    /// as [`RuntimeEvent::DocumentLoaded`].
    LoadDocument { source: String },
    /// Evaluate script text. Completion surfaces as
    /// [`RuntimeEvent::EvaluationFinished`] with the same `id`.
    Evaluate { id: CallId, script: String },
}

/// Runtime → host, delivered via polling on the designated thread.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// The document load finished; the runtime can evaluate script now.
    DocumentLoaded,
    /// An evaluation completed with a result or a raised error.
    EvaluationFinished {
        id: CallId,
        result: Result<ScriptValue, ScriptError>,
    },
    /// Out-of-band message from the hosted core (JSON text, see
    /// `nes_protocol::Message`).
    Message { payload: String },
}

/// A sandboxed script engine as the bridge sees it.
pub trait ScriptRuntime: Send {
    /// Queue a command. Must not block.
    fn submit(&mut self, command: RuntimeCommand);

    /// Pop the next pending event, advancing the engine as needed.
    /// `None` means idle.
    fn poll_event(&mut self) -> Option<RuntimeEvent>;
}
