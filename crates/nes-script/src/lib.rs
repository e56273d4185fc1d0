//! Script-hosted backend: the NES core compiled to a script payload, running
//! inside a sandboxed runtime and reached only through asynchronous
//! evaluation and message passing.
//!
//! The pieces, leaf first:
//! - [`runtime`] — the command/event surface a concrete script engine must
//!   implement ([`runtime::ScriptRuntime`]).
//! - [`host`] — the designated thread owning the runtime, its dispatch loop,
//!   and the submit-and-block marshaling primitive.
//! - [`call::SyncCallBridge`] — one asynchronous evaluation presented as a
//!   blocking call from any thread.
//! - [`readiness::ReadinessGate`] — gates every control operation until the
//!   runtime's bootstrap completes.
//! - [`router::CallbackRouter`] — demultiplexes out-of-band runtime messages
//!   (ready / audio / video / save) to host handlers.
//! - [`vfs::VirtualFileChannel`] — moves byte buffers between host storage
//!   and the runtime's private filesystem.
//! - [`ScriptBackend`] — composes the above behind the uniform
//!   `EmulatorBackend` surface.
#![forbid(unsafe_code)]

pub mod call;
pub mod host;
pub mod readiness;
pub mod router;
pub mod runtime;
pub mod vfs;

mod backend;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{ScriptBackend, ScriptBackendConfig, EMPTY_DOCUMENT};
