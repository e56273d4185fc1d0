//! One asynchronous evaluation, presented as a blocking call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use nes_backend::{BackendError, BackendResult};

use crate::host::RuntimeHandle;
use crate::runtime::{RuntimeCommand, ScriptError, ScriptValue, BOOTSTRAP_CALL_ID};

/// Per-invocation completion slot: flag plus captured result-or-error.
/// Created by [`SyncCallBridge::eval`], completed exactly once by the
/// dispatch loop, destroyed when the blocking wait returns.
pub(crate) struct PendingCall {
    state: Mutex<Option<Result<ScriptValue, ScriptError>>>,
    done: Condvar,
}

impl PendingCall {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(None),
            done: Condvar::new(),
        })
    }

    pub(crate) fn complete(&self, result: Result<ScriptValue, ScriptError>) {
        let mut state = self.state.lock().expect("pending call poisoned");
        if state.is_some() {
            tracing::warn!("pending call completed twice; keeping the first result");
            return;
        }
        *state = Some(result);
        self.done.notify_all();
    }

    fn wait(&self, timeout: Duration) -> BackendResult<ScriptValue> {
        let state = self.state.lock().expect("pending call poisoned");
        let (mut state, wait) = self
            .done
            .wait_timeout_while(state, timeout, |state| state.is_none())
            .expect("pending call poisoned");
        if wait.timed_out() && state.is_none() {
            return Err(BackendError::EvaluationTimeout(timeout));
        }
        match state.take().expect("pending call completed without result") {
            Ok(value) => Ok(value),
            Err(err) => Err(BackendError::Evaluation(err.0)),
        }
    }
}

/// Converts one asynchronous script evaluation into a blocking call from any
/// thread: issue the `Evaluate` on the designated thread, then park on the
/// pending call until the dispatch loop delivers its completion.
#[derive(Clone)]
pub struct SyncCallBridge {
    handle: RuntimeHandle,
    timeout: Duration,
    next_id: Arc<AtomicU64>,
}

impl SyncCallBridge {
    pub(crate) fn new(handle: RuntimeHandle, timeout: Duration) -> Self {
        Self {
            handle,
            timeout,
            next_id: Arc::new(AtomicU64::new(BOOTSTRAP_CALL_ID + 1)),
        }
    }

    /// Evaluate `script`, returning the evaluation's result value or its
    /// raised error. Does not return before the evaluation completed (or
    /// the bounded wait expired).
    pub fn eval(&self, script: &str) -> BackendResult<ScriptValue> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let call = PendingCall::new();
        let registered = Arc::clone(&call);
        let script = script.to_owned();
        self.handle.run(move |cx| {
            cx.register_pending(id, registered);
            cx.runtime().submit(RuntimeCommand::Evaluate { id, script });
        })?;
        call.wait(self.timeout)
    }
}
