//! The designated thread owning the script runtime.
//!
//! All evaluation, completion callbacks and inbound messages happen on one
//! thread running the dispatch loop below. Bridge operations invoked from
//! any other thread are marshaled here as jobs and the invoking thread
//! blocks until its unit of work finishes — the only cross-thread
//! synchronization point in the backend.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nes_backend::{BackendError, BackendResult};

use crate::call::PendingCall;
use crate::router::CallbackRouter;
use crate::runtime::{
    CallId, RuntimeCommand, RuntimeEvent, ScriptRuntime, BOOTSTRAP_CALL_ID,
};

/// How long the loop sleeps between job polls while the runtime is idle.
/// Runtime-initiated events (bootstrap completion, delayed messages) are
/// picked up at this cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Upper bound on queued-but-unserved jobs. Marshaled callers block on a
/// full queue rather than growing it without limit.
const JOB_QUEUE_DEPTH: usize = 64;

/// Bound on waiting for a marshaled job to execute. The loop serves jobs
/// between event pumps, so hitting this means the host thread is gone.
const MARSHAL_TIMEOUT: Duration = Duration::from_secs(30);

type Job = Box<dyn FnOnce(&mut LoopContext) + Send>;

/// State owned by the dispatch loop: the runtime itself, the pending-call
/// table, the message router, and the bootstrap step.
pub struct LoopContext {
    runtime: Box<dyn ScriptRuntime>,
    pending: HashMap<CallId, Arc<PendingCall>>,
    router: CallbackRouter,
    /// Core payload waiting for `DocumentLoaded`; taken exactly once.
    payload: Option<String>,
}

impl LoopContext {
    pub fn runtime(&mut self) -> &mut dyn ScriptRuntime {
        &mut *self.runtime
    }

    pub fn router_mut(&mut self) -> &mut CallbackRouter {
        &mut self.router
    }

    pub(crate) fn register_pending(&mut self, id: CallId, call: Arc<PendingCall>) {
        self.pending.insert(id, call);
    }

    /// Drain runtime events to exhaustion, dispatching each one.
    pub fn pump(&mut self) {
        while let Some(event) = self.runtime.poll_event() {
            match event {
                RuntimeEvent::DocumentLoaded => {
                    if let Some(script) = self.payload.take() {
                        self.runtime.submit(RuntimeCommand::Evaluate {
                            id: BOOTSTRAP_CALL_ID,
                            script,
                        });
                    }
                }
                RuntimeEvent::EvaluationFinished { id, result } => {
                    if id == BOOTSTRAP_CALL_ID {
                        // Injection failure is logged, not fatal: the gate
                        // stays closed and callers time out against it.
                        if let Err(err) = result {
                            tracing::error!(%err, "core payload injection failed");
                        }
                    } else if let Some(call) = self.pending.remove(&id) {
                        call.complete(result);
                    } else {
                        tracing::debug!(id, "dropping completion for unknown call");
                    }
                }
                RuntimeEvent::Message { payload } => self.router.route(&payload),
            }
        }
    }
}

/// Owns the designated thread for one runtime instance.
///
/// Dropping the host disconnects the job queue and joins the thread; every
/// [`RuntimeHandle`] clone must be gone by then or the join would wait on
/// them.
pub struct RuntimeHost {
    jobs: Option<mpsc::SyncSender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl RuntimeHost {
    /// Move `runtime` onto a fresh designated thread and start its loop.
    /// The loop immediately loads `bootstrap_document` and injects
    /// `core_payload` once the load finishes.
    pub fn spawn(
        runtime: Box<dyn ScriptRuntime>,
        router: CallbackRouter,
        core_payload: String,
        bootstrap_document: String,
    ) -> io::Result<Self> {
        let (jobs, queue) = mpsc::sync_channel::<Job>(JOB_QUEUE_DEPTH);
        let thread = thread::Builder::new()
            .name("nes-script-runtime".to_owned())
            .spawn(move || run_loop(runtime, router, core_payload, bootstrap_document, queue))?;
        Ok(Self {
            jobs: Some(jobs),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            jobs: self
                .jobs
                .clone()
                .expect("runtime host handle requested after drop"),
        }
    }
}

impl Drop for RuntimeHost {
    fn drop(&mut self) {
        self.jobs = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_loop(
    runtime: Box<dyn ScriptRuntime>,
    router: CallbackRouter,
    core_payload: String,
    bootstrap_document: String,
    queue: mpsc::Receiver<Job>,
) {
    let mut cx = LoopContext {
        runtime,
        pending: HashMap::new(),
        router,
        payload: Some(core_payload),
    };
    cx.runtime.submit(RuntimeCommand::LoadDocument {
        source: bootstrap_document,
    });
    cx.pump();

    loop {
        match queue.recv_timeout(POLL_INTERVAL) {
            Ok(job) => {
                job(&mut cx);
                while let Ok(job) = queue.try_recv() {
                    job(&mut cx);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        cx.pump();
    }
}

/// Cloneable submit-and-block entry onto the designated thread.
#[derive(Clone)]
pub struct RuntimeHandle {
    jobs: mpsc::SyncSender<Job>,
}

impl RuntimeHandle {
    /// Run `f` on the designated thread and block until it finishes,
    /// returning its value.
    pub fn run<T, F>(&self, f: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut LoopContext) -> T + Send + 'static,
    {
        let slot: Arc<(Mutex<Option<T>>, Condvar)> = Arc::new((Mutex::new(None), Condvar::new()));
        let done = slot.clone();
        self.jobs
            .send(Box::new(move |cx| {
                let value = f(cx);
                let (lock, ready) = &*done;
                *lock.lock().expect("marshal slot poisoned") = Some(value);
                ready.notify_all();
            }))
            .map_err(|_| BackendError::RuntimeGone)?;

        let (lock, ready) = &*slot;
        let guard = lock.lock().expect("marshal slot poisoned");
        let (mut guard, wait) = ready
            .wait_timeout_while(guard, MARSHAL_TIMEOUT, |value| value.is_none())
            .expect("marshal slot poisoned");
        if wait.timed_out() && guard.is_none() {
            return Err(BackendError::RuntimeGone);
        }
        Ok(guard.take().expect("marshal job finished without a value"))
    }
}
