//! Gate holding control operations until backend bootstrap completes.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use nes_backend::{BackendError, BackendResult};

/// Monotonic false→true readiness flag.
///
/// `signal` flips the flag at most once per gate; there is no way back short
/// of tearing the backend down and building a new one.
pub struct ReadinessGate {
    ready: Mutex<bool>,
    flipped: Condvar,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            flipped: Condvar::new(),
        }
    }

    /// Mark the backend ready, waking every blocked waiter. Idempotent.
    pub fn signal(&self) {
        let mut ready = self.ready.lock().expect("readiness gate poisoned");
        if !*ready {
            *ready = true;
            self.flipped.notify_all();
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.lock().expect("readiness gate poisoned")
    }

    /// Block until the gate opens. Callers must not skip ahead to failure
    /// while bootstrap is still in flight; only the bounded wait expiring
    /// reports [`BackendError::NotReady`].
    pub fn wait(&self, timeout: Duration) -> BackendResult<()> {
        let ready = self.ready.lock().expect("readiness gate poisoned");
        let (ready, _) = self
            .flipped
            .wait_timeout_while(ready, timeout, |ready| !*ready)
            .expect("readiness gate poisoned");
        if *ready {
            Ok(())
        } else {
            Err(BackendError::NotReady(timeout))
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    #[test]
    fn wait_times_out_while_closed() {
        let gate = ReadinessGate::new();
        assert!(!gate.is_ready());
        let err = gate.wait(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, BackendError::NotReady(_)));
    }

    #[test]
    fn signal_is_idempotent_and_wakes_waiters() {
        let gate = Arc::new(ReadinessGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                let start = Instant::now();
                gate.wait(Duration::from_secs(5)).unwrap();
                start.elapsed()
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        gate.signal();
        gate.signal();
        let waited = waiter.join().unwrap();
        assert!(waited >= Duration::from_millis(40));
        assert!(gate.is_ready());
        gate.wait(Duration::from_millis(1)).unwrap();
    }
}
