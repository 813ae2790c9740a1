//! Owned background thread with a stop flag and a bounded join.
//!
//! Each `Worker` runs exactly one thread. The thread holds the sending half of
//! a zero-capacity channel; when the body returns (or unwinds) the sender is
//! dropped and `recv_timeout` reports `Disconnected`, which lets `join_within`
//! wait for exit without blocking past its deadline.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as xch;

use crate::error::{PanError, Result};
use crate::util::duration_ms;

const DROP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) struct Worker {
    name: &'static str,
    stop: Arc<AtomicBool>,
    done: xch::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let (done_tx, done) = xch::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let _done = done_tx;
                body(flag);
                tracing::trace!(thread = name, "worker exiting cleanly");
            })
            .map_err(|e| {
                eyre::Report::new(PanError::State(format!("failed to spawn {name}: {e}")))
            })?;
        tracing::debug!(thread = name, "worker started");
        Ok(Self {
            name,
            stop,
            done,
            handle: Some(handle),
        })
    }

    pub(crate) fn signal(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Raise the stop flag and wait at most `timeout` for the thread to exit.
    ///
    /// On timeout the thread is detached and `PanError::Shutdown` is returned.
    pub(crate) fn join_within(&mut self, timeout: Duration) -> std::result::Result<(), PanError> {
        self.signal();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match self.done.recv_timeout(timeout) {
            Err(xch::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    thread = self.name,
                    timeout_ms = duration_ms(timeout),
                    "worker did not stop in time; detaching"
                );
                drop(handle);
                Err(PanError::Shutdown(self.name, duration_ms(timeout)))
            }
            Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {
                if let Err(e) = handle.join() {
                    tracing::warn!(thread = self.name, ?e, "worker panicked");
                }
                Ok(())
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.join_within(DROP_JOIN_TIMEOUT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn stops_on_flag() {
        let mut w = Worker::spawn("flag-loop", |stop| {
            while !stop.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        assert!(w.is_running());
        w.join_within(Duration::from_secs(1)).unwrap();
        assert!(!w.is_running());
    }

    #[test]
    fn stuck_thread_times_out() {
        let mut w = Worker::spawn("stuck", |_stop| {
            thread::sleep(Duration::from_millis(300));
        })
        .unwrap();
        let t0 = Instant::now();
        let err = w.join_within(Duration::from_millis(20)).unwrap_err();
        assert!(t0.elapsed() < Duration::from_millis(250));
        assert!(matches!(err, PanError::Shutdown("stuck", 20)));
    }

    #[test]
    fn panicking_body_still_joins() {
        let mut w = Worker::spawn("panics", |_stop| panic!("boom")).unwrap();
        assert!(w.join_within(Duration::from_secs(1)).is_ok());
    }
}
