//! Background expiry sweeper.
//!
//! Runs `sweep_expired` on a dedicated thread at a fixed cadence, bounding
//! memory even for keys that are never read again. The sweep shares the
//! store mutex with foreground reads and writes.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::store::CacheStore;

struct SweepSignal {
    stop: Mutex<bool>,
    wake: Condvar,
}

/// Owns the sweeper thread; stopping joins it.
pub struct SweepHandle {
    signal: Arc<SweepSignal>,
    thread: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Start sweeping `store` every `interval`.
    pub fn spawn<V>(store: Arc<CacheStore<V>>, interval: Duration) -> Self
    where
        V: Clone + Send + 'static,
    {
        let signal = Arc::new(SweepSignal {
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_signal = Arc::clone(&signal);

        let thread = thread::Builder::new()
            .name("calcengine-sweeper".to_string())
            .spawn(move || {
                loop {
                    {
                        let guard = thread_signal
                            .stop
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        if *guard {
                            break;
                        }
                        let (guard, _timed_out) = thread_signal
                            .wake
                            .wait_timeout(guard, interval)
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        if *guard {
                            break;
                        }
                    }
                    let removed = store.sweep_expired();
                    if removed > 0 {
                        debug!(removed, "sweeper pass removed expired entries");
                    }
                }
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "failed to start cache sweeper; active expiry disabled");
                None
            }
        };

        Self { signal, thread }
    }

    /// Signal the thread to exit and wait for it.
    pub fn stop(&mut self) {
        {
            let mut guard = self
                .signal
                .stop
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = true;
        }
        self.signal.wake.notify_all();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
