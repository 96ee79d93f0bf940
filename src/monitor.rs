use std::io;
use std::sync::{Arc, Weak};
use std::thread;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::multi::Registry;
use crate::utils::Warning;

/// Background thread that periodically asks a registry to unstick bars.
///
/// The thread only holds a weak pointer to the registry so that dropping the
/// registry ends it.
pub(crate) struct Monitor {
    signal: Arc<Signal>,
    handle: thread::JoinHandle<()>,
}

#[derive(Default)]
struct Signal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl Signal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }
}

impl Monitor {
    pub(crate) fn spawn(registry: Weak<Registry>) -> io::Result<Monitor> {
        let signal = Arc::new(Signal::default());
        let handle = thread::Builder::new()
            .name("progmeter-monitor".into())
            .spawn({
                let signal = signal.clone();
                move || run(registry, &signal)
            })?;
        Ok(Monitor { signal, handle })
    }

    /// Tells the thread to finish without waiting for it.
    pub(crate) fn stop(self) {
        self.signal.stop();
    }

    /// Tells the thread to finish and waits for it, unless called from the
    /// monitor thread itself.
    pub(crate) fn exit(self) {
        self.signal.stop();
        if self.handle.thread().id() != thread::current().id() {
            let _ = self.handle.join();
        }
    }
}

fn run(registry: Weak<Registry>, signal: &Signal) {
    loop {
        // never hold the registry alive while sleeping
        let interval = match registry.upgrade() {
            Some(registry) => registry.monitor_interval(),
            None => return,
        };
        if interval.is_zero() {
            return;
        }

        let mut stopped = signal.stopped.lock();
        if !*stopped {
            signal.wake.wait_for(&mut stopped, interval);
        }
        if *stopped {
            return;
        }
        drop(stopped);

        match registry.upgrade() {
            Some(registry) => {
                let forced = registry.poll_stalled(Instant::now());
                if forced > 0 {
                    log::trace!(
                        target: Warning::Monitor.target(),
                        "forced {} stalled bar(s)",
                        forced
                    );
                }
            }
            None => return,
        }
    }
}
