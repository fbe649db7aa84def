//! Ctrl-C handling.
//!
//! A background thread runs a small Tokio runtime that waits on
//! `tokio::signal::ctrl_c()` forever and bumps a counter. Installing the
//! listener replaces the default "kill the process" behaviour, so cleanup code
//! always gets to run. Waiters remember the counter value (an epoch) when they
//! start and stop once it moves; extra presses are harmless.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Anything a blocking loop can poll to learn it should wind down
pub trait StopSignal {
    fn should_stop(&self) -> bool;
}

impl<F: Fn() -> bool> StopSignal for F {
    fn should_stop(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    count: Arc<AtomicUsize>,
}

impl Interrupt {
    /// An interrupt that only fires through [`Interrupt::trigger`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for Ctrl-C for the rest of the process lifetime
    pub fn install() -> std::io::Result<Self> {
        let interrupt = Self::new();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let count = Arc::clone(&interrupt.count);
        std::thread::Builder::new()
            .name("ciqx-interrupt".into())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            warn!("failed to listen for Ctrl+C: {e}");
                            return;
                        }
                        let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                        debug!(count = n, "interrupt received");
                    }
                });
            })?;

        Ok(interrupt)
    }

    pub fn trigger(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn epoch(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn fired_since(&self, epoch: usize) -> bool {
        self.epoch() != epoch
    }

    /// Stop signal for "any interrupt from now on"
    pub fn watch(&self) -> InterruptWatch {
        InterruptWatch {
            interrupt: self.clone(),
            epoch: self.epoch(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterruptWatch {
    interrupt: Interrupt,
    epoch: usize,
}

impl InterruptWatch {
    pub fn fired(&self) -> bool {
        self.interrupt.fired_since(self.epoch)
    }
}

impl StopSignal for InterruptWatch {
    fn should_stop(&self) -> bool {
        self.fired()
    }
}
