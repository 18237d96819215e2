//! Caller-initiated cancellation.
//!
//! An [`Interrupt`] is a shared flag polled by the walker, the annotator and
//! the prompt. The binary wires it to SIGINT/SIGTERM; a second SIGINT while
//! the flag is already set terminates the process.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::debug;

/// Exit status used when a run is cancelled by a signal.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Create an untriggered flag that no signal is attached to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag triggered by SIGINT and SIGTERM.
    pub fn register_signals() -> io::Result<Self> {
        let interrupt = Self::new();

        // Order matters: the conditional shutdown sees the flag before the
        // plain registration sets it, so only a repeated signal exits.
        signal_hook::flag::register_conditional_shutdown(
            SIGINT,
            INTERRUPTED_EXIT_CODE,
            Arc::clone(&interrupt.flag),
        )?;
        signal_hook::flag::register(SIGINT, Arc::clone(&interrupt.flag))?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&interrupt.flag))?;

        debug!("signal handlers registered");
        Ok(interrupt)
    }

    /// Request cancellation.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Check an optional interrupt.
pub(crate) fn triggered(interrupt: Option<&Interrupt>) -> bool {
    interrupt.is_some_and(Interrupt::is_triggered)
}
