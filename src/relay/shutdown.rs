use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide "stop accepting" flag.
///
/// Set by a participant's SHUTDOWN_ALL or by an operator signal; polled by the
/// accept loop between iterations. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The raw flag, for `signal_hook::flag::register`.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Sets the flag on SIGINT and SIGTERM.
    pub fn register_os_signals(&self) -> std::io::Result<()> {
        use signal_hook::consts::signal::{SIGINT, SIGTERM};
        signal_hook::flag::register(SIGINT, self.flag())?;
        signal_hook::flag::register(SIGTERM, self.flag())?;
        Ok(())
    }
}
