use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Host-owned cancellation signal, shared with the orchestrator by cloning.
///
/// Hosts implement timeouts by raising the flag from their own timer.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
