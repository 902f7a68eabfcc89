use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit status used when the user aborts a run.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Stop starting new chunk calls and let the ones in flight finish.
    FinishInFlight,
    /// Leave the process now.
    Exit,
}

/// Decides what a Ctrl-C does at the current point of a run.
///
/// Only the chunk pass can stop gracefully. A first interrupt there cancels
/// the run; any other interrupt exits.
#[derive(Debug, Clone, Default)]
pub struct InterruptState {
    token: CancellationToken,
    chunk_pass: Arc<AtomicBool>,
}

impl InterruptState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn set_chunk_pass(&self, active: bool) {
        self.chunk_pass.store(active, Ordering::SeqCst);
    }

    pub fn on_interrupt(&self) -> InterruptAction {
        if self.chunk_pass.load(Ordering::SeqCst) && !self.token.is_cancelled() {
            self.token.cancel();
            InterruptAction::FinishInFlight
        } else {
            InterruptAction::Exit
        }
    }
}
