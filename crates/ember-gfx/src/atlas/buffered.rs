use std::sync::Mutex;

use super::deferred::FrameOp;

/// Operations issued before the first frame.
///
/// The driver's limits are unknown until the first `begin_frame`, so nothing
/// can be placed on a backend before then. The queue is flushed exactly once;
/// afterwards it refuses new work and callers fall back to the deferred queue.
pub(crate) struct DelayedCommands {
    /// `None` once flushed.
    commands: Mutex<Option<Vec<FrameOp>>>,
}

impl DelayedCommands {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Some(Vec::new())),
        }
    }

    /// Queues `op` unless the queue was already flushed, in which case it is
    /// handed back.
    pub fn try_push(&self, op: FrameOp) -> Result<(), FrameOp> {
        match self.commands.lock().unwrap_or_else(|e| e.into_inner()).as_mut() {
            Some(commands) => {
                commands.push(op);
                Ok(())
            }
            None => Err(op),
        }
    }

    /// Takes the queued operations and disables the queue for good.
    ///
    /// Returns `None` on every call after the first.
    pub fn take(&self) -> Option<Vec<FrameOp>> {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn is_flushed(&self) -> bool {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

impl std::fmt::Debug for DelayedCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedCommands")
            .field("flushed", &self.is_flushed())
            .finish()
    }
}
