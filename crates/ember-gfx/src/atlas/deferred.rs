use std::sync::Mutex;

use crate::driver::GraphicsDriver;
use crate::error::GfxResult;

use super::registry::Registry;

/// Work that needs the registry and the driver, run at a frame boundary.
pub(crate) type FrameOp =
    Box<dyn FnOnce(&mut Registry, &mut dyn GraphicsDriver) -> GfxResult<()> + Send>;

/// Queue filled from any thread and drained by the render thread at
/// `begin_frame`.
///
/// The lock is held only to push or to swap the list out; operations run
/// without it, so they may enqueue more work for the next frame.
#[derive(Default)]
pub(crate) struct DeferredQueue {
    ops: Mutex<Vec<FrameOp>>,
}

impl DeferredQueue {
    pub fn push(&self, op: FrameOp) {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Runs every queued operation in FIFO order.
    ///
    /// A failing operation does not stop the ones after it; disposals queued
    /// behind a bad write still run. The first error is returned once the
    /// queue is empty.
    pub fn drain(&self, registry: &mut Registry, driver: &mut dyn GraphicsDriver) -> GfxResult<()> {
        let ops = std::mem::take(&mut *self.ops.lock().unwrap_or_else(|e| e.into_inner()));
        run_all(ops, registry, driver)
    }
}

/// Runs `ops` in order and returns the first error, if any.
pub(crate) fn run_all(
    ops: Vec<FrameOp>,
    registry: &mut Registry,
    driver: &mut dyn GraphicsDriver,
) -> GfxResult<()> {
    let mut first_err = None;
    for op in ops {
        if let Err(err) = op(registry, driver) {
            log::error!("queued frame operation failed: {err}");
            first_err.get_or_insert(err);
        }
    }
    first_err.map_or(Ok(()), Err)
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue").field("len", &self.len()).finish()
    }
}
