use std::fmt;
use std::sync::Mutex;

/// Phase of the save/restore cycle for GPU resources.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum GpuResourcesPhase {
    #[default]
    None,
    SaveRequested,
    Saved,
    RestoreRequested,
}

impl fmt::Display for GpuResourcesPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GpuResourcesPhase::None => "None",
            GpuResourcesPhase::SaveRequested => "SaveRequested",
            GpuResourcesPhase::Saved => "Saved",
            GpuResourcesPhase::RestoreRequested => "RestoreRequested",
        };
        f.write_str(name)
    }
}

/// Save/restore coordination for suspend and resume.
///
/// Platform callbacks may call the request methods from any thread. The lock
/// is independent of the atlas registry lock, so a request never waits for a
/// frame to finish.
///
/// ```text
/// None --request_save--> SaveRequested --finish_save--> Saved
/// Saved --request_restore--> RestoreRequested --start_restoring--> None
/// SaveRequested --request_restore--> None
/// ```
#[derive(Debug, Default)]
pub struct GpuResourcesState {
    phase: Mutex<GpuResourcesPhase>,
}

impl GpuResourcesState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GpuResourcesPhase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn phase(&self) -> GpuResourcesPhase {
        *self.lock()
    }

    /// Asks the next frame end to snapshot GPU resources.
    ///
    /// Repeating a pending request succeeds.
    pub fn request_save(&self) -> bool {
        let mut phase = self.lock();
        log::debug!("request_save in phase {}", *phase);
        match *phase {
            GpuResourcesPhase::None => {
                *phase = GpuResourcesPhase::SaveRequested;
                true
            }
            GpuResourcesPhase::SaveRequested => true,
            GpuResourcesPhase::Saved | GpuResourcesPhase::RestoreRequested => {
                log::error!("request_save rejected in phase {}", *phase);
                false
            }
        }
    }

    pub fn is_saving_requested(&self) -> bool {
        *self.lock() == GpuResourcesPhase::SaveRequested
    }

    /// Marks the requested snapshot as taken.
    pub fn finish_save(&self) -> bool {
        let mut phase = self.lock();
        log::debug!("finish_save in phase {}", *phase);
        if *phase == GpuResourcesPhase::SaveRequested {
            *phase = GpuResourcesPhase::Saved;
            return true;
        }
        log::error!("finish_save rejected in phase {}", *phase);
        false
    }

    pub fn are_saved(&self) -> bool {
        *self.lock() == GpuResourcesPhase::Saved
    }

    /// Asks the next frame begin to rebuild GPU resources.
    ///
    /// A save that never completed is cancelled instead; that returns `false`
    /// as there is nothing to restore.
    pub fn request_restore(&self) -> bool {
        let mut phase = self.lock();
        log::debug!("request_restore in phase {}", *phase);
        match *phase {
            GpuResourcesPhase::Saved => {
                *phase = GpuResourcesPhase::RestoreRequested;
                true
            }
            GpuResourcesPhase::RestoreRequested => true,
            GpuResourcesPhase::SaveRequested => {
                *phase = GpuResourcesPhase::None;
                log::error!("request_restore before the save finished; nothing to restore");
                false
            }
            GpuResourcesPhase::None => {
                log::error!("request_restore rejected in phase None");
                false
            }
        }
    }

    /// Consumes a pending restore request. Returns `true` when the caller
    /// must restore now.
    ///
    /// A completed save with no restore request is dropped here.
    pub fn start_restoring_if_needed(&self) -> bool {
        let mut phase = self.lock();
        match *phase {
            GpuResourcesPhase::RestoreRequested => {
                log::debug!("restoring GPU resources");
                *phase = GpuResourcesPhase::None;
                true
            }
            GpuResourcesPhase::Saved => {
                *phase = GpuResourcesPhase::None;
                false
            }
            GpuResourcesPhase::None | GpuResourcesPhase::SaveRequested => false,
        }
    }
}
