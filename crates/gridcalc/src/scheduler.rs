//! Recompute scheduling for asynchronous results

/// Tracks whether a recompute tick is due
///
/// The engine arms it when a pass leaves pending asynchronous calls and
/// disarms it once nothing is pending. Arming an armed scheduler is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeScheduler {
    armed: bool,
    /// How many times the scheduler went from disarmed to armed
    arm_count: usize,
}

impl RecomputeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the scheduler; returns `false` if it already was
    pub fn arm(&mut self) -> bool {
        if self.armed {
            return false;
        }
        self.armed = true;
        self.arm_count += 1;
        log::trace!("Recompute scheduler armed");
        true
    }

    /// Disarm the scheduler; returns `false` if it was not armed
    pub fn disarm(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        log::trace!("Recompute scheduler disarmed");
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn arm_count(&self) -> usize {
        self.arm_count
    }
}
