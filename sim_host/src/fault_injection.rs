//! Deterministic fault injection for testing
//!
//! This module lets tests make the simulated host fail in controlled ways:
//! surface creation, presentation, sink opening and queue appends.
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: No randomness; every fault fires on a counted operation
//! - **Composable**: Multiple faults can be combined in one plan
//! - **Test-focused**: Not intended for production use
//!
//! ## Example
//!
//! ```
//! use sim_host::fault_injection::{FaultPlan, HostFault};
//!
//! let plan = FaultPlan::new()
//!     .with_fault(HostFault::FailSurfaceCreation { count: 1 })
//!     .with_fault(HostFault::FailPresent { after: 3 });
//! assert_eq!(plan.faults().len(), 2);
//! ```

/// A fault to inject into the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostFault {
    /// Fail the next N surface creations
    FailSurfaceCreation { count: usize },

    /// Fail every present after N successful ones
    FailPresent { after: usize },

    /// Fail the next N sink or stream opens
    FailAudioOpen { count: usize },

    /// Fail the next N queue appends
    FailQueueAudio { count: usize },

    /// Disconnect the event stream once it drains
    DisconnectWhenDrained,
}

/// A plan describing all faults to inject
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    faults: Vec<HostFault>,
}

impl FaultPlan {
    /// Creates a new empty fault plan
    pub fn new() -> Self {
        Self { faults: Vec::new() }
    }

    /// Adds a fault to the plan
    pub fn with_fault(mut self, fault: HostFault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Returns the planned faults
    pub fn faults(&self) -> &[HostFault] {
        &self.faults
    }
}

/// Stateful fault counters derived from a [`FaultPlan`]
#[derive(Debug, Default)]
pub struct FaultInjector {
    fail_surface: usize,
    fail_present_after: Option<usize>,
    presents: usize,
    fail_audio_open: usize,
    fail_queue_audio: usize,
    disconnect_when_drained: bool,
}

impl FaultInjector {
    /// Creates an injector with the given plan
    pub fn new(plan: FaultPlan) -> Self {
        let mut injector = Self::default();
        for fault in plan.faults() {
            match fault {
                HostFault::FailSurfaceCreation { count } => injector.fail_surface += count,
                HostFault::FailPresent { after } => injector.fail_present_after = Some(*after),
                HostFault::FailAudioOpen { count } => injector.fail_audio_open += count,
                HostFault::FailQueueAudio { count } => injector.fail_queue_audio += count,
                HostFault::DisconnectWhenDrained => injector.disconnect_when_drained = true,
            }
        }
        injector
    }

    /// Returns true if this surface creation should fail
    pub fn should_fail_surface(&mut self) -> bool {
        take_one(&mut self.fail_surface)
    }

    /// Returns true if this present should fail
    pub fn should_fail_present(&mut self) -> bool {
        match self.fail_present_after {
            Some(after) if self.presents >= after => true,
            _ => {
                self.presents += 1;
                false
            }
        }
    }

    /// Returns true if this sink open should fail
    pub fn should_fail_audio_open(&mut self) -> bool {
        take_one(&mut self.fail_audio_open)
    }

    /// Returns true if this queue append should fail
    pub fn should_fail_queue_audio(&mut self) -> bool {
        take_one(&mut self.fail_queue_audio)
    }

    /// Returns true if an empty event stream counts as disconnected
    pub fn disconnect_when_drained(&self) -> bool {
        self.disconnect_when_drained
    }
}

fn take_one(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}
