//! Platform Layer Test Utilities
//!
//! Shared helpers for the cross-crate integration tests.
//!
//! ## Test Philosophy
//!
//! - **End to end**: Every test drives `Pal` through the simulated host, the
//!   same path a real backend takes
//! - **Deterministic**: Host events are injected, faults come from a
//!   `FaultPlan`
//! - **Ownership first**: After every step a buffer has exactly one holder

use core_types::Cap;
use pal::{EventPayload, EventRecord, FrameBufferOpts, Pal, PalConfig, PalResult};
use sim_host::{SimHostConfig, SimulatedHost};

/// Creates a runtime over a default simulated host
pub fn test_pal() -> Pal<SimulatedHost> {
    test_pal_with(SimulatedHost::default(), PalConfig::default())
}

/// Creates a runtime over `host` with the ownership audit trail enabled
pub fn test_pal_with(host: SimulatedHost, config: PalConfig) -> Pal<SimulatedHost> {
    match Pal::new(host, config) {
        Ok(pal) => pal.with_audit(),
        Err(err) => panic!("test runtime failed to start: {}", err),
    }
}

/// Simulated host with a fixed display size
pub fn host_with_bounds(width: u32, height: u32) -> SimulatedHost {
    SimulatedHost::new(SimHostConfig::new().with_display_bounds(width, height))
}

/// Reads and consumes the next record of `queue`
pub fn next_record(pal: &mut Pal<SimulatedHost>, queue: Cap) -> PalResult<Option<EventRecord>> {
    let record = pal.queue_read(queue)?;
    if record.is_some() {
        pal.queue_advance(queue)?;
    }
    Ok(record)
}

/// Pumps until a Frame arrives in `queue` and returns its buffer
///
/// Records other than Frame are skipped. Returns `None` once the host has
/// nothing left.
pub fn next_frame(pal: &mut Pal<SimulatedHost>, queue: Cap) -> PalResult<Option<Cap>> {
    loop {
        match next_record(pal, queue)? {
            Some(EventRecord {
                payload: EventPayload::Frame { buffer, .. },
                ..
            }) => return Ok(Some(buffer)),
            Some(_) => {}
            None if pal.queue_empty(queue)? => return Ok(None),
            None => {}
        }
    }
}

/// Creates an 8 bpp framebuffer bound to a fresh queue
pub fn palette_framebuffer(
    pal: &mut Pal<SimulatedHost>,
    opts: FrameBufferOpts,
    width: u32,
    height: u32,
) -> PalResult<Cap> {
    let queue = pal.queue_new(12)?;
    pal.framebuffer_create(Cap::FRAMEBUFFER, opts, width, height, 8, queue)?;
    Ok(queue)
}

/// Fills an application-held buffer with `value`
pub fn fill(pal: &mut Pal<SimulatedHost>, buffer: Cap, value: u8) -> PalResult<()> {
    pal.buffer_data_mut(buffer)?.fill(value);
    Ok(())
}
