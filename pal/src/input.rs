//! Input protocol
//!
//! An input device has no state machine of its own: a subscription names the
//! event kinds the application wants and the queue they go to. Delivery is
//! driven by host event translation.

use core_types::Cap;
use hal::HostBackend;
use input_types::{InputEvent, InputOpts};

use crate::{Pal, PalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Subscription {
    opts: InputOpts,
    queue: Cap,
}

/// Input device state
#[derive(Debug, Default)]
pub struct InputDevice {
    subscription: Option<Subscription>,
}

impl InputDevice {
    /// Subscribed kinds, empty if unsubscribed
    pub fn opts(&self) -> InputOpts {
        self.subscription.map(|s| s.opts).unwrap_or_default()
    }

    /// Queue receiving this device's events
    pub fn queue(&self) -> Option<Cap> {
        self.subscription.map(|s| s.queue)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

/// Where a translated input record should go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputRoute {
    /// No subscription: the queue that pumped the event
    Unbound,
    Queue(Cap),
    /// Subscribed, but not to this kind
    Filtered,
}

impl<H: HostBackend> Pal<H> {
    /// Subscribes `queue` to the input kinds in `opts`
    ///
    /// Replaces any earlier subscription.
    pub fn input_subscribe(&mut self, input: Cap, opts: InputOpts, queue: Cap) -> PalResult<()> {
        self.queue_ref(queue)?;
        self.input_mut(input)?.subscription = Some(Subscription { opts, queue });
        log::debug!("{} subscribed {:?} into {}", input, opts, queue);
        Ok(())
    }

    /// Drops the subscription; input goes back to whichever queue pumps it
    pub fn input_unsubscribe(&mut self, input: Cap) -> PalResult<()> {
        self.input_mut(input)?.subscription = None;
        Ok(())
    }

    /// Returns the input device named by `input`
    pub fn input(&self, input: Cap) -> PalResult<&InputDevice> {
        self.input_ref(input)
    }

    pub(crate) fn input_route(&self, input: Cap, event: &InputEvent) -> InputRoute {
        match self.input_ref(input).ok().and_then(|device| device.subscription) {
            None => InputRoute::Unbound,
            Some(sub) if event.admitted_by(sub.opts) => InputRoute::Queue(sub.queue),
            Some(_) => InputRoute::Filtered,
        }
    }

    /// Engages or releases relative pointer capture
    ///
    /// Idempotent: the host is only told about actual changes.
    pub(crate) fn set_capture(&mut self, engaged: bool) -> PalResult<()> {
        if self.captured == engaged {
            return Ok(());
        }
        self.host.set_relative_pointer(engaged)?;
        self.captured = engaged;
        if !engaged {
            self.pointer.reset();
        }
        log::debug!(
            "pointer capture {}",
            if engaged { "engaged" } else { "released" }
        );
        Ok(())
    }
}
