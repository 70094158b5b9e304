//! # Host Event Translation
//!
//! Turns one raw [`HostEvent`] into at most one canonical [`EventRecord`]
//! and routes it to a queue.
//!
//! ## Rules
//!
//! - Quit becomes a System Quit record
//! - Keys keep their scancode (already a HID usage); modifiers are remapped
//! - Motion reports the relative displacement and resynchronizes the button
//!   accumulator; button press/release reports absolute coordinates
//! - Wheel and resize notifications produce nothing yet
//! - Focus and pointer enter/leave only toggle capture
//! - Exposed becomes a FrameBuffer Dirty record
//! - FrameReady, FrameSync and AudioPull become Frame, Sync and Audio Frame
//!   records; Frame and Audio Frame hand their buffer to the application
//!
//! ## Routing
//!
//! A record goes to the queue its destination device is bound to. Records
//! for unbound destinations, or destinations whose queue was destroyed, go to
//! the queue that pumped the host event. Subscribed input of a kind outside
//! the subscription is dropped.
//!
//! A Frame or Audio Frame that does not fit its queue is not dropped: the
//! host notification is posted again and retried on a later pump, so the
//! buffer still reaches the application once the ring drains.

use core_types::Cap;
use hal::{hid_modifiers, HostBackend, HostEvent, TouchPhase, UserEvent, WindowEvent};
use input_types::{InputEvent, KeyCode, KeyEvent, PointerEvent, TouchEvent};

use crate::audio::StreamPull;
use crate::event::{EventPayload, EventRecord};
use crate::input::InputRoute;
use crate::{Pal, PalResult};

impl<H: HostBackend> Pal<H> {
    /// Translates and routes one host event pumped by `pumping`
    pub(crate) fn dispatch(&mut self, event: HostEvent, pumping: Cap) -> PalResult<()> {
        let Some(record) = self.translate(event)? else {
            return Ok(());
        };
        let Some(queue) = self.route(&record, pumping) else {
            log::trace!("dropped {:?} for {}: not subscribed", record.payload, record.cap);
            return Ok(());
        };
        if let Err(err) = self.enqueue(queue, &record) {
            // a buffer handover must not be lost: retry once the ring drains
            let HostEvent::User(user @ (UserEvent::FrameReady { .. } | UserEvent::AudioPull { .. })) =
                event
            else {
                return Err(err);
            };
            log::warn!("{}, re-posting {:?}", err, user);
            self.host.push_user_event(user)?;
            return Ok(());
        }

        match record.payload {
            EventPayload::Frame { buffer, .. } => self.frame_delivered(record.cap, buffer),
            EventPayload::AudioFrame { buffer, .. } => self.stream_delivered(buffer),
            _ => Ok(()),
        }
    }

    fn translate(&mut self, event: HostEvent) -> PalResult<Option<EventRecord>> {
        let dt_ms = self.config.frame_dt_ms;
        let record = match event {
            HostEvent::Quit => EventRecord::new(Cap::SYSTEM, EventPayload::Quit),

            HostEvent::Key {
                pressed,
                scancode,
                modifiers,
            } => {
                let key = KeyEvent::new(KeyCode(scancode), hid_modifiers(modifiers));
                input(if pressed {
                    InputEvent::KeyDown(key)
                } else {
                    InputEvent::KeyUp(key)
                })
            }

            HostEvent::PointerMotion {
                xrel, yrel, state, ..
            } => input(InputEvent::PointerMove(PointerEvent {
                device: 0,
                buttons: self.pointer.sync(state),
                x: xrel,
                y: yrel,
            })),

            HostEvent::PointerButton {
                pressed,
                button,
                x,
                y,
            } => {
                let buttons = if pressed {
                    self.pointer.press(button)
                } else {
                    self.pointer.release(button)
                };
                let pointer = PointerEvent {
                    device: 0,
                    buttons,
                    x,
                    y,
                };
                input(if pressed {
                    InputEvent::ButtonDown(pointer)
                } else {
                    InputEvent::ButtonUp(pointer)
                })
            }

            HostEvent::Touch {
                phase,
                device,
                finger,
                x,
                y,
            } => {
                let touch = TouchEvent {
                    device,
                    touch: finger,
                    x,
                    y,
                };
                input(match phase {
                    TouchPhase::Down => InputEvent::TouchBegin(touch),
                    TouchPhase::Motion => InputEvent::TouchMove(touch),
                    TouchPhase::Up => InputEvent::TouchEnd(touch),
                })
            }

            HostEvent::Wheel { .. } => return Ok(None),

            HostEvent::Window(window) => match window {
                WindowEvent::FocusGained | WindowEvent::PointerEnter => {
                    self.set_capture(true)?;
                    return Ok(None);
                }
                WindowEvent::FocusLost | WindowEvent::PointerLeave => {
                    self.set_capture(false)?;
                    return Ok(None);
                }
                WindowEvent::Exposed => EventRecord::new(Cap::FRAMEBUFFER, EventPayload::Dirty),
                WindowEvent::Resized { width, height } => {
                    log::debug!("window resized to {}x{}", width, height);
                    return Ok(None);
                }
            },

            HostEvent::User(UserEvent::FrameReady { device, buffer }) => {
                if !self.frame_ready_is_current(device, buffer) {
                    log::debug!("dropped stale frame {} for {}", buffer, device);
                    return Ok(None);
                }
                EventRecord::new(device, EventPayload::Frame { dt_ms, buffer })
            }

            HostEvent::User(UserEvent::FrameSync { device }) => {
                EventRecord::new(device, EventPayload::Sync { dt_ms })
            }

            HostEvent::User(UserEvent::AudioPull { sink }) => match self.stream_for_sink(sink) {
                StreamPull::Ready {
                    device,
                    buffer,
                    period_ms,
                } => EventRecord::new(
                    device,
                    EventPayload::AudioFrame {
                        dt_ms: period_ms,
                        buffer,
                    },
                ),
                StreamPull::Held { device, buffer } => {
                    log::debug!("dropped pull for {}: {} still held by the application", device, buffer);
                    return Ok(None);
                }
                StreamPull::Closed => {
                    log::debug!("dropped pull for closed sink {}", sink.0);
                    return Ok(None);
                }
            },
        };
        Ok(Some(record))
    }

    /// Picks the queue for `record`, or `None` to drop it
    fn route(&self, record: &EventRecord, pumping: Cap) -> Option<Cap> {
        let bound = match &record.payload {
            EventPayload::Input(event) => match self.input_route(record.cap, event) {
                InputRoute::Unbound => None,
                InputRoute::Queue(queue) => Some(queue),
                InputRoute::Filtered => return None,
            },
            EventPayload::Quit => None,
            EventPayload::AudioFrame { .. } => self.audio_queue(record.cap),
            _ => self.framebuffer_queue(record.cap),
        };

        match bound {
            Some(queue) if self.queue_ref(queue).is_ok() => Some(queue),
            Some(queue) => {
                log::debug!("{} is gone, delivering {} events to {}", queue, record.cap, pumping);
                Some(pumping)
            }
            None => Some(pumping),
        }
    }
}

fn input(event: InputEvent) -> EventRecord {
    EventRecord::new(Cap::INPUT, EventPayload::Input(event))
}
