//! Host event stream
//!
//! This module defines the raw notifications a host backend delivers and the
//! [`EventSource`] trait through which they are pumped.
//!
//! ## Philosophy
//!
//! - **Host layout, not canonical layout**: Modifier and button bits arrive in
//!   the backend's own layout; translation happens in [`crate::translation`]
//! - **One stream**: Input, window and user notifications are serialized into
//!   a single stream observed by one dispatch call per iteration
//! - **Poll-based**: `poll_event` never blocks; only `wait_event` does
//!
//! **NOTE**: These types should not leak past the platform layer. Applications
//! only ever see canonical records.

use bitflags::bitflags;
use core_types::Cap;

use crate::audio::SinkId;
use crate::error::HostError;

bitflags! {
    /// Keyboard modifier bits in backend layout
    ///
    /// The backend interleaves left/right per modifier: shift, ctrl, alt, meta.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HostKeyMod: u16 {
        const LSHIFT = 0x0001;
        const RSHIFT = 0x0002;
        const LCTRL = 0x0040;
        const RCTRL = 0x0080;
        const LALT = 0x0100;
        const RALT = 0x0200;
        const LGUI = 0x0400;
        const RGUI = 0x0800;
        const NUM = 0x1000;
        const CAPS = 0x2000;
        const MODE = 0x4000;
    }
}

bitflags! {
    /// Pointer button mask in backend layout: left, middle, right, then 4-8
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HostButtonMask: u32 {
        const LEFT = 0x01;
        const MIDDLE = 0x02;
        const RIGHT = 0x04;
        const X1 = 0x08;
        const X2 = 0x10;
        const X3 = 0x20;
        const X4 = 0x40;
        const X5 = 0x80;
    }
}

/// Window-level notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    FocusGained,
    FocusLost,
    PointerEnter,
    PointerLeave,
    /// The presented contents were damaged and need redrawing
    Exposed,
    Resized { width: u32, height: u32 },
}

/// Touch contact phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Motion,
    Up,
}

/// Notifications the platform layer posts to itself through the host stream
///
/// Posting through the host keeps them serialized with input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    /// A framebuffer buffer is ready to be handed to the application
    FrameReady { device: Cap, buffer: Cap },
    /// The display finished presenting a frame
    FrameSync { device: Cap },
    /// A started pull stream needs more PCM
    AudioPull { sink: SinkId },
}

/// Raw host notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The user asked the application to close
    Quit,
    /// Key press or release; `scancode` is already a USB HID usage
    Key {
        pressed: bool,
        scancode: u16,
        modifiers: HostKeyMod,
    },
    /// Pointer motion with absolute position, relative displacement and the
    /// current button mask
    PointerMotion {
        x: i32,
        y: i32,
        xrel: i32,
        yrel: i32,
        state: HostButtonMask,
    },
    /// Pointer button press or release; `button` is 1-based
    PointerButton {
        pressed: bool,
        button: u8,
        x: i32,
        y: i32,
    },
    /// Wheel motion
    Wheel { dx: i32, dy: i32 },
    /// Touch contact
    Touch {
        phase: TouchPhase,
        device: u16,
        finger: u16,
        x: i32,
        y: i32,
    },
    Window(WindowEvent),
    User(UserEvent),
}

impl HostEvent {
    /// Creates a key press event
    pub fn key_down(scancode: u16, modifiers: HostKeyMod) -> Self {
        Self::Key {
            pressed: true,
            scancode,
            modifiers,
        }
    }

    /// Creates a key release event
    pub fn key_up(scancode: u16, modifiers: HostKeyMod) -> Self {
        Self::Key {
            pressed: false,
            scancode,
            modifiers,
        }
    }

    /// Creates a relative motion event
    pub fn motion(xrel: i32, yrel: i32, state: HostButtonMask) -> Self {
        Self::PointerMotion {
            x: 0,
            y: 0,
            xrel,
            yrel,
            state,
        }
    }

    /// Creates a button press event
    pub fn button_down(button: u8, x: i32, y: i32) -> Self {
        Self::PointerButton {
            pressed: true,
            button,
            x,
            y,
        }
    }

    /// Creates a button release event
    pub fn button_up(button: u8, x: i32, y: i32) -> Self {
        Self::PointerButton {
            pressed: false,
            button,
            x,
            y,
        }
    }
}

/// Host event stream
///
/// ## Implementation Notes
///
/// - `poll_event`, `has_pending` and `wait_event` are only called from the
///   display thread
/// - `push_user_event` may be called from any thread the backend allows
/// - `wait_event` blocks until at least one notification is pending anywhere
///   in the process; it is not queue-specific
pub trait EventSource {
    /// Removes and returns the next pending notification, if any
    fn poll_event(&mut self) -> Option<HostEvent>;

    /// Returns true if a notification is pending, without consuming it
    fn has_pending(&self) -> bool;

    /// Blocks until a notification is pending
    fn wait_event(&mut self) -> Result<(), HostError>;

    /// Appends a user notification to the stream
    fn push_user_event(&mut self, event: UserEvent) -> Result<(), HostError>;

    /// Engages or releases relative pointer capture
    fn set_relative_pointer(&mut self, enabled: bool) -> Result<(), HostError>;
}
