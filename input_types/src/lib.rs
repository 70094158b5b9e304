#![cfg_attr(not(test), no_std)]

//! # Input Types
//!
//! This crate defines the canonical input records delivered through an event
//! queue, independent of any host backend.
//!
//! ## Philosophy
//!
//! - **Events, not bytes**: Input is structured records, not raw host events
//! - **USB HID layout**: Key codes are HID usage page 7 values and modifier
//!   bits follow the HID report modifier byte
//! - **Explicit, not ambient**: Delivery requires a subscription on the input
//!   capability
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A keymap or text layout engine
//! - The full HID usage table (only the handful of codes the runtime names)
//! - A host event translator (that lives in `hal`)

extern crate alloc;

use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Modifier bits as per the USB HID report modifier byte, plus the
    /// extended lock bits above it
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KeyModifiers: u16 {
        const LCTRL = 1;
        const LSHIFT = 2;
        const LALT = 4;
        const LMETA = 8;
        const RCTRL = 16;
        const RSHIFT = 32;
        const RALT = 64;
        const RMETA = 128;
        const NUM_LOCK = 256;
        const CAPS_LOCK = 512;
        const SCROLL_LOCK = 1024;
        const COMPOSE = 2048;
        const KANA = 4096;
    }
}

impl KeyModifiers {
    /// Checks if either Ctrl is held
    pub fn is_ctrl(&self) -> bool {
        self.intersects(Self::LCTRL | Self::RCTRL)
    }

    /// Checks if either Shift is held
    pub fn is_shift(&self) -> bool {
        self.intersects(Self::LSHIFT | Self::RSHIFT)
    }

    /// Checks if either Alt is held
    pub fn is_alt(&self) -> bool {
        self.intersects(Self::LALT | Self::RALT)
    }

    /// Checks if either Meta is held
    pub fn is_meta(&self) -> bool {
        self.intersects(Self::LMETA | Self::RMETA)
    }
}

impl fmt::Display for KeyModifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let parts: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", parts.join("+"))
    }
}

bitflags! {
    /// Pointer button state: left, right, middle, then buttons 4-8
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ButtonState: u16 {
        const LEFT = 1;
        const RIGHT = 2;
        const MIDDLE = 4;
        const BUTTON4 = 8;
        const BUTTON5 = 16;
        const BUTTON6 = 32;
        const BUTTON7 = 64;
        const BUTTON8 = 128;
    }
}

bitflags! {
    /// Input classes an application can subscribe to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct InputOpts: u32 {
        const KEY = 1;
        const BUTTON = 2;
        const POINTER = 4;
        const WHEEL = 8;
        const TOUCH = 16;
        const TOUCH_POINTS = 32;
        const JOYSTICK = 64;
    }
}

/// Key code: a USB HID usage (page 7) value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const NONE: KeyCode = KeyCode(0);
    pub const A: KeyCode = KeyCode(4);
    pub const Q: KeyCode = KeyCode(20);
    pub const Z: KeyCode = KeyCode(29);
    pub const NUM1: KeyCode = KeyCode(30);
    pub const NUM0: KeyCode = KeyCode(39);
    pub const RETURN: KeyCode = KeyCode(40);
    pub const ESCAPE: KeyCode = KeyCode(41);
    pub const BACKSPACE: KeyCode = KeyCode(42);
    pub const TAB: KeyCode = KeyCode(43);
    pub const SPACE: KeyCode = KeyCode(44);
    pub const CAPS_LOCK: KeyCode = KeyCode(57);
    pub const F1: KeyCode = KeyCode(58);
    pub const RIGHT_ARROW: KeyCode = KeyCode(79);
    pub const LEFT_ARROW: KeyCode = KeyCode(80);
    pub const DOWN_ARROW: KeyCode = KeyCode(81);
    pub const UP_ARROW: KeyCode = KeyCode(82);
    pub const LEFT_CTRL: KeyCode = KeyCode(224);
    pub const LEFT_SHIFT: KeyCode = KeyCode(225);
    pub const LEFT_ALT: KeyCode = KeyCode(226);
    pub const LEFT_META: KeyCode = KeyCode(227);
    pub const RIGHT_CTRL: KeyCode = KeyCode(228);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(229);
    pub const RIGHT_ALT: KeyCode = KeyCode(230);
    pub const RIGHT_META: KeyCode = KeyCode(231);

    /// Returns the raw usage value
    pub const fn usage(&self) -> u16 {
        self.0
    }

    /// Returns the HID usage for an ASCII letter, digit or whitespace key
    pub fn from_ascii(c: char) -> Option<KeyCode> {
        match c {
            'a'..='z' => Some(KeyCode(4 + (c as u16 - 'a' as u16))),
            'A'..='Z' => Some(KeyCode(4 + (c as u16 - 'A' as u16))),
            '1'..='9' => Some(KeyCode(30 + (c as u16 - '1' as u16))),
            '0' => Some(Self::NUM0),
            ' ' => Some(Self::SPACE),
            '\n' => Some(Self::RETURN),
            '\t' => Some(Self::TAB),
            _ => None,
        }
    }

    /// Returns true for the eight modifier keys (usages 224-231)
    pub fn is_modifier(&self) -> bool {
        (224..=231).contains(&self.0)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

/// Event-kind tags carried in the record header for input destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum InputEventKind {
    None = 0,
    KeyDown = 1,
    KeyUp = 2,
    ButtonDown = 3,
    ButtonUp = 4,
    PointerMove = 5,
    Wheel = 6,
    TouchPan = 7,
    TouchZoom = 8,
    TouchRotate = 9,
    TouchBegin = 10,
    TouchMove = 11,
    TouchEnd = 12,
}

impl InputEventKind {
    /// Returns the wire tag
    pub const fn tag(self) -> u16 {
        self as u16
    }

    /// Parses a wire tag
    pub fn from_tag(tag: u16) -> Option<Self> {
        Some(match tag {
            0 => Self::None,
            1 => Self::KeyDown,
            2 => Self::KeyUp,
            3 => Self::ButtonDown,
            4 => Self::ButtonUp,
            5 => Self::PointerMove,
            6 => Self::Wheel,
            7 => Self::TouchPan,
            8 => Self::TouchZoom,
            9 => Self::TouchRotate,
            10 => Self::TouchBegin,
            11 => Self::TouchMove,
            12 => Self::TouchEnd,
            _ => return None,
        })
    }

    /// Returns the subscription option that admits this kind
    pub fn required_opt(self) -> InputOpts {
        match self {
            Self::None => InputOpts::empty(),
            Self::KeyDown | Self::KeyUp => InputOpts::KEY,
            Self::ButtonDown | Self::ButtonUp => InputOpts::BUTTON,
            Self::PointerMove => InputOpts::POINTER,
            Self::Wheel => InputOpts::WHEEL,
            Self::TouchPan | Self::TouchZoom | Self::TouchRotate => InputOpts::TOUCH,
            Self::TouchBegin | Self::TouchMove | Self::TouchEnd => {
                InputOpts::TOUCH_POINTS | InputOpts::TOUCH
            }
        }
    }
}

/// Keyboard record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// HID usage of the key
    pub keycode: KeyCode,
    /// Modifiers held when the event was produced
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    /// Creates a key record
    pub fn new(keycode: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { keycode, modifiers }
    }
}

/// Pointer record
///
/// For `PointerMove` the coordinates are a relative displacement; for
/// `ButtonDown`/`ButtonUp` they are absolute window-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub device: u16,
    pub buttons: ButtonState,
    pub x: i32,
    pub y: i32,
}

/// Touch point record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub device: u16,
    pub touch: u16,
    pub x: i32,
    pub y: i32,
}

/// Canonical input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    ButtonDown(PointerEvent),
    ButtonUp(PointerEvent),
    PointerMove(PointerEvent),
    TouchBegin(TouchEvent),
    TouchMove(TouchEvent),
    TouchEnd(TouchEvent),
}

impl InputEvent {
    /// Returns the header tag for this event
    pub fn kind(&self) -> InputEventKind {
        match self {
            Self::KeyDown(_) => InputEventKind::KeyDown,
            Self::KeyUp(_) => InputEventKind::KeyUp,
            Self::ButtonDown(_) => InputEventKind::ButtonDown,
            Self::ButtonUp(_) => InputEventKind::ButtonUp,
            Self::PointerMove(_) => InputEventKind::PointerMove,
            Self::TouchBegin(_) => InputEventKind::TouchBegin,
            Self::TouchMove(_) => InputEventKind::TouchMove,
            Self::TouchEnd(_) => InputEventKind::TouchEnd,
        }
    }

    /// Returns the key record if this is a key event
    pub fn as_key(&self) -> Option<&KeyEvent> {
        match self {
            Self::KeyDown(event) | Self::KeyUp(event) => Some(event),
            _ => None,
        }
    }

    /// Returns the pointer record if this is a pointer or button event
    pub fn as_pointer(&self) -> Option<&PointerEvent> {
        match self {
            Self::ButtonDown(event) | Self::ButtonUp(event) | Self::PointerMove(event) => {
                Some(event)
            }
            _ => None,
        }
    }

    /// Returns true if a subscription with `opts` admits this event
    pub fn admitted_by(&self, opts: InputOpts) -> bool {
        opts.intersects(self.kind().required_opt())
    }
}
