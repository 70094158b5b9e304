//! # Event Records
//!
//! The canonical `{destination, kind, payload}` unit delivered through an
//! event queue, and its wire encoding.
//!
//! ## Wire Format
//!
//! All fields little-endian. An 8-byte header
//!
//! ```text
//! +0  u32  destination capability
//! +4  u16  total record size (header included)
//! +6  u16  event-kind tag
//! ```
//!
//! is followed immediately by the payload:
//!
//! | record | payload |
//! |--------|---------|
//! | System Quit | none |
//! | FrameBuffer Size | `u16 width, u16 height` |
//! | FrameBuffer Frame | `u32 dt_ms, u32 buffer` |
//! | FrameBuffer Sync | `u32 dt_ms` |
//! | FrameBuffer Dirty | none |
//! | Input key | `u16 keycode, u16 modifiers` |
//! | Input pointer/button | `u16 device, u16 buttons, i32 x, i32 y` |
//! | Input touch | `u16 device, u16 touch, i32 x, i32 y` |
//! | Audio Frame | `u32 dt_ms, u32 buffer` |
//!
//! Kind tags are only unique per destination class, so decoding needs the
//! class of the destination ([`EventClass`]).

use core_types::Cap;
use input_types::{
    ButtonState, InputEvent, InputEventKind, KeyCode, KeyEvent, KeyModifiers, PointerEvent,
    TouchEvent,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header size in bytes
pub const HEADER_SIZE: usize = 8;

/// Event kinds addressed to the system device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum SystemEventKind {
    Quit = 1,
}

/// Event kinds addressed to a framebuffer device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum FrameBufferEventKind {
    Size = 0,
    Frame = 1,
    Sync = 2,
    Dirty = 3,
}

/// Event kinds addressed to an audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum AudioEventKind {
    Frame = 0,
}

/// Which kind table a destination uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventClass {
    System,
    FrameBuffer,
    Audio,
    Input,
}

/// Decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Record truncated: {needed} bytes needed, {got} available")]
    Truncated { needed: usize, got: usize },

    #[error("Unknown {class:?} event kind {kind}")]
    UnknownKind { class: EventClass, kind: u16 },

    #[error("Record of kind {kind} has size {size}, expected {expected}")]
    SizeMismatch { kind: u16, size: usize, expected: usize },

    #[error("No event class for destination {0}")]
    UnknownDestination(Cap),
}

/// Parsed record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub cap: Cap,
    pub size: u16,
    pub kind: u16,
}

impl RecordHeader {
    /// Parses the first [`HEADER_SIZE`] bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }
        Ok(Self {
            cap: Cap::new(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            size: u16::from_le_bytes([bytes[4], bytes[5]]),
            kind: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }
}

/// Kind-specific payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    Quit,
    Size { width: u16, height: u16 },
    Frame { dt_ms: u32, buffer: Cap },
    Sync { dt_ms: u32 },
    Dirty,
    Input(InputEvent),
    AudioFrame { dt_ms: u32, buffer: Cap },
}

/// A canonical event record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Destination capability
    pub cap: Cap,
    pub payload: EventPayload,
}

impl EventRecord {
    pub fn new(cap: Cap, payload: EventPayload) -> Self {
        Self { cap, payload }
    }

    /// Returns the wire kind tag
    pub fn kind(&self) -> u16 {
        match &self.payload {
            EventPayload::Quit => SystemEventKind::Quit as u16,
            EventPayload::Size { .. } => FrameBufferEventKind::Size as u16,
            EventPayload::Frame { .. } => FrameBufferEventKind::Frame as u16,
            EventPayload::Sync { .. } => FrameBufferEventKind::Sync as u16,
            EventPayload::Dirty => FrameBufferEventKind::Dirty as u16,
            EventPayload::Input(event) => event.kind().tag(),
            EventPayload::AudioFrame { .. } => AudioEventKind::Frame as u16,
        }
    }

    /// Returns the class whose kind table this record uses
    pub fn class(&self) -> EventClass {
        match &self.payload {
            EventPayload::Quit => EventClass::System,
            EventPayload::Size { .. }
            | EventPayload::Frame { .. }
            | EventPayload::Sync { .. }
            | EventPayload::Dirty => EventClass::FrameBuffer,
            EventPayload::Input(_) => EventClass::Input,
            EventPayload::AudioFrame { .. } => EventClass::Audio,
        }
    }

    /// Total encoded size, header included
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE
            + match &self.payload {
                EventPayload::Quit | EventPayload::Dirty => 0,
                EventPayload::Size { .. } | EventPayload::Sync { .. } => 4,
                EventPayload::Frame { .. } | EventPayload::AudioFrame { .. } => 8,
                EventPayload::Input(event) => input_payload_len(event.kind()),
            }
    }

    /// Returns the buffer this record hands to the application, if any
    pub fn buffer(&self) -> Option<Cap> {
        match self.payload {
            EventPayload::Frame { buffer, .. } | EventPayload::AudioFrame { buffer, .. } => {
                Some(buffer)
            }
            _ => None,
        }
    }

    /// Appends the wire encoding to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.cap.raw().to_le_bytes());
        out.extend_from_slice(&(self.encoded_len() as u16).to_le_bytes());
        out.extend_from_slice(&self.kind().to_le_bytes());
        match &self.payload {
            EventPayload::Quit | EventPayload::Dirty => {}
            EventPayload::Size { width, height } => {
                out.extend_from_slice(&width.to_le_bytes());
                out.extend_from_slice(&height.to_le_bytes());
            }
            EventPayload::Frame { dt_ms, buffer } | EventPayload::AudioFrame { dt_ms, buffer } => {
                out.extend_from_slice(&dt_ms.to_le_bytes());
                out.extend_from_slice(&buffer.raw().to_le_bytes());
            }
            EventPayload::Sync { dt_ms } => out.extend_from_slice(&dt_ms.to_le_bytes()),
            EventPayload::Input(event) => encode_input(event, out),
        }
    }

    /// Returns the wire encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out
    }

    /// Decodes one record addressed to a destination of class `class`
    pub fn decode(bytes: &[u8], class: EventClass) -> Result<Self, DecodeError> {
        let header = RecordHeader::parse(bytes)?;
        let size = header.size as usize;
        if bytes.len() < size {
            return Err(DecodeError::Truncated {
                needed: size,
                got: bytes.len(),
            });
        }
        let body = &bytes[HEADER_SIZE.min(size)..size];
        let expect = |expected: usize| {
            if size == expected {
                Ok(())
            } else {
                Err(DecodeError::SizeMismatch {
                    kind: header.kind,
                    size,
                    expected,
                })
            }
        };
        let unknown = DecodeError::UnknownKind {
            class,
            kind: header.kind,
        };

        let payload = match class {
            EventClass::System => match header.kind {
                1 => {
                    expect(HEADER_SIZE)?;
                    EventPayload::Quit
                }
                _ => return Err(unknown),
            },
            EventClass::FrameBuffer => match header.kind {
                0 => {
                    expect(HEADER_SIZE + 4)?;
                    EventPayload::Size {
                        width: u16_at(body, 0),
                        height: u16_at(body, 2),
                    }
                }
                1 => {
                    expect(HEADER_SIZE + 8)?;
                    EventPayload::Frame {
                        dt_ms: u32_at(body, 0),
                        buffer: Cap::new(u32_at(body, 4)),
                    }
                }
                2 => {
                    expect(HEADER_SIZE + 4)?;
                    EventPayload::Sync {
                        dt_ms: u32_at(body, 0),
                    }
                }
                3 => {
                    expect(HEADER_SIZE)?;
                    EventPayload::Dirty
                }
                _ => return Err(unknown),
            },
            EventClass::Audio => match header.kind {
                0 => {
                    expect(HEADER_SIZE + 8)?;
                    EventPayload::AudioFrame {
                        dt_ms: u32_at(body, 0),
                        buffer: Cap::new(u32_at(body, 4)),
                    }
                }
                _ => return Err(unknown),
            },
            EventClass::Input => {
                let kind = InputEventKind::from_tag(header.kind).ok_or(unknown.clone())?;
                let expected = HEADER_SIZE + input_payload_len(kind);
                expect(expected)?;
                EventPayload::Input(decode_input(kind, body).ok_or(unknown)?)
            }
        };

        Ok(Self {
            cap: header.cap,
            payload,
        })
    }
}

fn input_payload_len(kind: InputEventKind) -> usize {
    match kind {
        InputEventKind::KeyDown | InputEventKind::KeyUp => 4,
        InputEventKind::None => 0,
        _ => 12,
    }
}

fn encode_input(event: &InputEvent, out: &mut Vec<u8>) {
    match event {
        InputEvent::KeyDown(key) | InputEvent::KeyUp(key) => {
            out.extend_from_slice(&key.keycode.usage().to_le_bytes());
            out.extend_from_slice(&key.modifiers.bits().to_le_bytes());
        }
        InputEvent::ButtonDown(ptr) | InputEvent::ButtonUp(ptr) | InputEvent::PointerMove(ptr) => {
            out.extend_from_slice(&ptr.device.to_le_bytes());
            out.extend_from_slice(&ptr.buttons.bits().to_le_bytes());
            out.extend_from_slice(&ptr.x.to_le_bytes());
            out.extend_from_slice(&ptr.y.to_le_bytes());
        }
        InputEvent::TouchBegin(touch) | InputEvent::TouchMove(touch) | InputEvent::TouchEnd(touch) => {
            out.extend_from_slice(&touch.device.to_le_bytes());
            out.extend_from_slice(&touch.touch.to_le_bytes());
            out.extend_from_slice(&touch.x.to_le_bytes());
            out.extend_from_slice(&touch.y.to_le_bytes());
        }
    }
}

fn decode_input(kind: InputEventKind, body: &[u8]) -> Option<InputEvent> {
    let key = || {
        KeyEvent::new(
            KeyCode(u16_at(body, 0)),
            KeyModifiers::from_bits_retain(u16_at(body, 2)),
        )
    };
    let pointer = || PointerEvent {
        device: u16_at(body, 0),
        buttons: ButtonState::from_bits_retain(u16_at(body, 2)),
        x: i32_at(body, 4),
        y: i32_at(body, 8),
    };
    let touch = || TouchEvent {
        device: u16_at(body, 0),
        touch: u16_at(body, 2),
        x: i32_at(body, 4),
        y: i32_at(body, 8),
    };
    Some(match kind {
        InputEventKind::KeyDown => InputEvent::KeyDown(key()),
        InputEventKind::KeyUp => InputEvent::KeyUp(key()),
        InputEventKind::ButtonDown => InputEvent::ButtonDown(pointer()),
        InputEventKind::ButtonUp => InputEvent::ButtonUp(pointer()),
        InputEventKind::PointerMove => InputEvent::PointerMove(pointer()),
        InputEventKind::TouchBegin => InputEvent::TouchBegin(touch()),
        InputEventKind::TouchMove => InputEvent::TouchMove(touch()),
        InputEventKind::TouchEnd => InputEvent::TouchEnd(touch()),
        _ => return None,
    })
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn i32_at(bytes: &[u8], at: usize) -> i32 {
    u32_at(bytes, at) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let record = EventRecord::new(
            Cap::FRAMEBUFFER,
            EventPayload::Frame {
                dt_ms: 1,
                buffer: Cap::new(0x0102_0304),
            },
        );
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &[2, 0, 0, 0]);
        assert_eq!(&bytes[4..6], &[16, 0]);
        assert_eq!(&bytes[6..8], &[1, 0]);
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[4, 3, 2, 1]);
    }

    #[test]
    fn test_quit_is_header_only() {
        let bytes = EventRecord::new(Cap::SYSTEM, EventPayload::Quit).to_bytes();
        assert_eq!(bytes, vec![0, 0, 0, 0, 8, 0, 1, 0]);
        let decoded = EventRecord::decode(&bytes, EventClass::System).unwrap();
        assert_eq!(decoded.payload, EventPayload::Quit);
    }

    #[test]
    fn test_key_record_decodes() {
        let key = KeyEvent::new(KeyCode::A, KeyModifiers::LSHIFT | KeyModifiers::RCTRL);
        let record = EventRecord::new(Cap::INPUT, EventPayload::Input(InputEvent::KeyDown(key)));
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[8..12], &[4, 0, 18, 0]);
        assert_eq!(EventRecord::decode(&bytes, EventClass::Input).unwrap(), record);
    }

    #[test]
    fn test_negative_pointer_displacement() {
        let record = EventRecord::new(
            Cap::INPUT,
            EventPayload::Input(InputEvent::PointerMove(PointerEvent {
                device: 0,
                buttons: ButtonState::RIGHT,
                x: -5,
                y: 7,
            })),
        );
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), 20);
        assert_eq!(EventRecord::decode(&bytes, EventClass::Input).unwrap(), record);
    }

    #[test]
    fn test_kind_tags_overlap_across_classes() {
        let quit = EventRecord::new(Cap::SYSTEM, EventPayload::Quit);
        let frame = EventRecord::new(
            Cap::FRAMEBUFFER,
            EventPayload::Frame {
                dt_ms: 1,
                buffer: Cap::new(100),
            },
        );
        assert_eq!(quit.kind(), frame.kind());
        assert_ne!(quit.class(), frame.class());
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            EventRecord::decode(&[0, 0, 0], EventClass::System),
            Err(DecodeError::Truncated { needed: 8, got: 3 })
        );

        let bytes = EventRecord::new(Cap::SYSTEM, EventPayload::Quit).to_bytes();
        assert!(matches!(
            EventRecord::decode(&bytes, EventClass::Audio),
            Err(DecodeError::UnknownKind { .. })
        ));

        let mut wrong_size = EventRecord::new(Cap::FRAMEBUFFER, EventPayload::Sync { dt_ms: 3 })
            .to_bytes();
        wrong_size[4] = 8;
        assert!(matches!(
            EventRecord::decode(&wrong_size, EventClass::FrameBuffer),
            Err(DecodeError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_buffer_accessor() {
        let audio = EventRecord::new(
            Cap::AUDIO,
            EventPayload::AudioFrame {
                dt_ms: 21,
                buffer: Cap::new(105),
            },
        );
        assert_eq!(audio.buffer(), Some(Cap::new(105)));
        assert_eq!(EventRecord::new(Cap::FRAMEBUFFER, EventPayload::Dirty).buffer(), None);
    }
}
