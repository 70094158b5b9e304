//! # Host Abstraction Layer (HAL)
//!
//! This crate defines the interface to the host's display, audio and input
//! subsystems, the collaborator the platform abstraction layer sits on.
//!
//! ## Philosophy
//!
//! **The host is just a source and a sink.**
//!
//! Host backends deliver raw notifications in their own bit layouts and accept
//! pixels and PCM. Everything capability-shaped (handles, ownership, queues)
//! lives above this layer in `pal`.
//!
//! ## Design Principles
//!
//! 1. **Trait-based**: Display, audio and the event stream are separate traits
//! 2. **One serialized stream**: Quit, key, pointer, window and user
//!    notifications arrive through a single [`EventSource`]
//! 3. **Explicit failure**: Every host operation that can fail returns
//!    [`HostError`]
//! 4. **Testable**: `sim_host` implements every trait in-process

pub mod audio;
pub mod error;
pub mod framebuffer;
pub mod host_event;
pub mod translation;

pub use audio::{AudioBackend, AudioSpec, SampleFormat, SinkId};
pub use error::HostError;
pub use framebuffer::{DisplayBackend, PixelFormat, SurfaceInfo, SurfaceLock, SurfaceRequest};
pub use host_event::{
    EventSource, HostButtonMask, HostEvent, HostKeyMod, TouchPhase, UserEvent, WindowEvent,
};
pub use translation::{button_bit, hid_buttons, hid_modifiers, PointerTranslator, BUTTON_MAP};

/// A complete host backend: one event stream, one display, one audio system
pub trait HostBackend: EventSource + DisplayBackend + AudioBackend {}

impl<T: EventSource + DisplayBackend + AudioBackend> HostBackend for T {}
