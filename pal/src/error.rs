//! Platform layer error types

use core_types::{Cap, CapabilityError};
use hal::HostError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::event::DecodeError;
use crate::resource::ResourceKind;
use crate::storage::StorageError;

/// Errors returned by every boundary call on [`crate::Pal`]
#[derive(Debug, Error)]
pub enum PalError {
    /// The handle does not name a live resource
    #[error("Invalid capability: {0}")]
    InvalidCapability(Cap),

    /// The handle names a resource of another kind
    #[error("{cap} is not a {expected}")]
    WrongResource { cap: Cap, expected: ResourceKind },

    /// Capability table failure
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// The buffer is held by the device; the application must wait for it
    /// to come back through an event
    #[error("Buffer {0} is owned by the device")]
    NotOwner(Cap),

    /// The buffer is not part of this device's pool
    #[error("Buffer {buffer} does not belong to device {device}")]
    NotDeviceBuffer { device: Cap, buffer: Cap },

    /// The buffer belongs to a device pool and lives as long as the device
    #[error("Buffer {buffer} is bound to device {device}")]
    BufferInUse { buffer: Cap, device: Cap },

    /// The buffer is smaller than the operation requires
    #[error("Buffer {cap} holds {size} bytes, {needed} needed")]
    BufferTooSmall { cap: Cap, needed: usize, size: usize },

    /// Palette uploads must be exactly 256 four-byte entries
    #[error("Palette buffer must be 1024 bytes, got {size}")]
    InvalidPalette { size: usize },

    /// Unsupported framebuffer bit depth
    #[error("Unsupported pixel depth: {bpp} bpp")]
    UnsupportedFormat { bpp: u32 },

    /// Content dimensions must fit the 16-bit fields of a Size event
    #[error("Surface content {width}x{height} exceeds 65535 pixels per side")]
    SurfaceTooLarge { width: u32, height: u32 },

    /// The device has not been created yet
    #[error("Device {0} is not configured")]
    NotConfigured(Cap),

    /// The audio device already has a sink or stream attached
    #[error("Audio device {0} already has a stream attached")]
    StreamAlreadyAttached(Cap),

    /// A push-mode call on a pull-mode device, or the reverse
    #[error("Operation does not match the audio mode of {0}")]
    ModeMismatch(Cap),

    /// Push-mode submission would exceed the configured high-water mark
    #[error("Audio backlog {queued} bytes would exceed limit {limit}")]
    AudioBacklog { queued: usize, limit: usize },

    /// The event ring cannot hold the record
    #[error("Queue {queue} full: {needed} bytes needed, {free} free")]
    QueueFull { queue: Cap, needed: usize, free: usize },

    /// Requested ring size is above the supported maximum
    #[error("Queue size 2^{pow2} exceeds 2^{max}")]
    QueueTooLarge { pow2: u32, max: u32 },

    /// A record in the ring could not be decoded
    #[error("Event decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Host backend failure
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// Storage collaborator failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration failure
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
