//! # Platform Abstraction Layer
//!
//! This crate makes a host's display, audio, input and event subsystems look
//! like a small set of capability-addressed calls.
//!
//! ## Philosophy
//!
//! Applications never touch host handles. They hold opaque [`Cap`] values
//! naming buffers, queues and devices, and every buffer has exactly one
//! owner at a time:
//! - A `submit` call moves a buffer from the application to a device
//! - An event carrying a buffer moves it back
//! - Touching a buffer you do not own is rejected with [`PalError::NotOwner`]
//!
//! ## Design Goals
//!
//! 1. **One runtime context**: The capability table, palette, pointer
//!    accumulator and capture state all live in [`Pal`]; there are no statics
//! 2. **Explicit failure**: Host failures, malformed palettes and stale
//!    handles are typed errors, never log lines
//! 3. **Testable**: `Pal` is generic over [`HostBackend`]; `sim_host` runs
//!    the whole stack in-process
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A security boundary (the table is a trusted allocator, not an ACL)
//! - A shared-memory transport (`buffer_map_shared` is a placeholder)
//! - A thread or mutex wrapper
//!
//! ## Threading
//!
//! `Pal` is driven from the thread that owns the host event loop. Queue
//! reads, waits and framebuffer submits must all happen there.

pub mod audio;
pub mod audit;
pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod framebuffer;
pub mod input;
pub mod queue;
pub mod resource;
pub mod storage;
mod translate;

use std::path::PathBuf;

use core_types::{Cap, CapabilityError, CapabilityTable};
use hal::{HostBackend, PointerTranslator};

pub use audio::{AudioDevice, AudioMode, AudioOptions};
pub use audit::{AuditRecord, OwnershipAuditLog, OwnershipEvent};
pub use buffer::{Buffer, Owner, PAGE_SIZE};
pub use config::{ConfigError, PalConfig};
pub use error::PalError;
pub use event::{
    AudioEventKind, DecodeError, EventClass, EventPayload, EventRecord, FrameBufferEventKind,
    RecordHeader, SystemEventKind, HEADER_SIZE,
};
pub use framebuffer::{FbPhase, FrameBufferDevice, FrameBufferOpts};
pub use input::InputDevice;
pub use queue::EventQueue;
pub use resource::{Device, Resource, ResourceKind};
pub use storage::{StorageError, StorageObject};

/// Result type for every boundary call
pub type PalResult<T> = Result<T, PalError>;

/// The runtime context
pub struct Pal<H: HostBackend> {
    host: H,
    config: PalConfig,
    table: CapabilityTable<Resource>,
    pointer: PointerTranslator,
    captured: bool,
    storage_root: PathBuf,
    audit: Option<OwnershipAuditLog>,
}

impl<H: HostBackend> Pal<H> {
    /// Creates a runtime over `host` and installs the well-known devices
    pub fn new(host: H, config: PalConfig) -> PalResult<Self> {
        config.validate()?;
        let mut table = CapabilityTable::new(config.table_capacity, config.reserved_handles);
        table.install_reserved(Cap::SYSTEM, Resource::Device(Device::System))?;
        table.install_reserved(
            Cap::FRAMEBUFFER,
            Resource::Device(Device::FrameBuffer(Box::default())),
        )?;
        table.install_reserved(Cap::AUDIO, Resource::Device(Device::Audio(AudioDevice::default())))?;
        table.install_reserved(Cap::INPUT, Resource::Device(Device::Input(InputDevice::default())))?;
        table.install_reserved(Cap::STORAGE, Resource::Device(Device::Storage))?;
        log::debug!(
            "platform layer up: {} slots, {} reserved",
            config.table_capacity,
            config.reserved_handles
        );

        Ok(Self {
            host,
            config,
            table,
            pointer: PointerTranslator::new(),
            captured: false,
            storage_root: PathBuf::from("."),
            audit: None,
        })
    }

    /// Enables the ownership audit trail
    pub fn with_audit(mut self) -> Self {
        self.audit = Some(OwnershipAuditLog::new());
        self
    }

    /// Resolves storage object names relative to `root`
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &PalConfig {
        &self.config
    }

    /// Returns the ownership audit trail, if enabled
    pub fn audit(&self) -> Option<&OwnershipAuditLog> {
        self.audit.as_ref()
    }

    /// Returns what a handle names
    pub fn resource_kind(&self, cap: Cap) -> PalResult<ResourceKind> {
        self.resolve(cap).map(Resource::kind)
    }

    /// Number of live handles, well-known devices included
    pub fn live_handles(&self) -> usize {
        self.table.len()
    }

    /// Returns true if relative pointer capture is engaged
    pub fn pointer_captured(&self) -> bool {
        self.captured
    }

    pub(crate) fn resolve(&self, cap: Cap) -> PalResult<&Resource> {
        self.table
            .resolve(cap)
            .map_err(|_| PalError::InvalidCapability(cap))
    }

    pub(crate) fn resolve_mut(&mut self, cap: Cap) -> PalResult<&mut Resource> {
        self.table
            .resolve_mut(cap)
            .map_err(|_| PalError::InvalidCapability(cap))
    }

    pub(crate) fn allocate(&mut self, resource: Resource) -> PalResult<Cap> {
        let kind = resource.kind();
        let cap = self.table.allocate(resource).map_err(|err| {
            if err == CapabilityError::Exhausted {
                log::error!("capability table exhausted allocating a {}", kind);
            }
            err
        })?;
        self.record(OwnershipEvent::Allocated { cap, kind });
        Ok(cap)
    }

    pub(crate) fn release(&mut self, cap: Cap) -> PalResult<Resource> {
        let resource = self.table.release(cap).map_err(|err| match err {
            CapabilityError::NotAllocated(cap) => PalError::InvalidCapability(cap),
            other => PalError::Capability(other),
        })?;
        self.record(OwnershipEvent::Released { cap });
        Ok(resource)
    }

    pub(crate) fn record(&mut self, event: OwnershipEvent) {
        if let Some(audit) = &mut self.audit {
            audit.record(event);
        }
    }

    fn wrong(cap: Cap, expected: ResourceKind) -> PalError {
        PalError::WrongResource { cap, expected }
    }

    pub(crate) fn buffer_ref(&self, cap: Cap) -> PalResult<&Buffer> {
        match self.resolve(cap)? {
            Resource::Buffer(buffer) => Ok(buffer),
            _ => Err(Self::wrong(cap, ResourceKind::Buffer)),
        }
    }

    pub(crate) fn buffer_mut_ref(&mut self, cap: Cap) -> PalResult<&mut Buffer> {
        match self.resolve_mut(cap)? {
            Resource::Buffer(buffer) => Ok(buffer),
            _ => Err(Self::wrong(cap, ResourceKind::Buffer)),
        }
    }

    pub(crate) fn queue_ref(&self, cap: Cap) -> PalResult<&EventQueue> {
        match self.resolve(cap)? {
            Resource::Queue(queue) => Ok(queue),
            _ => Err(Self::wrong(cap, ResourceKind::Queue)),
        }
    }

    pub(crate) fn queue_mut(&mut self, cap: Cap) -> PalResult<&mut EventQueue> {
        match self.resolve_mut(cap)? {
            Resource::Queue(queue) => Ok(queue),
            _ => Err(Self::wrong(cap, ResourceKind::Queue)),
        }
    }

    pub(crate) fn framebuffer_ref(&self, cap: Cap) -> PalResult<&FrameBufferDevice> {
        match self.resolve(cap)? {
            Resource::Device(Device::FrameBuffer(fb)) => Ok(fb),
            _ => Err(Self::wrong(cap, ResourceKind::FrameBuffer)),
        }
    }

    pub(crate) fn framebuffer_mut(&mut self, cap: Cap) -> PalResult<&mut FrameBufferDevice> {
        match self.resolve_mut(cap)? {
            Resource::Device(Device::FrameBuffer(fb)) => Ok(fb),
            _ => Err(Self::wrong(cap, ResourceKind::FrameBuffer)),
        }
    }

    pub(crate) fn audio_ref(&self, cap: Cap) -> PalResult<&AudioDevice> {
        match self.resolve(cap)? {
            Resource::Device(Device::Audio(audio)) => Ok(audio),
            _ => Err(Self::wrong(cap, ResourceKind::Audio)),
        }
    }

    pub(crate) fn audio_mut(&mut self, cap: Cap) -> PalResult<&mut AudioDevice> {
        match self.resolve_mut(cap)? {
            Resource::Device(Device::Audio(audio)) => Ok(audio),
            _ => Err(Self::wrong(cap, ResourceKind::Audio)),
        }
    }

    pub(crate) fn input_ref(&self, cap: Cap) -> PalResult<&InputDevice> {
        match self.resolve(cap)? {
            Resource::Device(Device::Input(input)) => Ok(input),
            _ => Err(Self::wrong(cap, ResourceKind::Input)),
        }
    }

    pub(crate) fn input_mut(&mut self, cap: Cap) -> PalResult<&mut InputDevice> {
        match self.resolve_mut(cap)? {
            Resource::Device(Device::Input(input)) => Ok(input),
            _ => Err(Self::wrong(cap, ResourceKind::Input)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_host::SimulatedHost;

    fn pal() -> Pal<SimulatedHost> {
        Pal::new(SimulatedHost::default(), PalConfig::default()).unwrap()
    }

    #[test]
    fn test_well_known_devices_installed() {
        let pal = pal();
        assert_eq!(pal.resource_kind(Cap::SYSTEM).unwrap(), ResourceKind::System);
        assert_eq!(pal.resource_kind(Cap::FRAMEBUFFER).unwrap(), ResourceKind::FrameBuffer);
        assert_eq!(pal.resource_kind(Cap::AUDIO).unwrap(), ResourceKind::Audio);
        assert_eq!(pal.resource_kind(Cap::INPUT).unwrap(), ResourceKind::Input);
        assert_eq!(pal.resource_kind(Cap::STORAGE).unwrap(), ResourceKind::Storage);
        assert_eq!(pal.live_handles(), 5);
        assert!(!pal.pointer_captured());
    }

    #[test]
    fn test_unknown_handles_rejected() {
        let pal = pal();
        assert!(matches!(
            pal.resource_kind(Cap::new(1)),
            Err(PalError::InvalidCapability(_))
        ));
        assert!(matches!(
            pal.resource_kind(Cap::INVALID),
            Err(PalError::InvalidCapability(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PalConfig::default().with_framebuffer_buffers(1);
        assert!(matches!(
            Pal::new(SimulatedHost::default(), config),
            Err(PalError::Config(_))
        ));
    }

    #[test]
    fn test_wrong_resource() {
        let pal = pal();
        assert!(matches!(
            pal.queue_ref(Cap::INPUT),
            Err(PalError::WrongResource {
                expected: ResourceKind::Queue,
                ..
            })
        ));
    }

    #[test]
    fn test_well_known_devices_cannot_be_released() {
        let mut pal = pal();
        assert!(matches!(
            pal.release(Cap::INPUT),
            Err(PalError::Capability(CapabilityError::Reserved(_)))
        ));
    }
}
