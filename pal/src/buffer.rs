//! # Buffer Manager
//!
//! Raw memory regions addressed by capability.
//!
//! ## Ownership
//!
//! Every buffer is held by exactly one party. Application-created buffers
//! start with [`Owner::App`]; device pool buffers start with
//! [`Owner::Device`] and reach the application inside an event. Reading,
//! writing or sizing a buffer requires holding it.

use core_types::Cap;
use serde::{Deserialize, Serialize};

use crate::audit::OwnershipEvent;
use crate::error::PalError;
use crate::resource::Resource;
use crate::{Pal, PalResult};
use hal::HostBackend;

/// Page size for [`Pal::buffer_create_shared`]
pub const PAGE_SIZE: usize = 4096;

/// Who may touch a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    App,
    Device,
}

/// A contiguous memory region
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    owner: Owner,
    hint: u32,
    bound_to: Option<Cap>,
}

impl Buffer {
    /// Creates an application-owned buffer
    pub fn new(size: usize, hint: u32) -> Self {
        Self {
            data: vec![0; size],
            owner: Owner::App,
            hint,
            bound_to: None,
        }
    }

    /// Creates a buffer owned by and bound to `device`
    pub(crate) fn for_device(size: usize, device: Cap) -> Self {
        Self {
            data: vec![0; size],
            owner: Owner::Device,
            hint: 0,
            bound_to: Some(device),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Allocation hint given at creation
    pub fn hint(&self) -> u32 {
        self.hint
    }

    /// Device whose pool this buffer belongs to
    pub fn bound_to(&self) -> Option<Cap> {
        self.bound_to
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn resize(&mut self, size: usize) {
        self.data.resize(size, 0);
    }

    pub(crate) fn set_owner(&mut self, owner: Owner) {
        self.owner = owner;
    }
}

impl<H: HostBackend> Pal<H> {
    /// Allocates an application-owned buffer of `size` bytes
    pub fn buffer_create(&mut self, size: usize, hint: u32) -> PalResult<Cap> {
        self.allocate(Resource::Buffer(Buffer::new(size, hint)))
    }

    /// Allocates a page-granular buffer
    pub fn buffer_create_shared(&mut self, pages: usize) -> PalResult<Cap> {
        self.buffer_create(pages * PAGE_SIZE, 0)
    }

    /// Maps a shared buffer into another party's I/O area
    ///
    /// Placeholder for a later cross-process transfer: validates both
    /// handles and does nothing else.
    pub fn buffer_map_shared(&mut self, buffer: Cap, io_area_offset: usize, io: Cap) -> PalResult<()> {
        self.buffer_ref(buffer)?;
        self.resolve(io)?;
        log::debug!(
            "map_shared {} at {:#x} into {} is not implemented",
            buffer,
            io_area_offset,
            io
        );
        Ok(())
    }

    /// Returns the contents of a buffer the application holds
    pub fn buffer_data(&self, cap: Cap) -> PalResult<&[u8]> {
        Ok(self.app_buffer(cap)?.bytes())
    }

    /// Returns the contents of a buffer the application holds, for writing
    pub fn buffer_data_mut(&mut self, cap: Cap) -> PalResult<&mut [u8]> {
        let buffer = self.buffer_mut_ref(cap)?;
        if buffer.owner != Owner::App {
            return Err(PalError::NotOwner(cap));
        }
        Ok(buffer.bytes_mut())
    }

    /// Returns the size of a buffer the application holds
    pub fn buffer_size(&self, cap: Cap) -> PalResult<usize> {
        Ok(self.app_buffer(cap)?.len())
    }

    /// Returns who currently holds a buffer
    pub fn buffer_owner(&self, cap: Cap) -> PalResult<Owner> {
        Ok(self.buffer_ref(cap)?.owner)
    }

    /// Releases a buffer and invalidates its handle
    pub fn buffer_destroy(&mut self, cap: Cap) -> PalResult<()> {
        let buffer = self.buffer_ref(cap)?;
        if let Some(device) = buffer.bound_to {
            return Err(PalError::BufferInUse { buffer: cap, device });
        }
        if buffer.owner != Owner::App {
            return Err(PalError::NotOwner(cap));
        }
        self.release(cap)?;
        Ok(())
    }

    /// Resolves a buffer and checks the application holds it
    pub(crate) fn app_buffer(&self, cap: Cap) -> PalResult<&Buffer> {
        let buffer = self.buffer_ref(cap)?;
        if buffer.owner != Owner::App {
            return Err(PalError::NotOwner(cap));
        }
        Ok(buffer)
    }

    /// Moves a buffer to `to`
    pub(crate) fn transfer(&mut self, cap: Cap, to: Owner) -> PalResult<()> {
        self.buffer_mut_ref(cap)?.set_owner(to);
        self.record(OwnershipEvent::Transferred { cap, to });
        Ok(())
    }
}
