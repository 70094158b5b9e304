//! Storage collaborator
//!
//! Named objects are plain files under the storage root. Reads are all or
//! nothing: a copy that cannot produce every requested byte fails.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use core_types::Cap;
use hal::HostBackend;
use thiserror::Error;

use crate::error::PalError;
use crate::resource::{Resource, ResourceKind};
use crate::{Pal, PalResult};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage object not found: {0}")]
    NotFound(String),

    #[error("Short read: {got} of {expected} bytes")]
    ShortRead { expected: usize, got: usize },

    #[error("Short write")]
    ShortWrite,

    #[error("Deleting storage objects is not supported")]
    DeleteUnsupported,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An open storage object
#[derive(Debug)]
pub struct StorageObject {
    name: String,
    file: File,
    size: u64,
}

impl StorageObject {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size at the time the object was found
    pub fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&mut self, offset: u64, dest: &mut [u8]) -> Result<(), StorageError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut got = 0;
        while got < dest.len() {
            match self.file.read(&mut dest[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        if got < dest.len() {
            return Err(StorageError::ShortRead {
                expected: dest.len(),
                got,
            });
        }
        Ok(())
    }
}

impl<H: HostBackend> Pal<H> {
    /// Returns true if a storage object called `name` exists
    pub fn storage_exists(&self, name: &str) -> bool {
        self.storage_path(name).is_file()
    }

    /// Opens a storage object and returns a handle to it
    pub fn storage_find(&mut self, name: &str) -> PalResult<Cap> {
        let path = self.storage_path(name);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()).into());
            }
            Err(err) => return Err(StorageError::Io(err).into()),
        };
        let size = file.metadata().map_err(StorageError::Io)?.len();
        self.allocate(Resource::StorageObject(StorageObject {
            name: name.to_string(),
            file,
            size,
        }))
    }

    /// Size in bytes of an open storage object
    pub fn storage_size(&self, handle: Cap) -> PalResult<u64> {
        Ok(self.storage_object(handle)?.size)
    }

    /// Copies `len` bytes starting at `offset` into the front of `dest`
    pub fn storage_copy_to_memory(
        &mut self,
        handle: Cap,
        dest: Cap,
        offset: u64,
        len: usize,
    ) -> PalResult<()> {
        self.storage_object(handle)?;
        let size = self.app_buffer(dest)?.len();
        if size < len {
            return Err(PalError::BufferTooSmall {
                cap: dest,
                needed: len,
                size,
            });
        }

        let mut scratch = vec![0u8; len];
        match self.resolve_mut(handle)? {
            Resource::StorageObject(object) => object.read_at(offset, &mut scratch)?,
            _ => return Err(not_storage(handle)),
        }
        self.buffer_mut_ref(dest)?.bytes_mut()[..len].copy_from_slice(&scratch);
        Ok(())
    }

    /// Writes the first `size` bytes of `buf` to `name`, replacing any
    /// existing object
    pub fn storage_create(&mut self, name: &str, buf: Cap, size: usize) -> PalResult<()> {
        let buffer = self.app_buffer(buf)?;
        if buffer.len() < size {
            return Err(PalError::BufferTooSmall {
                cap: buf,
                needed: size,
                size: buffer.len(),
            });
        }
        let mut file = File::create(self.storage_path(name)).map_err(StorageError::Io)?;
        file.write_all(&buffer.bytes()[..size]).map_err(|err| match err.kind() {
            io::ErrorKind::WriteZero => StorageError::ShortWrite,
            _ => StorageError::Io(err),
        })?;
        log::debug!("stored {} ({} bytes)", name, size);
        Ok(())
    }

    /// Deleting named objects is not supported
    pub fn storage_delete(&mut self, name: &str) -> PalResult<()> {
        log::debug!("refusing to delete {}", name);
        Err(StorageError::DeleteUnsupported.into())
    }

    /// Closes a storage object handle
    pub fn storage_close(&mut self, handle: Cap) -> PalResult<()> {
        self.storage_object(handle)?;
        self.release(handle)?;
        Ok(())
    }

    fn storage_path(&self, name: &str) -> PathBuf {
        self.storage_root.join(name)
    }

    fn storage_object(&self, handle: Cap) -> PalResult<&StorageObject> {
        match self.resolve(handle)? {
            Resource::StorageObject(object) => Ok(object),
            _ => Err(not_storage(handle)),
        }
    }
}

fn not_storage(cap: Cap) -> PalError {
    PalError::WrongResource {
        cap,
        expected: ResourceKind::StorageObject,
    }
}
