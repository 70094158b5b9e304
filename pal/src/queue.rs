//! # Event Queue
//!
//! A single-reader ring of encoded [`EventRecord`]s.
//!
//! The ring is `2^n` bytes with free-running `u32` read and write cursors;
//! positions are taken modulo the size mask, so a record may wrap around the
//! end of the ring. Records are never split across a full ring: a push that
//! does not fit fails and leaves the ring untouched.
//!
//! ## Delivery
//!
//! There is one true delivery point, the host event stream. Reading an empty
//! queue pumps one host notification, translates it and routes the resulting
//! record into the queue bound to its destination. The record then sits in
//! that queue until the reader calls [`Pal::queue_advance`].

use core_types::Cap;
use hal::HostBackend;

use crate::config::MAX_QUEUE_POW2;
use crate::error::PalError;
use crate::event::{EventClass, EventRecord, RecordHeader, HEADER_SIZE};
use crate::resource::{Device, Resource};
use crate::{Pal, PalResult};

/// Fixed-capacity byte ring of event records
#[derive(Debug, Clone)]
pub struct EventQueue {
    ring: Vec<u8>,
    read: u32,
    write: u32,
    mask: u32,
    records: usize,
}

impl EventQueue {
    /// Creates a ring of `2^pow2` bytes
    pub fn new(pow2: u32) -> Self {
        let capacity = 1usize << pow2;
        Self {
            ring: vec![0; capacity],
            read: 0,
            write: 0,
            mask: (capacity - 1) as u32,
            records: 0,
        }
    }

    /// Ring size in bytes
    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Bytes occupied by queued records
    pub fn used(&self) -> usize {
        self.write.wrapping_sub(self.read) as usize
    }

    /// Bytes available for new records
    pub fn free(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Number of queued records
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Appends one encoded record; fails with the free byte count if it
    /// does not fit
    pub fn push(&mut self, record: &[u8]) -> Result<(), usize> {
        if record.len() > self.free() {
            return Err(self.free());
        }
        let start = (self.write & self.mask) as usize;
        let first = record.len().min(self.ring.len() - start);
        self.ring[start..start + first].copy_from_slice(&record[..first]);
        self.ring[..record.len() - first].copy_from_slice(&record[first..]);
        self.write = self.write.wrapping_add(record.len() as u32);
        self.records += 1;
        Ok(())
    }

    /// Copies out the record at the read cursor without consuming it
    pub fn peek(&self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }
        let header = self.copy_out(self.read, HEADER_SIZE);
        let size = u16::from_le_bytes([header[4], header[5]]) as usize;
        Some(self.copy_out(self.read, size.max(HEADER_SIZE)))
    }

    /// Discards the record at the read cursor
    pub fn pop(&mut self) -> bool {
        let Some(size) = self.peek_size() else {
            return false;
        };
        self.read = self.read.wrapping_add(size as u32);
        self.records -= 1;
        true
    }

    fn peek_size(&self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let header = self.copy_out(self.read, HEADER_SIZE);
        Some((u16::from_le_bytes([header[4], header[5]]) as usize).max(HEADER_SIZE))
    }

    fn copy_out(&self, from: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.ring[(from.wrapping_add(i as u32) & self.mask) as usize])
            .collect()
    }
}

impl<H: HostBackend> Pal<H> {
    /// Creates a queue with a ring of `2^pow2` bytes
    ///
    /// Sizes below the configured floor are raised to it.
    pub fn queue_new(&mut self, pow2: u32) -> PalResult<Cap> {
        if pow2 > MAX_QUEUE_POW2 {
            return Err(PalError::QueueTooLarge {
                pow2,
                max: MAX_QUEUE_POW2,
            });
        }
        let pow2 = pow2.max(self.config.min_queue_pow2);
        self.allocate(Resource::Queue(EventQueue::new(pow2)))
    }

    /// Destroys a queue
    ///
    /// Devices bound to it fall back to delivering into whichever queue
    /// pumps the host stream.
    pub fn queue_destroy(&mut self, queue: Cap) -> PalResult<()> {
        self.queue_ref(queue)?;
        self.release(queue)?;
        Ok(())
    }

    /// Blocks until a record is queued here or any host notification is
    /// pending
    pub fn queue_wait(&mut self, queue: Cap) -> PalResult<()> {
        if !self.queue_ref(queue)?.is_empty() {
            return Ok(());
        }
        self.host.wait_event()?;
        Ok(())
    }

    /// Returns the record at the head of `queue` without consuming it
    ///
    /// If the queue is empty, pumps one host notification first. Returns
    /// `None` when nothing landed in this queue: the notification produced
    /// no record, or its record was routed to another queue.
    pub fn queue_read(&mut self, queue: Cap) -> PalResult<Option<EventRecord>> {
        if self.queue_ref(queue)?.is_empty() {
            let Some(event) = self.host.poll_event() else {
                return Ok(None);
            };
            self.dispatch(event, queue)?;
        }

        let Some(bytes) = self.queue_ref(queue)?.peek() else {
            return Ok(None);
        };
        let header = RecordHeader::parse(&bytes)?;
        let decoded = self
            .event_class(header.cap)
            .ok_or(crate::event::DecodeError::UnknownDestination(header.cap))
            .and_then(|class| EventRecord::decode(&bytes, class));
        match decoded {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                // an undecodable record would wedge the queue
                self.queue_mut(queue)?.pop();
                log::warn!("dropped undecodable record in {}: {}", queue, err);
                Err(err.into())
            }
        }
    }

    /// Consumes the record at the head of `queue`
    pub fn queue_advance(&mut self, queue: Cap) -> PalResult<()> {
        self.queue_mut(queue)?.pop();
        Ok(())
    }

    /// Returns true if neither this queue nor the host stream has anything
    /// pending
    pub fn queue_empty(&self, queue: Cap) -> PalResult<bool> {
        Ok(self.queue_ref(queue)?.is_empty() && !self.host.has_pending())
    }

    /// Number of records waiting in `queue`
    pub fn queue_len(&self, queue: Cap) -> PalResult<usize> {
        Ok(self.queue_ref(queue)?.len())
    }

    /// Encodes `record` into `queue`
    pub(crate) fn enqueue(&mut self, queue: Cap, record: &EventRecord) -> PalResult<()> {
        let bytes = record.to_bytes();
        self.queue_mut(queue)?
            .push(&bytes)
            .map_err(|free| PalError::QueueFull {
                queue,
                needed: bytes.len(),
                free,
            })
    }

    /// Class of the destination, from the kind of device it names
    pub(crate) fn event_class(&self, cap: Cap) -> Option<EventClass> {
        match self.resolve(cap).ok()? {
            Resource::Device(Device::System) => Some(EventClass::System),
            Resource::Device(Device::FrameBuffer(_)) => Some(EventClass::FrameBuffer),
            Resource::Device(Device::Audio(_)) => Some(EventClass::Audio),
            Resource::Device(Device::Input(_)) => Some(EventClass::Input),
            _ => None,
        }
    }
}
