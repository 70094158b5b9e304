//! Capability table
//!
//! Fixed-capacity registry mapping a [`Cap`] to a resource record.
//!
//! Slots below `reserved` hold well-known singleton devices installed once at
//! start-up. Slots at or above it are handed out by [`CapabilityTable::allocate`]
//! from a monotonic cursor; a released slot is zeroed and its handle is never
//! returned again.

use crate::capability::{Cap, CapabilityError};

/// Fixed-capacity handle allocator and registry
#[derive(Debug)]
pub struct CapabilityTable<R> {
    slots: Vec<Option<R>>,
    reserved: u32,
    next: u32,
    live: usize,
}

impl<R> CapabilityTable<R> {
    /// Creates a table with `capacity` slots, the first `reserved` of which
    /// are kept for well-known handles.
    ///
    /// `reserved` is clamped to `capacity`.
    pub fn new(capacity: usize, reserved: u32) -> Self {
        let capacity = capacity.min(u32::MAX as usize);
        let reserved = reserved.min(capacity as u32);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            reserved,
            next: reserved,
            live: 0,
        }
    }

    /// Returns the number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the reserved threshold
    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Returns the number of live handles
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if no handle is live
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns the number of handles `allocate` can still produce
    pub fn remaining(&self) -> usize {
        self.slots.len().saturating_sub(self.next as usize)
    }

    /// Installs a well-known resource below the reserved threshold
    pub fn install_reserved(&mut self, cap: Cap, resource: R) -> Result<(), CapabilityError> {
        if cap.raw() >= self.reserved {
            return Err(CapabilityError::NotAllocated(cap));
        }
        let slot = &mut self.slots[cap.index()];
        if slot.is_some() {
            return Err(CapabilityError::AlreadyAllocated(cap));
        }
        *slot = Some(resource);
        self.live += 1;
        Ok(())
    }

    /// Allocates a fresh handle above the reserved threshold
    pub fn allocate(&mut self, resource: R) -> Result<Cap, CapabilityError> {
        if self.next as usize >= self.slots.len() {
            return Err(CapabilityError::Exhausted);
        }
        let cap = Cap::new(self.next);
        self.slots[cap.index()] = Some(resource);
        self.next += 1;
        self.live += 1;
        Ok(cap)
    }

    /// Resolves a handle
    pub fn resolve(&self, cap: Cap) -> Result<&R, CapabilityError> {
        self.slots
            .get(cap.index())
            .and_then(Option::as_ref)
            .ok_or(CapabilityError::NotAllocated(cap))
    }

    /// Resolves a handle for mutation
    pub fn resolve_mut(&mut self, cap: Cap) -> Result<&mut R, CapabilityError> {
        self.slots
            .get_mut(cap.index())
            .and_then(Option::as_mut)
            .ok_or(CapabilityError::NotAllocated(cap))
    }

    /// Returns true if the handle currently resolves
    pub fn contains(&self, cap: Cap) -> bool {
        self.resolve(cap).is_ok()
    }

    /// Releases a handle, returning its record so the caller can free any
    /// host resources it holds
    pub fn release(&mut self, cap: Cap) -> Result<R, CapabilityError> {
        if cap.raw() < self.reserved && self.contains(cap) {
            return Err(CapabilityError::Reserved(cap));
        }
        let record = self
            .slots
            .get_mut(cap.index())
            .and_then(Option::take)
            .ok_or(CapabilityError::NotAllocated(cap))?;
        self.live -= 1;
        Ok(record)
    }

    /// Iterates over live handles and their records
    pub fn iter(&self) -> impl Iterator<Item = (Cap, &R)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (Cap::new(i as u32), r)))
    }
}
