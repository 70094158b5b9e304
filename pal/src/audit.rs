//! Ownership Audit Trail
//!
//! Records every handle allocation, release and buffer ownership transfer
//! so tests can check the linear-ownership discipline after the fact.
//!
//! ## Philosophy
//!
//! - Test-only: This is NOT production logging, it's for test verification
//! - Deterministic: Events carry a sequence number, not a wall-clock time
//! - Queryable: Tests can assert on the history of a single handle
//!
//! ## Example
//!
//! ```
//! use pal::{Owner, OwnershipAuditLog, OwnershipEvent};
//! use core_types::Cap;
//!
//! let mut log = OwnershipAuditLog::new();
//! log.record(OwnershipEvent::Transferred { cap: Cap::new(100), to: Owner::Device });
//! assert_eq!(log.transfers_for(Cap::new(100)), vec![Owner::Device]);
//! ```

use core_types::Cap;

use crate::buffer::Owner;
use crate::resource::ResourceKind;

/// A single ownership-relevant event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipEvent {
    Allocated { cap: Cap, kind: ResourceKind },
    Released { cap: Cap },
    Transferred { cap: Cap, to: Owner },
}

impl OwnershipEvent {
    pub fn cap(&self) -> Cap {
        match self {
            OwnershipEvent::Allocated { cap, .. }
            | OwnershipEvent::Released { cap }
            | OwnershipEvent::Transferred { cap, .. } => *cap,
        }
    }
}

/// An event with its position in the trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditRecord {
    pub seq: u64,
    pub event: OwnershipEvent,
}

/// Chronological ownership trail
#[derive(Debug, Default)]
pub struct OwnershipAuditLog {
    records: Vec<AuditRecord>,
    next_seq: u64,
}

impl OwnershipAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event
    pub fn record(&mut self, event: OwnershipEvent) {
        self.records.push(AuditRecord {
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
    }

    /// Returns all recorded events
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Returns events for one handle
    pub fn events_for(&self, cap: Cap) -> Vec<&AuditRecord> {
        self.records.iter().filter(|r| r.event.cap() == cap).collect()
    }

    /// Returns the sequence of owners a buffer was transferred to
    pub fn transfers_for(&self, cap: Cap) -> Vec<Owner> {
        self.records
            .iter()
            .filter_map(|r| match r.event {
                OwnershipEvent::Transferred { cap: c, to } if c == cap => Some(to),
                _ => None,
            })
            .collect()
    }

    /// Returns true if a handle was allocated after it was released
    pub fn has_reuse(&self) -> bool {
        let mut released = std::collections::HashSet::new();
        for record in &self.records {
            match record.event {
                OwnershipEvent::Released { cap } => {
                    released.insert(cap);
                }
                OwnershipEvent::Allocated { cap, .. } if released.contains(&cap) => return true,
                _ => {}
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
