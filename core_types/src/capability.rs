//! Capability handles
//!
//! A [`Cap`] is a process-local integer naming exactly one resource at a time.
//! Handles below the table's reserved threshold name well-known singleton
//! devices; everything else is handed out by [`crate::CapabilityTable`].
//!
//! ## Example
//!
//! ```
//! use core_types::Cap;
//!
//! let cap = Cap::new(142);
//! assert_eq!(cap.raw(), 142);
//! assert!(!cap.is_invalid());
//! assert!(Cap::INVALID.is_invalid());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An opaque capability handle
///
/// The value is 32 bits wide because that is the width of the destination
/// field in an event record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cap(u32);

impl Cap {
    /// The system device (quit notifications are addressed here)
    pub const SYSTEM: Cap = Cap(0);
    /// The default framebuffer device
    pub const FRAMEBUFFER: Cap = Cap(2);
    /// The default audio device
    pub const AUDIO: Cap = Cap(3);
    /// The default input device
    pub const INPUT: Cap = Cap(4);
    /// The storage device
    pub const STORAGE: Cap = Cap(5);
    /// Marker for "no destination"; never allocated
    pub const INVALID: Cap = Cap(u32::MAX);

    /// Creates a handle from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Returns true for the "no destination" marker
    pub const fn is_invalid(&self) -> bool {
        self.0 == u32::MAX
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Cap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Cap(invalid)")
        } else {
            write!(f, "Cap({})", self.0)
        }
    }
}

impl From<u32> for Cap {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Errors related to capability allocation and resolution
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// Every slot above the reserved threshold has been handed out
    #[error("Capability table exhausted")]
    Exhausted,
    /// The handle was never allocated or has been released
    #[error("Invalid capability: {0}")]
    NotAllocated(Cap),
    /// The handle is a well-known singleton and cannot be released
    #[error("Capability {0} is reserved")]
    Reserved(Cap),
    /// A well-known slot was installed twice
    #[error("Capability {0} is already allocated")]
    AlreadyAllocated(Cap),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_creation() {
        let cap = Cap::new(1);
        assert_eq!(cap.raw(), 1);
        assert_eq!(Cap::from(7), Cap::new(7));
    }

    #[test]
    fn test_well_known_handles_are_distinct() {
        let known = [Cap::SYSTEM, Cap::FRAMEBUFFER, Cap::AUDIO, Cap::INPUT, Cap::STORAGE];
        for (i, a) in known.iter().enumerate() {
            for b in &known[i + 1..] {
                assert_ne!(a, b);
            }
            assert!(!a.is_invalid());
        }
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(format!("{}", Cap::new(42)), "Cap(42)");
        assert_eq!(format!("{}", Cap::INVALID), "Cap(invalid)");
    }

    #[test]
    fn test_capability_serde() {
        let json = serde_json::to_string(&Cap::INPUT).unwrap();
        assert_eq!(json, "4");
        let back: Cap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Cap::INPUT);
    }
}
