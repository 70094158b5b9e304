//! # Core Types
//!
//! This crate defines the capability handle and the capability table shared by
//! every other hostpal crate.
//!
//! ## Philosophy
//!
//! - **Handles, not pointers**: Applications name buffers, queues and devices
//!   through opaque integer capabilities, never through host handles.
//! - **One resource per handle**: A live handle resolves to exactly one record.
//! - **No recycling**: Handles are allocated monotonically and never reused
//!   while the process runs.
//!
//! ## Non-Goals
//!
//! The table is a trusted, single-process handle allocator. It does not
//! implement revocation, delegation or rights checking.
//!
//! ## Key Types
//!
//! - [`Cap`]: An opaque capability handle
//! - [`CapabilityTable`]: Fixed-capacity registry of handle → resource record
//! - [`CapabilityError`]: Allocation and resolution failures

pub mod capability;
pub mod table;

pub use capability::{Cap, CapabilityError};
pub use table::CapabilityTable;
