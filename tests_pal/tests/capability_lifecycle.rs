//! Capability Lifecycle Integration Tests
//!
//! These tests validate the handle model end to end:
//! - Well-known devices sit below the reserved threshold
//! - Allocation is monotonic; released handles never resolve again
//! - Exhaustion is a typed error
//! - Every buffer has exactly one owner, recorded in the audit trail

use core_types::{Cap, CapabilityError};
use pal::{Owner, OwnershipEvent, PalConfig, PalError, ResourceKind};
use sim_host::SimulatedHost;
use tests_pal::{test_pal, test_pal_with};

#[test]
fn test_well_known_devices() {
    let pal = test_pal();
    assert_eq!(pal.resource_kind(Cap::SYSTEM).unwrap(), ResourceKind::System);
    assert_eq!(pal.resource_kind(Cap::FRAMEBUFFER).unwrap(), ResourceKind::FrameBuffer);
    assert_eq!(pal.resource_kind(Cap::AUDIO).unwrap(), ResourceKind::Audio);
    assert_eq!(pal.resource_kind(Cap::INPUT).unwrap(), ResourceKind::Input);
    assert_eq!(pal.resource_kind(Cap::STORAGE).unwrap(), ResourceKind::Storage);
    assert_eq!(pal.live_handles(), 5);
    assert!(matches!(
        pal.resource_kind(Cap::new(1)),
        Err(PalError::InvalidCapability(_))
    ));
}

#[test]
fn test_allocation_is_monotonic() {
    let mut pal = test_pal();
    let reserved = pal.config().reserved_handles;

    let a = pal.buffer_create(16, 0).unwrap();
    let q = pal.queue_new(12).unwrap();
    assert_eq!(a.raw(), reserved);
    assert_eq!(q.raw(), reserved + 1);

    pal.buffer_destroy(a).unwrap();
    let b = pal.buffer_create(16, 0).unwrap();
    assert_eq!(b.raw(), reserved + 2);
    assert!(matches!(pal.buffer_size(a), Err(PalError::InvalidCapability(_))));
    assert!(!pal.audit().unwrap().has_reuse());
}

#[test]
fn test_table_exhaustion() {
    let config = PalConfig::new()
        .with_table_capacity(104)
        .with_reserved_handles(100);
    let mut pal = test_pal_with(SimulatedHost::default(), config);

    for _ in 0..4 {
        pal.buffer_create(8, 0).unwrap();
    }
    assert!(matches!(
        pal.buffer_create(8, 0),
        Err(PalError::Capability(CapabilityError::Exhausted))
    ));
    assert!(matches!(
        pal.queue_new(12),
        Err(PalError::Capability(CapabilityError::Exhausted))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let config = PalConfig::new()
        .with_table_capacity(50)
        .with_reserved_handles(100);
    assert!(matches!(
        pal::Pal::new(SimulatedHost::default(), config),
        Err(PalError::Config(_))
    ));
}

#[test]
fn test_handles_are_typed() {
    let mut pal = test_pal();
    let buffer = pal.buffer_create(16, 0).unwrap();
    let queue = pal.queue_new(12).unwrap();

    assert!(matches!(
        pal.queue_read(buffer),
        Err(PalError::WrongResource { expected: ResourceKind::Queue, .. })
    ));
    assert!(matches!(
        pal.buffer_data(queue),
        Err(PalError::WrongResource { expected: ResourceKind::Buffer, .. })
    ));
    assert!(matches!(
        pal.buffer_destroy(Cap::FRAMEBUFFER),
        Err(PalError::WrongResource { .. })
    ));
}

#[test]
fn test_buffer_audit_trail() {
    let mut pal = test_pal();
    let buffer = pal.buffer_create(32, 7).unwrap();
    pal.buffer_data_mut(buffer).unwrap()[31] = 1;
    pal.buffer_destroy(buffer).unwrap();

    let audit = pal.audit().unwrap();
    let events: Vec<OwnershipEvent> = audit
        .events_for(buffer)
        .into_iter()
        .map(|record| record.event)
        .collect();
    assert_eq!(
        events,
        vec![
            OwnershipEvent::Allocated {
                cap: buffer,
                kind: ResourceKind::Buffer
            },
            OwnershipEvent::Released { cap: buffer },
        ]
    );
    assert!(audit.transfers_for(buffer).is_empty());
}

#[test]
fn test_shared_buffers_are_page_sized() {
    let mut pal = test_pal();
    let shared = pal.buffer_create_shared(2).unwrap();
    assert_eq!(pal.buffer_size(shared).unwrap(), 2 * pal::PAGE_SIZE);
    assert_eq!(pal.buffer_owner(shared).unwrap(), Owner::App);
    // mapping validates both handles and nothing more
    pal.buffer_map_shared(shared, 0, Cap::AUDIO).unwrap();
    assert!(matches!(
        pal.buffer_map_shared(shared, 0, Cap::new(600)),
        Err(PalError::InvalidCapability(_))
    ));
}
