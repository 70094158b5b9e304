//! Resource records held by the capability table

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::AudioDevice;
use crate::buffer::Buffer;
use crate::framebuffer::FrameBufferDevice;
use crate::input::InputDevice;
use crate::queue::EventQueue;
use crate::storage::StorageObject;

/// What a capability names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Buffer,
    Queue,
    System,
    FrameBuffer,
    Audio,
    Input,
    Storage,
    StorageObject,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Queue => "queue",
            ResourceKind::System => "system device",
            ResourceKind::FrameBuffer => "framebuffer device",
            ResourceKind::Audio => "audio device",
            ResourceKind::Input => "input device",
            ResourceKind::Storage => "storage device",
            ResourceKind::StorageObject => "storage object",
        };
        f.write_str(name)
    }
}

/// Device state
#[derive(Debug)]
pub enum Device {
    System,
    FrameBuffer(Box<FrameBufferDevice>),
    Audio(AudioDevice),
    Input(InputDevice),
    Storage,
}

/// A capability table record
#[derive(Debug)]
pub enum Resource {
    Buffer(Buffer),
    Queue(EventQueue),
    Device(Device),
    StorageObject(StorageObject),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Buffer(_) => ResourceKind::Buffer,
            Resource::Queue(_) => ResourceKind::Queue,
            Resource::Device(Device::System) => ResourceKind::System,
            Resource::Device(Device::FrameBuffer(_)) => ResourceKind::FrameBuffer,
            Resource::Device(Device::Audio(_)) => ResourceKind::Audio,
            Resource::Device(Device::Input(_)) => ResourceKind::Input,
            Resource::Device(Device::Storage) => ResourceKind::Storage,
            Resource::StorageObject(_) => ResourceKind::StorageObject,
        }
    }
}
