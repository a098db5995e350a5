//! The device-layer collaborators this crate consumes. Instance/physical
//! device selection, surface and swapchain construction are bootstrap
//! concerns and stay out of this crate (see spec §1 "out of scope");
//! `Device` here only carries what the scheduler, sync context and
//! command arena need: queue-family capability, feature flags, and the
//! raw `ash::Device` to call into.

use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;

/// Coarse queue selector used throughout the scheduler and render task
/// graph; the concrete queue (and family) is resolved at submit time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueClass {
    Graphics,
    Transfer,
    Compute,
}

impl std::fmt::Display for QueueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            QueueClass::Graphics => "graphics",
            QueueClass::Transfer => "transfer",
            QueueClass::Compute => "compute",
        })
    }
}

/// Which queue families this device exposes, and whether transfer/compute
/// have a dedicated family distinct from graphics.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyProfile {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
    pub transfer_family: Option<u32>,
    pub compute_family: Option<u32>,
    pub transfer_dedicated: bool,
    pub compute_dedicated: bool,
}

impl QueueFamilyProfile {
    pub fn family_for(&self, class: QueueClass) -> Option<u32> {
        match class {
            QueueClass::Graphics => self.graphics_family,
            QueueClass::Transfer => self.transfer_family,
            QueueClass::Compute => self.compute_family,
        }
    }

    pub fn is_dedicated(&self, class: QueueClass) -> bool {
        match class {
            QueueClass::Graphics => true,
            QueueClass::Transfer => self.transfer_dedicated,
            QueueClass::Compute => self.compute_dedicated,
        }
    }
}

/// Feature flags the rest of the crate branches on: synchronization2
/// decides `submit` vs `submit2` and barrier recording; timeline_semaphore
/// decides whether `FrameSyncContext` runs in timeline or fence-fallback
/// mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceFeatures {
    pub synchronization2: bool,
    pub timeline_semaphore: bool,
    pub buffer_device_address: bool,
    pub dynamic_rendering: bool,
    pub descriptor_indexing: bool,
}

/// Opaque, dense identifier for a device, used as the deferred deletion
/// service's registry key. Stable for the process lifetime of the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

impl DeviceId {
    pub fn next() -> Self {
        DeviceId(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The device handle this crate's components depend on. Bootstrap
/// (instance creation, physical device selection, logical device
/// creation) happens upstream of this crate; this struct just wraps the
/// already-created `ash::Device` together with the capability profile the
/// scheduler and sync context need to make decisions.
pub struct Device {
    pub id: DeviceId,
    pub raw: ash::Device,
    pub queue_family_profile: QueueFamilyProfile,
    pub features: DeviceFeatures,
}

impl Device {
    pub fn new(raw: ash::Device, queue_family_profile: QueueFamilyProfile, features: DeviceFeatures) -> Self {
        Self {
            id: DeviceId::next(),
            raw,
            queue_family_profile,
            features,
        }
    }

    pub fn wait_idle(&self) -> Result<(), crate::error::DeviceError> {
        unsafe {
            self.raw
                .device_wait_idle()
                .map_err(|e| crate::error::DeviceError::vulkan("wait_idle", e))
        }
    }
}
