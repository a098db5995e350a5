//! The GPU memory allocator contract. Treated as an external service per
//! spec §1 — the render task graph's transient-resource planner depends
//! on it for the actual memory behind aliased transient resources, but
//! its internals (buddy/slab strategy, pool growth) are out of scope.
//! The concrete implementation wraps `gpu-allocator`, the crate the
//! teacher's RHI layer already depends on.

use ash::vk;
use gpu_allocator::vulkan as gpu_alloc;
use parking_lot::Mutex;
use rg_core::error::{ErrorContext, Subsystem};
use thiserror::Error;

/// Whether an allocation backs a resource that lives for the whole
/// device lifetime or only for the frame in which the render task graph
/// declared it. The transient-resource planner uses this to prefer
/// short-lived pools and to make aliasing decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifetimeClass {
    Persistent,
    Transient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Buffer,
    Image,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AllocationFlags {
    pub host_visible: bool,
    pub host_coherent: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct AllocationDesc {
    pub requirements: vk::MemoryRequirements,
    pub property_flags: vk::MemoryPropertyFlags,
    pub allocate_flags: AllocationFlags,
    pub dedicated_hint: bool,
    pub lifetime_class: LifetimeClass,
    pub resource_class: ResourceClass,
}

pub struct Allocation {
    pub memory: vk::DeviceMemory,
    pub offset: u64,
    pub size: u64,
    pub pool_key: Option<String>,
    pub dedicated: bool,
    pub resource_class: ResourceClass,
    pub lifetime_class: LifetimeClass,
    // Kept so `free` can hand the allocation back to `gpu-allocator` without
    // re-deriving its internal bookkeeping from the raw handle/offset.
    inner: gpu_alloc::Allocation,
}

#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error("allocator exhausted: {0}")]
    Exhausted(ErrorContext),
    #[error("allocator failed: {0}")]
    Other(ErrorContext),
}

/// The contract `rg-graph`'s transient-resource planner depends on.
/// `allocate_buffer`/`allocate_image` take already-queried memory
/// requirements (the caller created the un-bound `VkBuffer`/`VkImage`
/// first) so this trait never needs to know about resource creation
/// itself, only memory.
pub trait GpuAllocator: Send + Sync {
    fn allocate_buffer(&self, desc: AllocationDesc) -> Result<Allocation, AllocatorError>;
    fn allocate_image(&self, desc: AllocationDesc) -> Result<Allocation, AllocatorError>;
    fn free(&self, allocation: Allocation);
}

/// Default implementation over `gpu-allocator`'s Vulkan sub-allocator.
pub struct Allocator {
    inner: Mutex<gpu_alloc::Allocator>,
}

impl Allocator {
    pub fn new(inner: gpu_alloc::Allocator) -> Self {
        Self { inner: Mutex::new(inner) }
    }

    fn allocate(&self, desc: AllocationDesc, name: &str) -> Result<Allocation, AllocatorError> {
        let location = if desc.allocate_flags.host_visible {
            gpu_allocator::MemoryLocation::CpuToGpu
        } else {
            gpu_allocator::MemoryLocation::GpuOnly
        };

        let create_desc = gpu_alloc::AllocationCreateDesc {
            name,
            requirements: desc.requirements,
            location,
            linear: matches!(desc.resource_class, ResourceClass::Buffer),
            allocation_scheme: if desc.dedicated_hint {
                gpu_alloc::AllocationScheme::DedicatedBuffer(vk::Buffer::null())
            } else {
                gpu_alloc::AllocationScheme::GpuAllocatorManaged
            },
        };

        let mut inner = self.inner.lock();
        let allocation = inner.allocate(&create_desc).map_err(|err| {
            let ctx = ErrorContext::new("allocate", Subsystem::Allocator).with_object_hint(name);
            match err {
                gpu_allocator::AllocationError::OutOfMemory => AllocatorError::Exhausted(ctx),
                other => AllocatorError::Other(ctx.with_object_hint(format!("{name}: {other}"))),
            }
        })?;

        Ok(Allocation {
            memory: unsafe { allocation.memory() },
            offset: allocation.offset(),
            size: allocation.size(),
            pool_key: None,
            dedicated: desc.dedicated_hint,
            resource_class: desc.resource_class,
            lifetime_class: desc.lifetime_class,
            inner: allocation,
        })
    }
}

impl GpuAllocator for Allocator {
    fn allocate_buffer(&self, desc: AllocationDesc) -> Result<Allocation, AllocatorError> {
        self.allocate(desc, "rg_buffer")
    }

    fn allocate_image(&self, desc: AllocationDesc) -> Result<Allocation, AllocatorError> {
        self.allocate(desc, "rg_image")
    }

    fn free(&self, allocation: Allocation) {
        let mut inner = self.inner.lock();
        if let Err(err) = inner.free(allocation.inner) {
            log::warn!("failed to free allocation: {err}");
        }
    }
}
