//! Backing-memory nursery for transient resources: creates and binds the
//! real `VkBuffer`/`VkImage` behind each alias slot the compiler planned
//! (see [`crate::compile::plan_transients`]), reusing a slot's backing
//! across frames as long as its planned shape hasn't grown past what's
//! already bound.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use rg_rhi::allocator::{AllocationDesc, AllocationFlags, GpuAllocator, LifetimeClass, ResourceClass};
use rg_rhi::deletion::{self, DeferredHandle, DeviceGeneration, HandlePolicy, InvariantViolationPolicy};
use rg_rhi::device::DeviceId;

use crate::compile::{AliasAllocation, CompiledGraph};
use crate::error::GraphError;
use crate::resource::{ImageShape, ResourceId};

/// A transient resource's resolved backing, handed to the pass-barrier
/// resolver in place of the concrete handle a non-transient resource
/// would already carry.
#[derive(Clone, Copy)]
pub enum BackingHandle {
    Buffer(vk::Buffer),
    Image(vk::Image),
}

/// A reasonable default usage mask for transient buffers: the resource
/// declaration (§3's `BufferShape::Transient`) carries only size and
/// alignment, not intended usage, so the nursery creates every transient
/// buffer wide enough to serve as a storage, uniform, vertex, index or
/// transfer source/destination buffer.
fn transient_buffer_usage() -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::STORAGE_BUFFER
        | vk::BufferUsageFlags::UNIFORM_BUFFER
        | vk::BufferUsageFlags::VERTEX_BUFFER
        | vk::BufferUsageFlags::INDEX_BUFFER
        | vk::BufferUsageFlags::TRANSFER_SRC
        | vk::BufferUsageFlags::TRANSFER_DST
}

struct SlotBacking {
    buffer: Option<DeferredHandle<vk::Buffer>>,
    image: Option<DeferredHandle<vk::Image>>,
    bound_size: vk::DeviceSize,
    bound_extent: vk::Extent3D,
}

impl SlotBacking {
    fn empty() -> Self {
        Self {
            buffer: None,
            image: None,
            bound_size: 0,
            bound_extent: vk::Extent3D::default(),
        }
    }
}

pub struct TransientResourceNursery {
    device: ash::Device,
    device_id: DeviceId,
    generation: DeviceGeneration,
    allocator: Arc<dyn GpuAllocator>,
    slots: HashMap<usize, SlotBacking>,
}

impl TransientResourceNursery {
    pub fn new(device: ash::Device, device_id: DeviceId, generation: DeviceGeneration, allocator: Arc<dyn GpuAllocator>) -> Self {
        Self {
            device,
            device_id,
            generation,
            allocator,
            slots: HashMap::new(),
        }
    }

    /// Ensures every alias slot from this frame's compiled schedule has a
    /// big-enough backing resource, then returns the resolved handle for
    /// every transient [`ResourceId`] that maps into one.
    pub fn prepare(&mut self, compiled: &CompiledGraph) -> Result<HashMap<ResourceId, BackingHandle>, GraphError> {
        let mut resolved = HashMap::new();

        for (slot_index, slot) in compiled.alias_allocations.iter().enumerate() {
            let handle = if slot.is_image {
                self.ensure_image_slot(slot_index, slot)?
            } else {
                self.ensure_buffer_slot(slot_index, slot)?
            };
            for &resource in &slot.resources {
                resolved.insert(resource, handle);
            }
        }

        Ok(resolved)
    }

    fn ensure_buffer_slot(&mut self, slot_index: usize, slot: &AliasAllocation) -> Result<BackingHandle, GraphError> {
        let size = slot.buffer_size.unwrap_or(0).max(1);
        let backing = self.slots.entry(slot_index).or_insert_with(SlotBacking::empty);

        if let Some(existing) = &backing.buffer {
            if backing.bound_size >= size {
                return Ok(BackingHandle::Buffer(*existing.get()));
            }
        }

        let create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(transient_buffer_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .build();

        let buffer = unsafe {
            self.device
                .create_buffer(&create_info, None)
                .map_err(|_| rg_rhi::allocator::AllocatorError::Other(rg_core::error::ErrorContext::new(
                    "create_buffer",
                    rg_core::error::Subsystem::Allocator,
                )))?
        };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = self.allocator.allocate_buffer(AllocationDesc {
            requirements,
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            allocate_flags: AllocationFlags::default(),
            dedicated_hint: false,
            lifetime_class: LifetimeClass::Transient,
            resource_class: ResourceClass::Buffer,
        })?;

        unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory, allocation.offset)
                .map_err(|_| rg_rhi::allocator::AllocatorError::Other(rg_core::error::ErrorContext::new(
                    "bind_buffer_memory",
                    rg_core::error::Subsystem::Allocator,
                )))?;
        }

        let device_for_destroy = self.device.clone();
        let allocator_for_destroy = self.allocator.clone();
        let deferred = deletion::make_deferred_handle(
            self.device_id,
            self.generation,
            buffer,
            move |buffer| {
                unsafe {
                    device_for_destroy.destroy_buffer(buffer, None);
                }
                allocator_for_destroy.free(allocation);
            },
            HandlePolicy::DeferredBestEffort,
            InvariantViolationPolicy::ReportAndLeakSafely,
        );

        backing.buffer = Some(deferred);
        backing.bound_size = size;
        Ok(BackingHandle::Buffer(buffer))
    }

    fn ensure_image_slot(&mut self, slot_index: usize, slot: &AliasAllocation) -> Result<BackingHandle, GraphError> {
        let shape = match slot.shape {
            Some(ImageShape::Transient {
                extent,
                format,
                usage,
                image_type,
                mip_levels,
                array_layers,
                samples,
            }) => (extent, format, usage, image_type, mip_levels, array_layers, samples),
            _ => {
                return Err(GraphError::Allocation(rg_rhi::allocator::AllocatorError::Other(
                    rg_core::error::ErrorContext::new("ensure_image_slot", rg_core::error::Subsystem::Allocator)
                        .with_object_hint("alias slot has no transient image shape"),
                )))
            }
        };
        let (extent, format, usage, image_type, mip_levels, array_layers, samples) = shape;

        let backing = self.slots.entry(slot_index).or_insert_with(SlotBacking::empty);

        let fits = backing.bound_extent.width >= extent.width && backing.bound_extent.height >= extent.height && backing.bound_extent.depth >= extent.depth;

        if let Some(existing) = &backing.image {
            if fits {
                return Ok(BackingHandle::Image(*existing.get()));
            }
        }

        let create_info = vk::ImageCreateInfo::builder()
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(mip_levels)
            .array_layers(array_layers)
            .samples(samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .build();

        let image = unsafe {
            self.device
                .create_image(&create_info, None)
                .map_err(|_| rg_rhi::allocator::AllocatorError::Other(rg_core::error::ErrorContext::new(
                    "create_image",
                    rg_core::error::Subsystem::Allocator,
                )))?
        };

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = self.allocator.allocate_image(AllocationDesc {
            requirements,
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            allocate_flags: AllocationFlags::default(),
            dedicated_hint: false,
            lifetime_class: LifetimeClass::Transient,
            resource_class: ResourceClass::Image,
        })?;

        unsafe {
            self.device
                .bind_image_memory(image, allocation.memory, allocation.offset)
                .map_err(|_| rg_rhi::allocator::AllocatorError::Other(rg_core::error::ErrorContext::new(
                    "bind_image_memory",
                    rg_core::error::Subsystem::Allocator,
                )))?;
        }

        let device_for_destroy = self.device.clone();
        let allocator_for_destroy = self.allocator.clone();
        let deferred = deletion::make_deferred_handle(
            self.device_id,
            self.generation,
            image,
            move |image| {
                unsafe {
                    device_for_destroy.destroy_image(image, None);
                }
                allocator_for_destroy.free(allocation);
            },
            HandlePolicy::DeferredBestEffort,
            InvariantViolationPolicy::ReportAndLeakSafely,
        );

        backing.image = Some(deferred);
        backing.bound_extent = extent;
        Ok(BackingHandle::Image(image))
    }
}
