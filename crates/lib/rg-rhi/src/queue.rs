//! Thin guarded submission interface. Serializes concurrent submits to
//! the same queue with a mutex, matching the concurrency model's "queue
//! submits take a per-queue mutex; present is serialized with that
//! queue's submits".

use ash::vk;
use parking_lot::Mutex;

use crate::device::QueueClass;
use crate::error::DeviceError;

/// A single Vulkan queue plus the family it was vended from, guarded by a
/// mutex so two threads never call `vkQueueSubmit`/`vkQueuePresentKHR` on
/// the same `VkQueue` concurrently (the Vulkan spec requires external
/// synchronization on queues).
pub struct Queue {
    device: ash::Device,
    swapchain_loader: Option<ash::extensions::khr::Swapchain>,
    class: QueueClass,
    family_index: u32,
    raw: Mutex<vk::Queue>,
}

impl Queue {
    pub fn new(
        device: ash::Device,
        swapchain_loader: Option<ash::extensions::khr::Swapchain>,
        class: QueueClass,
        family_index: u32,
        raw: vk::Queue,
    ) -> Self {
        Self {
            device,
            swapchain_loader,
            class,
            family_index,
            raw: Mutex::new(raw),
        }
    }

    pub fn class(&self) -> QueueClass {
        self.class
    }

    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    pub fn submit(&self, infos: &[vk::SubmitInfo], fence: vk::Fence) -> Result<(), DeviceError> {
        let raw = self.raw.lock();
        unsafe {
            self.device
                .queue_submit(*raw, infos, fence)
                .map_err(|e| DeviceError::vulkan("queue_submit", e))
        }
    }

    pub fn submit2(&self, infos: &[vk::SubmitInfo2], fence: vk::Fence) -> Result<(), DeviceError> {
        let raw = self.raw.lock();
        unsafe {
            self.device
                .queue_submit2(*raw, infos, fence)
                .map_err(|e| DeviceError::vulkan("queue_submit2", e))
        }
    }

    /// Returns `Ok(true)` for `VK_SUBOPTIMAL_KHR`, matching §4.2's "not
    /// treated as an error" rule. `VK_ERROR_OUT_OF_DATE_KHR` is folded
    /// into the same `Ok` channel by the caller (`SubmissionScheduler`),
    /// not here, since only the caller knows the frame index to attach.
    pub fn present(&self, info: &vk::PresentInfoKHR) -> Result<bool, DeviceError> {
        let loader = self
            .swapchain_loader
            .as_ref()
            .expect("present() called on a queue with no swapchain loader attached");
        let raw = self.raw.lock();
        unsafe {
            loader
                .queue_present(*raw, info)
                .map_err(|e| DeviceError::vulkan("queue_present", e))
        }
    }

    pub fn wait_idle(&self) -> Result<(), DeviceError> {
        let raw = self.raw.lock();
        unsafe {
            self.device
                .queue_wait_idle(*raw)
                .map_err(|e| DeviceError::vulkan("queue_wait_idle", e))
        }
    }
}
