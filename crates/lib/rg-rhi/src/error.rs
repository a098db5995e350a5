//! Component-specific error enums. Each variant embeds an
//! [`rg_core::error::ErrorContext`] so callers get operation name,
//! subsystem, object hint, frame index, retryability and source location
//! regardless of which component raised it; application code composes
//! these with `anyhow`.

use rg_core::error::ErrorContext;
use thiserror::Error;

pub use crate::allocator::AllocatorError;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device lost: {0}")]
    DeviceLost(ErrorContext),
    #[error("vulkan call failed: {0}: {source}")]
    Vulkan {
        context: ErrorContext,
        #[source]
        source: ash::vk::Result,
    },
}

impl DeviceError {
    #[track_caller]
    pub fn vulkan(operation: &'static str, source: ash::vk::Result) -> Self {
        DeviceError::Vulkan {
            context: ErrorContext::new(operation, rg_core::error::Subsystem::Device),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("validation failure: {0}")]
    Validation(ErrorContext),
    #[error("device lost: {0}")]
    DeviceLost(ErrorContext),
    #[error("allocation failure: {0}")]
    Allocation(#[from] AllocatorError),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("validation failure: {0}")]
    Validation(ErrorContext),
    #[error("device lost: {0}")]
    DeviceLost(ErrorContext),
    #[error("vulkan call failed: {0}")]
    Vulkan(ErrorContext),
}

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("validation failure: {0}")]
    Validation(ErrorContext),
    #[error("frame not ready: {0}")]
    NotReady(ErrorContext),
    #[error("vulkan call failed: {0}")]
    Vulkan(ErrorContext),
}

#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("deletion task failed: {0}")]
    TaskFailed(ErrorContext),
    #[error("invariant violated: {0}")]
    InvariantViolation(ErrorContext),
}
