//! The hardware interface layer: device/queue capability description,
//! GPU memory allocation, Synchronization2 barriers (with legacy
//! fallback), the frame timing authority, the per-(worker,frame) command
//! arena, and the deferred deletion service. `rg-graph` builds the
//! render task graph and submission scheduler on top of this crate; this
//! crate itself knows nothing about passes or resource graphs.

pub mod allocator;
pub mod arena;
pub mod barrier;
pub mod deletion;
pub mod device;
pub mod error;
pub mod queue;
pub mod sync;

pub use allocator::{Allocation, AllocationDesc, AllocationFlags, Allocator, GpuAllocator, LifetimeClass, ResourceClass};
pub use arena::{BorrowedCommandBuffer, CommandArena, CommandBufferKind, CommandRecorder, FrameLifecycle, FrameToken, ReadinessSource, ValidateReason};
pub use barrier::{BarrierBatch, BufferMemoryBarrier2, ImageMemoryBarrier2, MemoryBarrier2};
pub use device::{Device, DeviceFeatures, DeviceId, QueueClass, QueueFamilyProfile};
pub use queue::Queue;
pub use sync::{ExternalSemaphoreOp, FenceWaitPolicy, FrameSyncContext, SubmitBackend, SyncDependencyClass, SyncSubmitInfo, SyncTicket};
