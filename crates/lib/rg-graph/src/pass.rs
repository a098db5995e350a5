//! One unit of GPU work: a queue class, the resources it touches, a
//! recording callback, and the opaque envelope the scheduler turns into
//! a submission.

use ash::vk;
use rg_rhi::{BarrierBatch, ExternalSemaphoreOp, QueueClass};

use crate::resource::ResourceUsage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassId(pub usize);

/// Recording callback. Receives the command buffer it should record
/// into and the already-resolved (raw-handle) incoming/outgoing barrier
/// batches the graph computed for this pass; the callback records
/// `incoming`, its own work, then `outgoing` — the graph never records
/// on the caller's behalf.
pub type RecordCallback = Box<dyn Fn(vk::CommandBuffer, &BarrierBatch, &BarrierBatch) -> anyhow::Result<()> + Send + Sync>;

/// What the scheduler actually submits for one pass: command buffers
/// plus any externally-supplied wait/signal semaphores and fence.
#[derive(Default)]
pub struct JobEnvelope {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub external_waits: Vec<ExternalSemaphoreOp>,
    pub external_signals: Vec<ExternalSemaphoreOp>,
    pub fence: Option<vk::Fence>,
    pub debug_label: Option<String>,
}

pub struct PassNode {
    pub queue_class: QueueClass,
    pub usages: Vec<ResourceUsage>,
    pub record: RecordCallback,
    pub envelope: JobEnvelope,
}

impl PassNode {
    pub fn new(queue_class: QueueClass, usages: Vec<ResourceUsage>, record: RecordCallback) -> Self {
        Self {
            queue_class,
            usages,
            record,
            envelope: JobEnvelope::default(),
        }
    }

    pub fn with_envelope(mut self, envelope: JobEnvelope) -> Self {
        self.envelope = envelope;
        self
    }
}

/// A final presentation step, keyed by the swapchain image index it
/// targets.
pub struct PresentRequest {
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
    pub wait_stage: vk::PipelineStageFlags2,
}
