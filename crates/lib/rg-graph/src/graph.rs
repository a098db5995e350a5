//! The render task graph itself: accumulates resources and passes for
//! one frame, compiles them into a schedule, records every pass in
//! parallel (one worker pool shared across a schedule level), and
//! drives the submission scheduler through to present.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex};

use ash::vk;
use rg_core::thread_pool::ThreadPool;
use rg_rhi::arena::CommandArena;
use rg_rhi::barrier as raw_barrier;
use rg_rhi::sync::FrameSyncContext;

use crate::compile::{self, CompiledGraph};
use crate::error::GraphError;
use crate::pass::{PassId, PassNode, PresentRequest};
use crate::resource::{BufferShape, ImageShape, ResourceDescriptor, ResourceId, ResourceKind};
use crate::scheduler::{DependencyEdge, JobId, JobRequest, QueueSet, SubmissionScheduler};
use crate::transient::{BackingHandle, TransientResourceNursery};

/// Everything `execute` needs beyond the graph's own accumulated
/// resources/passes: the collaborators the scheduler and recorder drive.
pub struct ExecuteContext<'a> {
    pub device: &'a ash::Device,
    pub arena: &'a CommandArena,
    pub worker_pool: &'a ThreadPool,
    pub scheduler: &'a mut SubmissionScheduler,
    pub nursery: &'a mut TransientResourceNursery,
    pub sync_context: &'a FrameSyncContext,
    pub frame_index: u32,
    pub synchronization2: bool,
}

/// Accumulates one frame's worth of passes and resources before
/// compiling and executing them. Cleared once [`RenderTaskGraph::execute`]
/// has finished submitting, so the same instance is reused frame over
/// frame.
#[derive(Default)]
pub struct RenderTaskGraph {
    resources: Vec<ResourceDescriptor>,
    passes: Vec<PassNode>,
    present_request: Option<PresentRequest>,
}

impl RenderTaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_resource(&mut self, descriptor: ResourceDescriptor) -> ResourceId {
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(descriptor);
        id
    }

    pub fn create_buffer_resource(&mut self, handle: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, queue_family: u32) -> ResourceId {
        self.create_resource(ResourceDescriptor::buffer(handle, offset, size, queue_family))
    }

    pub fn create_image_resource(
        &mut self,
        handle: vk::Image,
        subresource_range: vk::ImageSubresourceRange,
        initial_layout: vk::ImageLayout,
        queue_family: u32,
    ) -> ResourceId {
        self.create_resource(ResourceDescriptor::image(handle, subresource_range, initial_layout, queue_family))
    }

    pub fn create_transient_buffer_resource(&mut self, size: vk::DeviceSize, alignment: vk::DeviceSize, alias_class: crate::resource::AliasClass) -> ResourceId {
        self.create_resource(ResourceDescriptor::transient_buffer(size, alignment, alias_class))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_transient_image_resource(
        &mut self,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        image_type: vk::ImageType,
        mip_levels: u32,
        array_layers: u32,
        samples: vk::SampleCountFlags,
        alias_class: crate::resource::AliasClass,
    ) -> ResourceId {
        self.create_resource(ResourceDescriptor::transient_image(
            extent,
            format,
            usage,
            image_type,
            mip_levels,
            array_layers,
            samples,
            alias_class,
        ))
    }

    pub fn add_pass(&mut self, pass: PassNode) -> PassId {
        let id = PassId(self.passes.len());
        self.passes.push(pass);
        id
    }

    pub fn set_present(&mut self, request: PresentRequest) {
        self.present_request = Some(request);
    }

    /// Compiles the accumulated passes, resolves transient resource
    /// backings, records every pass's command buffer, enqueues the
    /// resulting jobs with the submission scheduler in topological
    /// order, and submits against `queues`. Clears the graph's
    /// accumulated state on return (success or failure) so the caller
    /// can start declaring the next frame immediately.
    pub fn execute(&mut self, ctx: &mut ExecuteContext, queues: &QueueSet) -> Result<crate::scheduler::FrameExecutionResult, GraphError> {
        let result = self.execute_inner(ctx, queues);
        self.resources.clear();
        self.passes.clear();
        self.present_request = None;
        result
    }

    fn execute_inner(&mut self, ctx: &mut ExecuteContext, queues: &QueueSet) -> Result<crate::scheduler::FrameExecutionResult, GraphError> {
        let compiled = compile::compile(&self.passes, &self.resources)?;
        let backings = ctx.nursery.prepare(&compiled)?;

        let command_buffers = self.record_all(ctx, &compiled, &backings)?;

        ctx.scheduler.begin_frame(ctx.sync_context);

        let mut job_ids: Vec<Option<JobId>> = vec![None; self.passes.len()];
        for &pass_id in &compiled.topological_order {
            let pass = &self.passes[pass_id.0];
            let cb = command_buffers[pass_id.0].expect("every topologically-ordered pass was recorded");

            let mut request = JobRequest::new(pass.queue_class, vec![cb]);
            for signal in &pass.envelope.external_signals {
                if let Some(stage) = signal.stage {
                    request = request.with_signal(signal.semaphore, stage);
                }
            }
            for wait in &pass.envelope.external_waits {
                if let Some(stage) = wait.stage {
                    request = request.with_wait(wait.semaphore, stage);
                }
            }
            if let Some(fence) = pass.envelope.fence {
                request = request.with_fence(fence);
            }
            if let Some(label) = &pass.envelope.debug_label {
                request = request.with_debug_label(label.clone());
            }

            let job_id = ctx.scheduler.enqueue_job(request)?;
            job_ids[pass_id.0] = Some(job_id);
        }

        let edges: Vec<DependencyEdge> = compiled
            .edges
            .iter()
            .filter_map(|&(from, to)| match (job_ids[from.0], job_ids[to.0]) {
                (Some(producer), Some(consumer)) => Some(DependencyEdge {
                    producer,
                    consumer,
                    semaphore: None,
                    consumer_wait_stage: vk::PipelineStageFlags2::ALL_COMMANDS,
                }),
                _ => None,
            })
            .collect();
        for edge in edges {
            ctx.scheduler.enqueue_dependency(edge.producer, edge.consumer, edge.semaphore, edge.consumer_wait_stage);
        }

        if let Some(request) = self.present_request.take() {
            ctx.scheduler.enqueue_present(request);
        }

        Ok(ctx.scheduler.execute_frame(queues, ctx.sync_context, ctx.frame_index)?)
    }

    /// Records every pass's command buffer, one schedule level at a
    /// time, with each level further chunked to the arena's worker count
    /// so no two concurrently running jobs are ever assigned the same
    /// arena slot — the arena only synchronizes `acquire()` itself, not
    /// the barrier/record/`end_borrowed` sequence a job performs with its
    /// borrowed command buffer, so two jobs sharing a slot would record
    /// into the same unsynchronized command pool at once.
    /// `passes`/`resources` are moved into `Arc`s for the duration so the
    /// pool's closures can satisfy their `'static` bound without
    /// unsafely extending a borrow of `self`; both are handed back
    /// before returning. A record failure in one pass is captured and
    /// the first one encountered is surfaced once its level finishes;
    /// later levels are skipped.
    fn record_all(
        &mut self,
        ctx: &ExecuteContext,
        compiled: &CompiledGraph,
        backings: &HashMap<ResourceId, BackingHandle>,
    ) -> Result<Vec<Option<vk::CommandBuffer>>, GraphError> {
        let pass_count = self.passes.len();
        let passes = Arc::new(mem::take(&mut self.passes));
        let resources = Arc::new(mem::take(&mut self.resources));

        let mut recorded: Vec<Option<vk::CommandBuffer>> = vec![None; pass_count];
        let outcomes: Arc<Mutex<Vec<(PassId, anyhow::Result<vk::CommandBuffer>)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut failure: Option<GraphError> = None;
        let worker_count = ctx.arena.worker_count().max(1);

        for level in &compiled.levels {
            if failure.is_some() {
                break;
            }

            for chunk in level.chunks(worker_count) {
                let mut jobs: Vec<Box<dyn FnOnce() + Send>> = Vec::with_capacity(chunk.len());

                for (worker, &pass_id) in chunk.iter().enumerate() {
                    let passes = passes.clone();
                    let resources_arc = resources.clone();
                    let outcomes = outcomes.clone();

                    let incoming = resolve_barrier_batch(&compiled.incoming_barriers[pass_id.0], &resources_arc, backings);
                    let outgoing = resolve_barrier_batch(&compiled.outgoing_barriers[pass_id.0], &resources_arc, backings);

                    let device = ctx.device.clone();
                    let arena_addr = ctx.arena as *const CommandArena as usize;
                    let frame_index = ctx.frame_index;
                    let synchronization2 = ctx.synchronization2;

                    jobs.push(Box::new(move || {
                        // SAFETY: `record_all` blocks on `scoped_for_each`
                        // until every job in this chunk has finished before
                        // the loop moves to the next chunk or returns, so
                        // `ctx.arena` outlives every use of this pointer.
                        let arena: &CommandArena = unsafe { &*(arena_addr as *const CommandArena) };
                        let outcome = (|| -> anyhow::Result<vk::CommandBuffer> {
                            let borrowed = arena.acquire_primary(worker, frame_index, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
                            let cb = borrowed.raw;
                            if !incoming.is_empty() {
                                raw_barrier::record(&device, cb, &incoming, synchronization2);
                            }
                            (passes[pass_id.0].record)(cb, &incoming, &outgoing)?;
                            if !outgoing.is_empty() {
                                raw_barrier::record(&device, cb, &outgoing, synchronization2);
                            }
                            arena.end_borrowed(&borrowed)?;
                            Ok(cb)
                        })();
                        outcomes.lock().unwrap().push((pass_id, outcome));
                    }));
                }

                ctx.worker_pool.scoped_for_each(jobs);

                for (pass_id, outcome) in outcomes.lock().unwrap().drain(..) {
                    match outcome {
                        Ok(cb) => recorded[pass_id.0] = Some(cb),
                        Err(err) if failure.is_none() => failure = Some(GraphError::RecordFailed(pass_id, err)),
                        Err(_) => {}
                    }
                }
            }
        }

        self.passes = Arc::try_unwrap(passes).unwrap_or_else(|_| panic!("pass recording outlived its scope"));
        self.resources = Arc::try_unwrap(resources).unwrap_or_else(|_| panic!("resource table outlived its scope"));

        if let Some(err) = failure {
            return Err(err);
        }

        Ok(recorded)
    }
}

fn resolve_barrier_batch(
    batch: &compile::BarrierBatch,
    resources: &[ResourceDescriptor],
    backings: &HashMap<ResourceId, BackingHandle>,
) -> rg_rhi::BarrierBatch {
    let mut resolved = rg_rhi::BarrierBatch::default();

    for memory in &batch.memory {
        resolved.memory.push(rg_rhi::MemoryBarrier2 {
            src_stage: memory.src_stage,
            src_access: memory.src_access,
            dst_stage: memory.dst_stage,
            dst_access: memory.dst_access,
        });
    }

    for buffer in &batch.buffer {
        if let Some(handle) = resolve_buffer_handle(buffer.resource, resources, backings) {
            resolved.buffer.push(rg_rhi::BufferMemoryBarrier2 {
                src_stage: buffer.src_stage,
                src_access: buffer.src_access,
                dst_stage: buffer.dst_stage,
                dst_access: buffer.dst_access,
                src_queue_family: buffer.src_queue_family,
                dst_queue_family: buffer.dst_queue_family,
                buffer: handle,
                offset: buffer.offset,
                size: buffer.size,
            });
        }
    }

    for image in &batch.image {
        if let Some(handle) = resolve_image_handle(image.resource, resources, backings) {
            resolved.image.push(rg_rhi::ImageMemoryBarrier2 {
                src_stage: image.src_stage,
                src_access: image.src_access,
                dst_stage: image.dst_stage,
                dst_access: image.dst_access,
                old_layout: image.old_layout,
                new_layout: image.new_layout,
                src_queue_family: image.src_queue_family,
                dst_queue_family: image.dst_queue_family,
                image: handle,
                subresource_range: image.subresource_range,
            });
        }
    }

    resolved
}

fn resolve_buffer_handle(resource: ResourceId, resources: &[ResourceDescriptor], backings: &HashMap<ResourceId, BackingHandle>) -> Option<vk::Buffer> {
    match &resources[resource.0 as usize].kind {
        ResourceKind::Buffer(BufferShape::Concrete { handle, .. }) => Some(*handle),
        ResourceKind::Buffer(BufferShape::Transient { .. }) => match backings.get(&resource) {
            Some(BackingHandle::Buffer(handle)) => Some(*handle),
            _ => None,
        },
        _ => None,
    }
}

fn resolve_image_handle(resource: ResourceId, resources: &[ResourceDescriptor], backings: &HashMap<ResourceId, BackingHandle>) -> Option<vk::Image> {
    match &resources[resource.0 as usize].kind {
        ResourceKind::Image(ImageShape::Concrete { handle, .. }) => Some(*handle),
        ResourceKind::Image(ImageShape::Transient { .. }) => match backings.get(&resource) {
            Some(BackingHandle::Image(handle)) => Some(*handle),
            _ => None,
        },
        _ => None,
    }
}
