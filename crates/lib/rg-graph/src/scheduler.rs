//! Orders compiled passes into per-queue submit batches, materializes
//! cross-queue dependencies as timeline waits or auto-allocated binary
//! semaphores, and drives the final present. Stateless between frames
//! except for the auto-semaphore pool, which outlives any single frame
//! until its retiring submission completes.

use std::collections::HashMap;

use ash::vk;
use rg_core::error::{ErrorContext, Subsystem};
use rg_rhi::error::{DeviceError, SchedulerError};
use rg_rhi::{Device, ExternalSemaphoreOp, FrameSyncContext, Queue, QueueClass, SyncDependencyClass, SyncSubmitInfo, SyncTicket};

use crate::pass::PresentRequest;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub usize);

/// One pass's worth of GPU work as the scheduler sees it: already
/// recorded command buffers plus the externally-supplied wait/signal
/// semaphores the caller wants attached (the graph's own cross-pass
/// dependencies are supplied separately, through [`DependencyEdge`]).
pub struct JobRequest {
    pub queue_class: QueueClass,
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub wait_semaphores: Vec<vk::Semaphore>,
    pub wait_stages: Vec<vk::PipelineStageFlags2>,
    pub signal_semaphores: Vec<vk::Semaphore>,
    pub signal_stages: Vec<vk::PipelineStageFlags2>,
    pub fence: Option<vk::Fence>,
    pub debug_label: Option<String>,
}

impl JobRequest {
    pub fn new(queue_class: QueueClass, command_buffers: Vec<vk::CommandBuffer>) -> Self {
        Self {
            queue_class,
            command_buffers,
            wait_semaphores: Vec::new(),
            wait_stages: Vec::new(),
            signal_semaphores: Vec::new(),
            signal_stages: Vec::new(),
            fence: None,
            debug_label: None,
        }
    }

    pub fn with_wait(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2) -> Self {
        self.wait_semaphores.push(semaphore);
        self.wait_stages.push(stage);
        self
    }

    pub fn with_signal(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2) -> Self {
        self.signal_semaphores.push(semaphore);
        self.signal_stages.push(stage);
        self
    }

    pub fn with_fence(mut self, fence: vk::Fence) -> Self {
        self.fence = Some(fence);
        self
    }

    pub fn with_debug_label(mut self, label: impl Into<String>) -> Self {
        self.debug_label = Some(label.into());
        self
    }
}

/// An edge between two enqueued jobs. `semaphore` lets a caller pin the
/// exact binary semaphore to use in fallback mode; `None` leaves the
/// choice (and, in fallback mode, the allocation) to the scheduler.
#[derive(Clone, Copy)]
pub struct DependencyEdge {
    pub producer: JobId,
    pub consumer: JobId,
    pub semaphore: Option<vk::Semaphore>,
    pub consumer_wait_stage: vk::PipelineStageFlags2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Everything the scheduler learned while executing one frame, per
/// spec §4.2.
#[derive(Clone, Copy, Debug)]
pub struct FrameExecutionResult {
    pub present_result: Option<PresentOutcome>,
    pub submitted_job_count: usize,
    pub submit_batch_count: usize,
    pub auto_semaphore_count: usize,
    pub used_timeline: bool,
    pub used_compute_to_graphics_fallback: bool,
    pub compute_queue_exists: bool,
    pub compute_queue_dedicated: bool,
}

/// Device-level queue selection policy (spec §4.2 "Queue selection
/// policy").
#[derive(Clone, Copy, Debug)]
pub struct SchedulerPolicy {
    pub require_dedicated_compute_queue: bool,
    pub allow_compute_on_graphics_fallback: bool,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            require_dedicated_compute_queue: false,
            allow_compute_on_graphics_fallback: true,
        }
    }
}

/// The physical queues available this frame. `compute` is `None` on
/// devices with no dedicated compute family; the scheduler falls back
/// to `graphics` for compute-class jobs per [`SchedulerPolicy`].
pub struct QueueSet<'a> {
    pub graphics: &'a Queue,
    pub transfer: &'a Queue,
    pub compute: Option<&'a Queue>,
    pub present: &'a Queue,
}

impl<'a> QueueSet<'a> {
    fn dedicated_compute(&self) -> bool {
        self.compute.map(|q| q.family_index() != self.graphics.family_index()).unwrap_or(false)
    }
}

fn graphics_only_stages() -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::DRAW_INDIRECT
        | vk::PipelineStageFlags2::VERTEX_INPUT
        | vk::PipelineStageFlags2::VERTEX_SHADER
        | vk::PipelineStageFlags2::TESSELLATION_CONTROL_SHADER
        | vk::PipelineStageFlags2::TESSELLATION_EVALUATION_SHADER
        | vk::PipelineStageFlags2::GEOMETRY_SHADER
        | vk::PipelineStageFlags2::FRAGMENT_SHADER
        | vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
        | vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags2::ALL_GRAPHICS
}

fn transfer_queue_allowed_stages() -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::TOP_OF_PIPE
        | vk::PipelineStageFlags2::BOTTOM_OF_PIPE
        | vk::PipelineStageFlags2::ALL_COMMANDS
        | vk::PipelineStageFlags2::HOST
        | vk::PipelineStageFlags2::TRANSFER
}

fn stage_compatible_with_queue_class(stage: vk::PipelineStageFlags2, class: QueueClass) -> bool {
    match class {
        QueueClass::Graphics => true,
        QueueClass::Compute => (stage & graphics_only_stages()).is_empty(),
        QueueClass::Transfer => transfer_queue_allowed_stages().contains(stage),
    }
}

struct JobRuntime {
    requested_class: QueueClass,
    effective_class: QueueClass,
    request: JobRequest,
    extra_waits: Vec<ExternalSemaphoreOp>,
    extra_signals: Vec<ExternalSemaphoreOp>,
    wait_tickets: Vec<SyncTicket>,
    ticket: Option<SyncTicket>,
}

struct PendingAutoSemaphore {
    semaphore: vk::Semaphore,
    retire_ticket: SyncTicket,
}

/// Stateless between frames: `jobs`/`dependencies`/`present_request`
/// reset on every `begin_frame`. The auto-semaphore pool is the one
/// piece of state that must survive across frames, since a semaphore
/// can only be freed once the submission it gates has completed.
pub struct SubmissionScheduler {
    device: ash::Device,
    policy: SchedulerPolicy,
    frame_ordinal: u64,
    jobs: Vec<JobRuntime>,
    dependencies: Vec<DependencyEdge>,
    present_request: Option<PresentRequest>,
    pending_auto_semaphores: Vec<PendingAutoSemaphore>,
    /// Fallback-mode semaphores allocated this frame, awaiting the
    /// consumer's ticket once it actually submits.
    fallback_semaphore_consumers: Vec<(vk::Semaphore, JobId)>,
}

impl SubmissionScheduler {
    pub fn new(device: &Device, policy: SchedulerPolicy) -> Self {
        Self {
            device: device.raw.clone(),
            policy,
            frame_ordinal: 0,
            jobs: Vec::new(),
            dependencies: Vec::new(),
            present_request: None,
            pending_auto_semaphores: Vec::new(),
            fallback_semaphore_consumers: Vec::new(),
        }
    }

    /// Clears per-frame state and reclaims every auto-semaphore whose
    /// retiring submission has completed (spec §4.2 "Auto-semaphore
    /// reclaim"). Reclaim is driven off the sync context's ticket
    /// completion query rather than a raw fence handle, so it works
    /// identically in timeline and fallback mode.
    pub fn begin_frame(&mut self, sync_context: &FrameSyncContext) {
        self.frame_ordinal += 1;
        self.jobs.clear();
        self.dependencies.clear();
        self.present_request = None;
        self.fallback_semaphore_consumers.clear();

        self.pending_auto_semaphores.retain(|pending| {
            let complete = sync_context.is_ticket_complete(&self.device, pending.retire_ticket).unwrap_or(false);
            if complete {
                unsafe {
                    self.device.destroy_semaphore(pending.semaphore, None);
                }
            }
            !complete
        });
    }

    pub fn enqueue_job(&mut self, request: JobRequest) -> Result<JobId, SchedulerError> {
        if request.command_buffers.is_empty() {
            return Err(SchedulerError::Validation(
                ErrorContext::new("enqueue_job", Subsystem::Scheduler).with_object_hint("job has no command buffers"),
            ));
        }
        if request.wait_semaphores.len() != request.wait_stages.len() {
            return Err(SchedulerError::Validation(
                ErrorContext::new("enqueue_job", Subsystem::Scheduler).with_object_hint("wait_semaphores/wait_stages length mismatch"),
            ));
        }
        if request.signal_semaphores.len() != request.signal_stages.len() {
            return Err(SchedulerError::Validation(
                ErrorContext::new("enqueue_job", Subsystem::Scheduler).with_object_hint("signal_semaphores/signal_stages length mismatch"),
            ));
        }
        for stage in &request.wait_stages {
            if stage.is_empty() {
                return Err(SchedulerError::Validation(
                    ErrorContext::new("enqueue_job", Subsystem::Scheduler).with_object_hint("zero wait stage"),
                ));
            }
            if !stage_compatible_with_queue_class(*stage, request.queue_class) {
                return Err(SchedulerError::Validation(
                    ErrorContext::new("enqueue_job", Subsystem::Scheduler)
                        .with_object_hint(format!("wait stage incompatible with {} queue", request.queue_class)),
                ));
            }
        }

        let job_id = JobId(self.jobs.len());
        let requested_class = request.queue_class;
        self.jobs.push(JobRuntime {
            requested_class,
            effective_class: requested_class,
            request,
            extra_waits: Vec::new(),
            extra_signals: Vec::new(),
            wait_tickets: Vec::new(),
            ticket: None,
        });
        Ok(job_id)
    }

    pub fn enqueue_dependency(&mut self, producer: JobId, consumer: JobId, semaphore: Option<vk::Semaphore>, consumer_wait_stage: vk::PipelineStageFlags2) {
        self.dependencies.push(DependencyEdge {
            producer,
            consumer,
            semaphore,
            consumer_wait_stage,
        });
    }

    pub fn enqueue_present(&mut self, request: PresentRequest) {
        self.present_request = Some(request);
    }

    /// Orders enqueued jobs, resolves cross-queue dependencies, submits
    /// in same-queue fence-free batches, and issues the present.
    pub fn execute_frame(&mut self, queues: &QueueSet, sync_context: &FrameSyncContext, frame_index: u32) -> Result<FrameExecutionResult, SchedulerError> {
        let compute_queue_exists = queues.compute.is_some();
        let compute_queue_dedicated = queues.dedicated_compute();
        let mut used_compute_to_graphics_fallback = false;

        for job in &mut self.jobs {
            if job.requested_class == QueueClass::Compute && queues.compute.is_none() {
                if self.policy.require_dedicated_compute_queue {
                    return Err(SchedulerError::Validation(
                        ErrorContext::new("execute_frame", Subsystem::Scheduler)
                            .with_frame_index(frame_index)
                            .with_object_hint("compute job enqueued with no dedicated compute queue"),
                    ));
                }
                if !self.policy.allow_compute_on_graphics_fallback {
                    return Err(SchedulerError::Validation(
                        ErrorContext::new("execute_frame", Subsystem::Scheduler)
                            .with_frame_index(frame_index)
                            .with_object_hint("no compute queue and graphics fallback disabled"),
                    ));
                }
                job.effective_class = QueueClass::Graphics;
                used_compute_to_graphics_fallback = true;
            }
        }

        let order = self.topological_order()?;

        if sync_context.is_timeline() {
            self.assign_timeline_dependencies(&order);
        } else {
            self.allocate_fallback_dependencies()?;
        }

        let batches = partition_batches(&order, &self.jobs);

        let mut submitted_job_count = 0usize;
        for batch in &batches {
            let queue = self.queue_for_class(queues, self.jobs[batch[0].0].effective_class);
            let explicit_fence = self.jobs[batch[0].0].request.fence;

            let infos: Vec<SyncSubmitInfo> = batch
                .iter()
                .map(|&job_id| {
                    let job = &self.jobs[job_id.0];
                    let mut external_waits: Vec<ExternalSemaphoreOp> = job
                        .request
                        .wait_semaphores
                        .iter()
                        .zip(&job.request.wait_stages)
                        .map(|(sem, stage)| ExternalSemaphoreOp {
                            semaphore: *sem,
                            stage: Some(*stage),
                            dependency_class: dependency_class_for(job.effective_class),
                        })
                        .collect();
                    external_waits.extend(job.extra_waits.iter().copied());

                    let mut external_signals: Vec<ExternalSemaphoreOp> = job
                        .request
                        .signal_semaphores
                        .iter()
                        .zip(&job.request.signal_stages)
                        .map(|(sem, stage)| ExternalSemaphoreOp {
                            semaphore: *sem,
                            stage: Some(*stage),
                            dependency_class: dependency_class_for(job.effective_class),
                        })
                        .collect();
                    external_signals.extend(job.extra_signals.iter().copied());

                    SyncSubmitInfo {
                        command_buffers: job.request.command_buffers.clone(),
                        external_waits,
                        external_signals,
                        wait_tickets: job.wait_tickets.clone(),
                        allow_all_commands_fallback: true,
                    }
                })
                .collect();

            let tickets = sync_context
                .submit_batch(&self.device, queue, frame_index, infos, explicit_fence)
                .map_err(|_| SchedulerError::DeviceLost(ErrorContext::new("execute_frame", Subsystem::Scheduler).with_frame_index(frame_index)))?;

            for (&job_id, ticket) in batch.iter().zip(tickets.into_iter()) {
                self.jobs[job_id.0].ticket = Some(ticket);
                submitted_job_count += 1;
            }
        }

        for (semaphore, consumer) in self.fallback_semaphore_consumers.drain(..) {
            if let Some(ticket) = self.jobs[consumer.0].ticket {
                self.pending_auto_semaphores.push(PendingAutoSemaphore { semaphore, retire_ticket: ticket });
            }
        }

        let present_result = match self.present_request.take() {
            Some(request) => Some(self.issue_present(queues.present, &request, frame_index)?),
            None => None,
        };

        Ok(FrameExecutionResult {
            present_result,
            submitted_job_count,
            submit_batch_count: batches.len(),
            auto_semaphore_count: self.pending_auto_semaphores.len(),
            used_timeline: sync_context.is_timeline(),
            used_compute_to_graphics_fallback,
            compute_queue_exists,
            compute_queue_dedicated,
        })
    }

    fn queue_for_class<'a>(&self, queues: &QueueSet<'a>, class: QueueClass) -> &'a Queue {
        match class {
            QueueClass::Graphics => queues.graphics,
            QueueClass::Transfer => queues.transfer,
            QueueClass::Compute => queues.compute.unwrap_or(queues.graphics),
        }
    }

    fn topological_order(&self) -> Result<Vec<JobId>, SchedulerError> {
        let count = self.jobs.len();
        let mut adjacency: Vec<Vec<JobId>> = vec![Vec::new(); count];
        let mut in_degree = vec![0u32; count];

        for edge in &self.dependencies {
            adjacency[edge.producer.0].push(edge.consumer);
            in_degree[edge.consumer.0] += 1;
        }

        let mut frontier: Vec<JobId> = (0..count).filter(|&i| in_degree[i] == 0).map(JobId).collect();
        frontier.sort_by_key(|j| j.0);

        let mut order = Vec::with_capacity(count);
        let mut remaining = in_degree;

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for job_id in frontier {
                order.push(job_id);
                for &successor in &adjacency[job_id.0] {
                    remaining[successor.0] -= 1;
                    if remaining[successor.0] == 0 {
                        next.push(successor);
                    }
                }
            }
            next.sort_by_key(|j| j.0);
            frontier = next;
        }

        if order.len() != count {
            return Err(SchedulerError::Validation(
                ErrorContext::new("execute_frame", Subsystem::Scheduler).with_object_hint("dependency_cycle_detected"),
            ));
        }

        Ok(order)
    }

    fn assign_timeline_dependencies(&mut self, order: &[JobId]) {
        let position: HashMap<JobId, usize> = order.iter().enumerate().map(|(i, &j)| (j, i)).collect();
        let mut edges = self.dependencies.clone();
        edges.sort_by_key(|edge| position[&edge.producer]);

        for edge in edges {
            if self.jobs[edge.producer.0].effective_class == self.jobs[edge.consumer.0].effective_class {
                continue;
            }
            // Producer is guaranteed to already have a ticket: batches
            // are submitted strictly in topological order and a
            // cross-queue edge can never land both endpoints in the
            // same batch.
            if let Some(ticket) = self.jobs[edge.producer.0].ticket {
                self.jobs[edge.consumer.0].wait_tickets.push(ticket);
            }
        }
    }

    /// Pre-pass over cross-queue dependencies, run before any batch is
    /// submitted: a fallback-mode producer's signal semaphore must be
    /// attached before *its own* submit call, so this cannot be
    /// resolved lazily the way timeline tickets are.
    fn allocate_fallback_dependencies(&mut self) -> Result<(), SchedulerError> {
        let edges = self.dependencies.clone();
        for edge in edges {
            if self.jobs[edge.producer.0].effective_class == self.jobs[edge.consumer.0].effective_class {
                continue;
            }

            let semaphore = match edge.semaphore {
                Some(sem) => sem,
                None => self.allocate_semaphore()?,
            };

            self.jobs[edge.producer.0].extra_signals.push(ExternalSemaphoreOp {
                semaphore,
                stage: None,
                dependency_class: dependency_class_for(self.jobs[edge.producer.0].effective_class),
            });
            self.jobs[edge.consumer.0].extra_waits.push(ExternalSemaphoreOp {
                semaphore,
                stage: Some(edge.consumer_wait_stage),
                dependency_class: dependency_class_for(self.jobs[edge.consumer.0].effective_class),
            });

            // The semaphore can only be freed once the wait that
            // consumes it has completed; its ticket isn't known until
            // the consumer actually submits, so remember the job id
            // and resolve it after the submission loop.
            self.fallback_semaphore_consumers.push((semaphore, edge.consumer));
        }
        Ok(())
    }

    fn allocate_semaphore(&self) -> Result<vk::Semaphore, SchedulerError> {
        let create_info = vk::SemaphoreCreateInfo::builder().build();
        unsafe {
            self.device
                .create_semaphore(&create_info, None)
                .map_err(|_| SchedulerError::Validation(ErrorContext::new("allocate_semaphore", Subsystem::Scheduler)))
        }
    }

    /// `VK_ERROR_OUT_OF_DATE_KHR` is folded into [`PresentOutcome::OutOfDate`]
    /// rather than returned as an error, matching §4.2/§7's "transient
    /// present result" rule; any other present failure is a real
    /// device-lost style error.
    fn issue_present(&mut self, queue: &Queue, request: &PresentRequest, frame_index: u32) -> Result<PresentOutcome, SchedulerError> {
        let wait_semaphores: Vec<vk::Semaphore> = self
            .jobs
            .iter()
            .filter(|job| job.effective_class == QueueClass::Graphics)
            .flat_map(|job| job.request.signal_semaphores.iter().copied())
            .collect();

        let swapchains = [request.swapchain];
        let image_indices = [request.image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices)
            .build();

        match queue.present(&present_info) {
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Ok(false) => Ok(PresentOutcome::Presented),
            Err(DeviceError::Vulkan { source, .. }) if source == vk::Result::ERROR_OUT_OF_DATE_KHR => Ok(PresentOutcome::OutOfDate),
            Err(_) => Err(SchedulerError::DeviceLost(
                ErrorContext::new("issue_present", Subsystem::Scheduler).with_frame_index(frame_index),
            )),
        }
    }
}

fn dependency_class_for(class: QueueClass) -> SyncDependencyClass {
    match class {
        QueueClass::Graphics => SyncDependencyClass::Graphics,
        QueueClass::Transfer => SyncDependencyClass::Transfer,
        QueueClass::Compute => SyncDependencyClass::Compute,
    }
}

/// Groups an already topologically-ordered job list into contiguous
/// same-queue-class, fence-free runs (spec §4.2 "Batching"). A job
/// carrying its own explicit fence is always isolated into a
/// single-job batch, since a `SubmitBatch` shares one fence across all
/// its entries.
fn partition_batches(order: &[JobId], jobs: &[JobRuntime]) -> Vec<Vec<JobId>> {
    let mut batches: Vec<Vec<JobId>> = Vec::new();
    let mut current: Vec<JobId> = Vec::new();
    let mut current_class: Option<QueueClass> = None;

    for &job_id in order {
        let job = &jobs[job_id.0];
        let has_fence = job.request.fence.is_some();

        if has_fence || current_class != Some(job.effective_class) {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }
            current_class = Some(job.effective_class);
        }

        current.push(job_id);

        if has_fence {
            batches.push(std::mem::take(&mut current));
            current_class = None;
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(class: QueueClass, fence: Option<vk::Fence>) -> JobRuntime {
        let mut request = JobRequest::new(class, vec![vk::CommandBuffer::null()]);
        request.fence = fence;
        JobRuntime {
            requested_class: class,
            effective_class: class,
            request,
            extra_waits: Vec::new(),
            extra_signals: Vec::new(),
            wait_tickets: Vec::new(),
            ticket: None,
        }
    }

    #[test]
    fn consecutive_same_class_jobs_batch_together() {
        let jobs = vec![runtime(QueueClass::Graphics, None), runtime(QueueClass::Graphics, None), runtime(QueueClass::Graphics, None)];
        let order = vec![JobId(0), JobId(1), JobId(2)];
        let batches = partition_batches(&order, &jobs);
        assert_eq!(batches, vec![vec![JobId(0), JobId(1), JobId(2)]]);
    }

    #[test]
    fn a_class_change_starts_a_new_batch() {
        let jobs = vec![runtime(QueueClass::Graphics, None), runtime(QueueClass::Transfer, None), runtime(QueueClass::Transfer, None)];
        let order = vec![JobId(0), JobId(1), JobId(2)];
        let batches = partition_batches(&order, &jobs);
        assert_eq!(batches, vec![vec![JobId(0)], vec![JobId(1), JobId(2)]]);
    }

    #[test]
    fn a_fenced_job_is_isolated_into_its_own_batch() {
        let jobs = vec![
            runtime(QueueClass::Graphics, None),
            runtime(QueueClass::Graphics, Some(vk::Fence::null())),
            runtime(QueueClass::Graphics, None),
        ];
        let order = vec![JobId(0), JobId(1), JobId(2)];
        let batches = partition_batches(&order, &jobs);
        assert_eq!(batches, vec![vec![JobId(0)], vec![JobId(1)], vec![JobId(2)]]);
    }

    #[test]
    fn graphics_class_accepts_any_stage() {
        assert!(stage_compatible_with_queue_class(vk::PipelineStageFlags2::VERTEX_SHADER, QueueClass::Graphics));
        assert!(stage_compatible_with_queue_class(vk::PipelineStageFlags2::TRANSFER, QueueClass::Graphics));
    }

    #[test]
    fn compute_class_rejects_graphics_only_stages() {
        assert!(!stage_compatible_with_queue_class(vk::PipelineStageFlags2::VERTEX_SHADER, QueueClass::Compute));
        assert!(stage_compatible_with_queue_class(vk::PipelineStageFlags2::COMPUTE_SHADER, QueueClass::Compute));
    }

    #[test]
    fn transfer_class_only_accepts_its_allowed_stages() {
        assert!(stage_compatible_with_queue_class(vk::PipelineStageFlags2::TRANSFER, QueueClass::Transfer));
        assert!(stage_compatible_with_queue_class(vk::PipelineStageFlags2::ALL_COMMANDS, QueueClass::Transfer));
        assert!(!stage_compatible_with_queue_class(vk::PipelineStageFlags2::FRAGMENT_SHADER, QueueClass::Transfer));
    }

    #[test]
    fn dependency_class_maps_one_to_one_with_queue_class() {
        assert_eq!(dependency_class_for(QueueClass::Graphics), SyncDependencyClass::Graphics);
        assert_eq!(dependency_class_for(QueueClass::Transfer), SyncDependencyClass::Transfer);
        assert_eq!(dependency_class_for(QueueClass::Compute), SyncDependencyClass::Compute);
    }
}
