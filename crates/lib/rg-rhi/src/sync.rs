//! Timeline-aware (with fence-based fallback) synchronization primitive.
//! Mints submission tickets, tracks per-frame completion, and gates
//! command-pool reuse (through [`crate::arena::CommandArena`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ash::vk;

use crate::device::{Device, QueueClass};
use crate::error::SyncError;
use crate::queue::Queue;
use rg_core::error::{ErrorContext, Subsystem};

/// Uniquely identifies one submission. `value` is strictly increasing per
/// device for the lifetime of the sync context (spec §3, §8 invariant 5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncTicket {
    pub value: u64,
    pub frame_index: u32,
}

/// Resolves a wait/signal stage mask when the caller didn't supply one
/// explicitly (§4.3 step 1 / §13's restored `SyncDependencyClass`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncDependencyClass {
    Graphics,
    Compute,
    Transfer,
    Host,
    Generic,
}

impl SyncDependencyClass {
    fn inferred_stage(self) -> Option<vk::PipelineStageFlags2> {
        match self {
            SyncDependencyClass::Graphics => Some(vk::PipelineStageFlags2::ALL_GRAPHICS),
            SyncDependencyClass::Compute => Some(vk::PipelineStageFlags2::COMPUTE_SHADER),
            SyncDependencyClass::Transfer => Some(vk::PipelineStageFlags2::TRANSFER),
            SyncDependencyClass::Host => Some(vk::PipelineStageFlags2::HOST),
            SyncDependencyClass::Generic => None,
        }
    }
}

/// Governs how `prepare_frame_for_submit` and `CommandArena::begin_frame`
/// observe a fallback fence (§13, restored from the original's
/// `FenceWaitPolicy`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceWaitPolicy {
    /// Check status without blocking; `NotReady` if not signaled.
    Poll,
    /// Block until signaled or the given timeout elapses.
    Wait(Duration),
    /// Caller has proved (e.g. via an earlier successful wait) that the
    /// fence is signaled; skip the call entirely.
    AssertSignaled,
}

/// Whether the sync context submits via `vkQueueSubmit2` or the legacy
/// `vkQueueSubmit`, chosen once at construction from `DeviceFeatures`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitBackend {
    Submit2,
    LegacySubmit,
}

/// One external (caller-supplied) wait or signal semaphore, with an
/// optional explicit stage and the dependency class to infer one from if
/// absent.
#[derive(Clone, Copy, Debug)]
pub struct ExternalSemaphoreOp {
    pub semaphore: vk::Semaphore,
    pub stage: Option<vk::PipelineStageFlags2>,
    pub dependency_class: SyncDependencyClass,
}

/// Adjustable-without-locking stage mask defaults used whenever a caller
/// doesn't supply an explicit stage (§4.3 "Stage policy").
pub struct StagePolicy {
    timeline_wait_stage: AtomicU64,
    timeline_signal_stage: AtomicU64,
    external_signal_stage: AtomicU64,
}

impl Default for StagePolicy {
    fn default() -> Self {
        Self {
            timeline_wait_stage: AtomicU64::new(vk::PipelineStageFlags2::ALL_COMMANDS.as_raw()),
            timeline_signal_stage: AtomicU64::new(vk::PipelineStageFlags2::ALL_COMMANDS.as_raw()),
            external_signal_stage: AtomicU64::new(vk::PipelineStageFlags2::ALL_COMMANDS.as_raw()),
        }
    }
}

impl StagePolicy {
    pub fn timeline_wait_stage(&self) -> vk::PipelineStageFlags2 {
        vk::PipelineStageFlags2::from_raw(self.timeline_wait_stage.load(Ordering::Relaxed))
    }
    pub fn timeline_signal_stage(&self) -> vk::PipelineStageFlags2 {
        vk::PipelineStageFlags2::from_raw(self.timeline_signal_stage.load(Ordering::Relaxed))
    }
    pub fn external_signal_stage(&self) -> vk::PipelineStageFlags2 {
        vk::PipelineStageFlags2::from_raw(self.external_signal_stage.load(Ordering::Relaxed))
    }

    pub fn set_timeline_wait_stage(&self, stage: vk::PipelineStageFlags2) {
        self.timeline_wait_stage.store(stage.as_raw(), Ordering::Relaxed);
    }
    pub fn set_timeline_signal_stage(&self, stage: vk::PipelineStageFlags2) {
        self.timeline_signal_stage.store(stage.as_raw(), Ordering::Relaxed);
    }
    pub fn set_external_signal_stage(&self, stage: vk::PipelineStageFlags2) {
        self.external_signal_stage.store(stage.as_raw(), Ordering::Relaxed);
    }
}

/// Everything one `submit` call needs besides the queue and frame index.
pub struct SyncSubmitInfo {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub external_waits: Vec<ExternalSemaphoreOp>,
    pub external_signals: Vec<ExternalSemaphoreOp>,
    pub wait_tickets: Vec<SyncTicket>,
    pub allow_all_commands_fallback: bool,
}

impl Default for SyncSubmitInfo {
    fn default() -> Self {
        Self {
            command_buffers: Vec::new(),
            external_waits: Vec::new(),
            external_signals: Vec::new(),
            wait_tickets: Vec::new(),
            allow_all_commands_fallback: true,
        }
    }
}

fn resolve_stage(
    explicit: Option<vk::PipelineStageFlags2>,
    default_stage: vk::PipelineStageFlags2,
    dependency_class: SyncDependencyClass,
    allow_all_commands_fallback: bool,
) -> Result<vk::PipelineStageFlags2, SyncError> {
    if let Some(stage) = explicit {
        return Ok(stage);
    }
    if !default_stage.is_empty() {
        return Ok(default_stage);
    }
    if let Some(stage) = dependency_class.inferred_stage() {
        return Ok(stage);
    }
    if dependency_class == SyncDependencyClass::Generic && allow_all_commands_fallback {
        return Ok(vk::PipelineStageFlags2::ALL_COMMANDS);
    }

    Err(SyncError::Validation(
        ErrorContext::new("resolve_stage", Subsystem::SyncContext)
            .with_object_hint("no explicit/default/inferred stage and generic fallback disallowed")
            .retryable(),
    ))
}

/// One job's fully-resolved wait/signal arrays and minted ticket value,
/// ready to become one entry of a batched submit call.
struct ResolvedSubmit {
    command_buffers: Vec<vk::CommandBuffer>,
    wait_semaphores: Vec<vk::Semaphore>,
    wait_stages: Vec<vk::PipelineStageFlags2>,
    wait_values: Vec<u64>,
    signal_semaphores: Vec<vk::Semaphore>,
    signal_stages: Vec<vk::PipelineStageFlags2>,
    signal_values: Vec<u64>,
    ticket_value: u64,
}

enum Mode {
    Timeline {
        semaphore: vk::Semaphore,
        next_value: AtomicU64,
        per_frame_submitted: Vec<AtomicU64>,
    },
    Fallback {
        fences: Vec<vk::Fence>,
        per_frame_submitted: Vec<AtomicU64>,
        per_frame_completed: Vec<AtomicU64>,
    },
}

/// The render task graph's single timing authority: one timeline
/// semaphore (preferred) or a ring of fences (fallback), plus per-frame
/// bookkeeping. Spans the device lifetime.
pub struct FrameSyncContext {
    device_id: crate::device::DeviceId,
    submit_backend: SubmitBackend,
    mode: Mode,
    pub stage_policy: StagePolicy,
}

impl FrameSyncContext {
    /// Constructs a timeline-mode context. `frames_in_flight` is only
    /// used to size the per-frame "last submitted value" bookkeeping.
    pub fn new_timeline(device: &Device, semaphore: vk::Semaphore, frames_in_flight: u32) -> Self {
        assert!(device.features.timeline_semaphore, "timeline semaphore feature not enabled");
        Self {
            device_id: device.id,
            submit_backend: if device.features.synchronization2 {
                SubmitBackend::Submit2
            } else {
                SubmitBackend::LegacySubmit
            },
            mode: Mode::Timeline {
                semaphore,
                next_value: AtomicU64::new(1),
                per_frame_submitted: (0..frames_in_flight).map(|_| AtomicU64::new(0)).collect(),
            },
            stage_policy: StagePolicy::default(),
        }
    }

    pub fn new_fallback(device: &Device, fences: Vec<vk::Fence>) -> Self {
        let count = fences.len();
        Self {
            device_id: device.id,
            submit_backend: if device.features.synchronization2 {
                SubmitBackend::Submit2
            } else {
                SubmitBackend::LegacySubmit
            },
            mode: Mode::Fallback {
                fences,
                per_frame_submitted: (0..count).map(|_| AtomicU64::new(0)).collect(),
                per_frame_completed: (0..count).map(|_| AtomicU64::new(0)).collect(),
            },
            stage_policy: StagePolicy::default(),
        }
    }

    pub fn is_timeline(&self) -> bool {
        matches!(self.mode, Mode::Timeline { .. })
    }

    pub fn submit_backend(&self) -> SubmitBackend {
        self.submit_backend
    }

    /// The only safe way to reuse a fallback fence: observes the fence per
    /// `policy`, resets it, and zeroes the frame's submitted/completed
    /// atomics. No-op (and an error) in timeline mode, since there is no
    /// per-frame fence to prepare.
    pub fn prepare_frame_for_submit(
        &self,
        device: &ash::Device,
        frame_index: u32,
        policy: FenceWaitPolicy,
    ) -> Result<(), SyncError> {
        match &self.mode {
            Mode::Timeline { .. } => Ok(()),
            Mode::Fallback {
                fences,
                per_frame_submitted,
                per_frame_completed,
            } => {
                let idx = frame_index as usize;
                let fence = fences[idx];
                observe_fence(device, fence, policy)?;
                unsafe {
                    device
                        .reset_fences(&[fence])
                        .map_err(|_| SyncError::Vulkan(ErrorContext::new("reset_fences", Subsystem::SyncContext)))?;
                }
                per_frame_submitted[idx].store(0, Ordering::SeqCst);
                per_frame_completed[idx].store(0, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    /// Assembles wait/signal infos, submits via `submit2`/`submit` per the
    /// chosen backend, and returns the minted ticket. On success in
    /// timeline mode, notifies the deferred deletion service of the new
    /// submitted watermark.
    pub fn submit(
        &self,
        device: &ash::Device,
        queue: &Queue,
        frame_index: u32,
        info: SyncSubmitInfo,
        explicit_fence: Option<vk::Fence>,
    ) -> Result<SyncTicket, SyncError> {
        let tickets = self.submit_batch(device, queue, frame_index, vec![info], explicit_fence)?;
        Ok(tickets[0])
    }

    /// Resolves one job's wait/signal arrays and mints its ticket value,
    /// without touching the device. Shared by [`Self::submit`] and
    /// [`Self::submit_batch`] so a whole batch resolves before a single
    /// `vkQueueSubmit`/`vkQueueSubmit2` call issues it.
    fn resolve_one(&self, frame_index: u32, info: &SyncSubmitInfo) -> Result<ResolvedSubmit, SyncError> {
        let mut wait_semaphores = Vec::new();
        let mut wait_stages = Vec::new();
        let mut wait_values = Vec::new();

        for wait in &info.external_waits {
            let stage = resolve_stage(wait.stage, vk::PipelineStageFlags2::empty(), wait.dependency_class, info.allow_all_commands_fallback)?;
            wait_semaphores.push(wait.semaphore);
            wait_stages.push(stage);
            wait_values.push(0);
        }

        if !info.wait_tickets.is_empty() && !self.is_timeline() {
            return Err(SyncError::Validation(
                ErrorContext::new("submit", Subsystem::SyncContext).with_object_hint("ticket waits require timeline mode"),
            ));
        }

        let timeline_semaphore = if let Mode::Timeline { semaphore, .. } = &self.mode {
            Some(*semaphore)
        } else {
            None
        };

        if let Some(semaphore) = timeline_semaphore {
            for ticket in &info.wait_tickets {
                wait_semaphores.push(semaphore);
                wait_stages.push(self.stage_policy.timeline_wait_stage());
                wait_values.push(ticket.value);
            }
        }

        let mut signal_semaphores = Vec::new();
        let mut signal_stages = Vec::new();
        let mut signal_values = Vec::new();

        for signal in &info.external_signals {
            let stage = resolve_stage(
                signal.stage,
                self.stage_policy.external_signal_stage(),
                signal.dependency_class,
                info.allow_all_commands_fallback,
            )?;
            signal_semaphores.push(signal.semaphore);
            signal_stages.push(stage);
            signal_values.push(0);
        }

        let ticket_value = match &self.mode {
            Mode::Timeline {
                semaphore,
                next_value,
                per_frame_submitted,
            } => {
                let value = next_value.fetch_add(1, Ordering::SeqCst);
                signal_semaphores.push(*semaphore);
                signal_stages.push(self.stage_policy.timeline_signal_stage());
                signal_values.push(value);
                per_frame_submitted[frame_index as usize].store(value, Ordering::SeqCst);
                value
            }
            Mode::Fallback { per_frame_submitted, .. } => {
                per_frame_submitted[frame_index as usize].fetch_add(1, Ordering::SeqCst) + 1
            }
        };

        Ok(ResolvedSubmit {
            command_buffers: info.command_buffers.clone(),
            wait_semaphores,
            wait_stages,
            wait_values,
            signal_semaphores,
            signal_stages,
            signal_values,
            ticket_value,
        })
    }

    /// Resolves every job in `infos` and issues them together as a single
    /// `vkQueueSubmit`/`vkQueueSubmit2` call (one submit-info entry per
    /// job), matching the scheduler's same-queue batching (spec §4.2).
    /// Returns one ticket per job, in the same order as `infos`.
    pub fn submit_batch(
        &self,
        device: &ash::Device,
        queue: &Queue,
        frame_index: u32,
        infos: Vec<SyncSubmitInfo>,
        explicit_fence: Option<vk::Fence>,
    ) -> Result<Vec<SyncTicket>, SyncError> {
        if infos.is_empty() {
            return Ok(Vec::new());
        }

        let resolved: Vec<ResolvedSubmit> = infos.iter().map(|info| self.resolve_one(frame_index, info)).collect::<Result<_, _>>()?;

        let fence = match (&self.mode, explicit_fence) {
            (Mode::Fallback { fences, .. }, None) => fences[frame_index as usize],
            (_, Some(fence)) => fence,
            (Mode::Timeline { .. }, None) => vk::Fence::null(),
        };

        let _ = device;
        self.do_submit(queue, &resolved, fence)?;

        if self.is_timeline() {
            let max_ticket = resolved.iter().map(|r| r.ticket_value).max().unwrap_or(0);
            crate::deletion::update_submitted_ticket(self.device_id, max_ticket);
        }

        Ok(resolved
            .iter()
            .map(|r| SyncTicket {
                value: r.ticket_value,
                frame_index,
            })
            .collect())
    }

    /// Issues every resolved job in `batch` as entries of a single
    /// `vkQueueSubmit`/`vkQueueSubmit2` call, sharing one fence. This is
    /// the "coalesce contiguous same-queue jobs to reduce driver calls"
    /// batching from spec §4.2.
    fn do_submit(&self, queue: &Queue, batch: &[ResolvedSubmit], fence: vk::Fence) -> Result<(), SyncError> {
        match self.submit_backend {
            SubmitBackend::Submit2 => {
                // Keep each job's per-entry Vecs alive for the duration of
                // the call; `vk::SubmitInfo2` only borrows them.
                let per_job: Vec<(Vec<vk::SemaphoreSubmitInfo>, Vec<vk::SemaphoreSubmitInfo>, Vec<vk::CommandBufferSubmitInfo>)> = batch
                    .iter()
                    .map(|job| {
                        let wait_infos = job
                            .wait_semaphores
                            .iter()
                            .zip(&job.wait_stages)
                            .zip(&job.wait_values)
                            .map(|((sem, stage), value)| {
                                vk::SemaphoreSubmitInfo::builder().semaphore(*sem).stage_mask(*stage).value(*value).build()
                            })
                            .collect();
                        let signal_infos = job
                            .signal_semaphores
                            .iter()
                            .zip(&job.signal_stages)
                            .zip(&job.signal_values)
                            .map(|((sem, stage), value)| {
                                vk::SemaphoreSubmitInfo::builder().semaphore(*sem).stage_mask(*stage).value(*value).build()
                            })
                            .collect();
                        let cb_infos = job
                            .command_buffers
                            .iter()
                            .map(|cb| vk::CommandBufferSubmitInfo::builder().command_buffer(*cb).build())
                            .collect();
                        (wait_infos, signal_infos, cb_infos)
                    })
                    .collect();

                let submit_infos: Vec<vk::SubmitInfo2> = per_job
                    .iter()
                    .map(|(wait_infos, signal_infos, cb_infos)| {
                        vk::SubmitInfo2::builder()
                            .wait_semaphore_infos(wait_infos)
                            .command_buffer_infos(cb_infos)
                            .signal_semaphore_infos(signal_infos)
                            .build()
                    })
                    .collect();

                queue
                    .submit2(&submit_infos, fence)
                    .map_err(|_| SyncError::Vulkan(ErrorContext::new("submit2", Subsystem::SyncContext)))
            }
            SubmitBackend::LegacySubmit => {
                let legacy_wait_stages: Vec<Vec<vk::PipelineStageFlags>> = batch
                    .iter()
                    .map(|job| job.wait_stages.iter().map(|s| crate::barrier::sanitize_stage2_to_legacy(*s)).collect())
                    .collect();

                let mut timeline_infos: Vec<vk::TimelineSemaphoreSubmitInfo> = batch
                    .iter()
                    .map(|job| {
                        vk::TimelineSemaphoreSubmitInfo::builder()
                            .wait_semaphore_values(&job.wait_values)
                            .signal_semaphore_values(&job.signal_values)
                            .build()
                    })
                    .collect();

                let submit_infos: Vec<vk::SubmitInfo> = batch
                    .iter()
                    .zip(&legacy_wait_stages)
                    .zip(timeline_infos.iter_mut())
                    .map(|((job, wait_stages), timeline_info)| {
                        vk::SubmitInfo::builder()
                            .wait_semaphores(&job.wait_semaphores)
                            .wait_dst_stage_mask(wait_stages)
                            .command_buffers(&job.command_buffers)
                            .signal_semaphores(&job.signal_semaphores)
                            .push_next(timeline_info)
                            .build()
                    })
                    .collect();

                queue
                    .submit(&submit_infos, fence)
                    .map_err(|_| SyncError::Vulkan(ErrorContext::new("submit", Subsystem::SyncContext)))
            }
        }
    }

    fn live_counter(&self, device: &ash::Device) -> Result<u64, SyncError> {
        match &self.mode {
            Mode::Timeline { semaphore, .. } => unsafe {
                device
                    .get_semaphore_counter_value(*semaphore)
                    .map_err(|_| SyncError::Vulkan(ErrorContext::new("get_semaphore_counter_value", Subsystem::SyncContext)))
            },
            Mode::Fallback { .. } => Err(SyncError::Validation(ErrorContext::new(
                "live_counter",
                Subsystem::SyncContext,
            ))),
        }
    }

    pub fn is_ticket_complete(&self, device: &ash::Device, ticket: SyncTicket) -> Result<bool, SyncError> {
        match &self.mode {
            Mode::Timeline { .. } => Ok(self.live_counter(device)? >= ticket.value),
            Mode::Fallback {
                fences,
                per_frame_submitted,
                per_frame_completed,
            } => {
                let idx = ticket.frame_index as usize;
                let submitted = per_frame_submitted[idx].load(Ordering::SeqCst);
                let completed = per_frame_completed[idx].load(Ordering::SeqCst);
                if completed >= ticket.value {
                    return Ok(true);
                }
                if submitted < ticket.value {
                    return Ok(false);
                }
                let signaled = unsafe {
                    device
                        .get_fence_status(fences[idx])
                        .map_err(|_| SyncError::Vulkan(ErrorContext::new("get_fence_status", Subsystem::SyncContext)))?
                };
                if signaled {
                    per_frame_completed[idx].store(submitted, Ordering::SeqCst);
                }
                Ok(signaled)
            }
        }
    }

    pub fn wait_ticket(&self, device: &ash::Device, ticket: SyncTicket, timeout: Duration) -> Result<bool, SyncError> {
        match &self.mode {
            Mode::Timeline { semaphore, .. } => {
                let wait_info = vk::SemaphoreWaitInfo::builder().semaphores(std::slice::from_ref(semaphore)).values(&[ticket.value]).build();
                unsafe {
                    match device.wait_semaphores(&wait_info, timeout.as_nanos() as u64) {
                        Ok(()) => Ok(true),
                        Err(vk::Result::TIMEOUT) => Ok(false),
                        Err(_) => Err(SyncError::Vulkan(ErrorContext::new("wait_semaphores", Subsystem::SyncContext))),
                    }
                }
            }
            Mode::Fallback {
                fences,
                per_frame_submitted,
                per_frame_completed,
            } => {
                let idx = ticket.frame_index as usize;
                let fence = fences[idx];
                unsafe {
                    match device.wait_for_fences(&[fence], true, timeout.as_nanos() as u64) {
                        Ok(()) => {
                            let submitted = per_frame_submitted[idx].load(Ordering::SeqCst);
                            per_frame_completed[idx].store(submitted, Ordering::SeqCst);
                            Ok(true)
                        }
                        Err(vk::Result::TIMEOUT) => Ok(false),
                        Err(_) => Err(SyncError::Vulkan(ErrorContext::new("wait_for_fences", Subsystem::SyncContext))),
                    }
                }
            }
        }
    }

    pub fn is_frame_complete(&self, device: &ash::Device, frame_index: u32) -> Result<bool, SyncError> {
        match &self.mode {
            Mode::Timeline { per_frame_submitted, .. } => {
                let submitted = per_frame_submitted[frame_index as usize].load(Ordering::SeqCst);
                if submitted == 0 {
                    return Ok(true);
                }
                self.is_ticket_complete(device, SyncTicket { value: submitted, frame_index })
            }
            Mode::Fallback { .. } => {
                let submitted = self.submitted_value(frame_index);
                if submitted == 0 {
                    return Ok(true);
                }
                self.is_ticket_complete(device, SyncTicket { value: submitted, frame_index })
            }
        }
    }

    pub fn wait_frame(&self, device: &ash::Device, frame_index: u32, timeout: Duration) -> Result<bool, SyncError> {
        let submitted = self.submitted_value(frame_index);
        if submitted == 0 {
            return Ok(true);
        }
        self.wait_ticket(device, SyncTicket { value: submitted, frame_index }, timeout)
    }

    fn submitted_value(&self, frame_index: u32) -> u64 {
        match &self.mode {
            Mode::Timeline { per_frame_submitted, .. } => per_frame_submitted[frame_index as usize].load(Ordering::SeqCst),
            Mode::Fallback { per_frame_submitted, .. } => per_frame_submitted[frame_index as usize].load(Ordering::SeqCst),
        }
    }

    /// Clears that frame's atomic state and resets its fence (fallback)
    /// or zeroes its timeline value (timeline).
    pub fn reset_frame(&self, device: &ash::Device, frame_index: u32) -> Result<(), SyncError> {
        let idx = frame_index as usize;
        match &self.mode {
            Mode::Timeline { per_frame_submitted, .. } => {
                per_frame_submitted[idx].store(0, Ordering::SeqCst);
                Ok(())
            }
            Mode::Fallback {
                fences,
                per_frame_submitted,
                per_frame_completed,
            } => {
                per_frame_submitted[idx].store(0, Ordering::SeqCst);
                per_frame_completed[idx].store(0, Ordering::SeqCst);
                unsafe {
                    device
                        .reset_fences(&[fences[idx]])
                        .map_err(|_| SyncError::Vulkan(ErrorContext::new("reset_fences", Subsystem::SyncContext)))
                }
            }
        }
    }
}

fn observe_fence(device: &ash::Device, fence: vk::Fence, policy: FenceWaitPolicy) -> Result<(), SyncError> {
    match policy {
        FenceWaitPolicy::AssertSignaled => Ok(()),
        FenceWaitPolicy::Poll => {
            let signaled = unsafe {
                device
                    .get_fence_status(fence)
                    .map_err(|_| SyncError::Vulkan(ErrorContext::new("get_fence_status", Subsystem::SyncContext)))?
            };
            if signaled {
                Ok(())
            } else {
                Err(SyncError::Validation(
                    ErrorContext::new("prepare_frame_for_submit", Subsystem::SyncContext)
                        .with_object_hint("fence not signaled under Poll policy")
                        .retryable(),
                ))
            }
        }
        FenceWaitPolicy::Wait(timeout) => unsafe {
            device
                .wait_for_fences(&[fence], true, timeout.as_nanos() as u64)
                .map_err(|_| SyncError::Vulkan(ErrorContext::new("wait_for_fences", Subsystem::SyncContext)))
        },
    }
}

