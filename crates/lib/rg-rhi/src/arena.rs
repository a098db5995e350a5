//! Per (worker, frame) command pool with epoch validation. Command pools
//! are owned by exactly one worker/frame pair and never shared (spec §5).

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use ash::vk;
use parking_lot::Mutex;

use crate::device::Device;
use crate::error::ArenaError;
use crate::sync::{FenceWaitPolicy, FrameSyncContext};
use rg_core::error::{ErrorContext, Subsystem};

/// Lifecycle of one frame slot in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameLifecycle {
    Available,
    InFlight,
    Retired,
}

/// Returned by a successful `begin_frame`; embedded in every command
/// buffer borrowed for that frame so stale use after a later reset is
/// cheaply detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameToken {
    pub frame_index: u32,
    pub epoch: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidateReason {
    Ok,
    InvalidHandle,
    InvalidWorkerIndex,
    InvalidFrameIndex,
    StaleGeneration,
    StaleEpoch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandBufferKind {
    Primary,
    Secondary,
}

/// A command buffer acquired from the arena. Carries the `(generation,
/// epoch)` tokens captured at acquisition time, checked again at `end`.
#[derive(Clone, Copy, Debug)]
pub struct BorrowedCommandBuffer {
    pub raw: vk::CommandBuffer,
    pub kind: CommandBufferKind,
    worker: usize,
    frame_index: usize,
    generation: u64,
    epoch: u64,
}

struct FrameState {
    pool: vk::CommandPool,
    primary_buffers: Vec<vk::CommandBuffer>,
    secondary_buffers: Vec<vk::CommandBuffer>,
    next_primary: AtomicUsize,
    next_secondary: AtomicUsize,
    generation: AtomicU64,
    mutex: Mutex<()>,
}

struct AtomicFrameSyncState {
    lifecycle: Mutex<FrameLifecycle>,
    signaled: AtomicBool,
    ticket_value: AtomicU64,
    ticket_frame_index: AtomicU32,
    frame_epoch: AtomicU64,
    transition_lock: Mutex<()>,
}

impl Default for AtomicFrameSyncState {
    fn default() -> Self {
        Self {
            lifecycle: Mutex::new(FrameLifecycle::Available),
            signaled: AtomicBool::new(true),
            ticket_value: AtomicU64::new(0),
            ticket_frame_index: AtomicU32::new(0),
            frame_epoch: AtomicU64::new(0),
            transition_lock: Mutex::new(()),
        }
    }
}

/// Source of frame readiness `begin_frame` can observe: a raw fence, a
/// `FrameSyncContext` (by ticket or by completed frame), or an already-known
/// timeline completed value. Matches §4.4's "overloads also accept a raw
/// fence or a completed_value (timeline)".
pub enum ReadinessSource<'a> {
    SyncContextTicket(&'a FrameSyncContext),
    SyncContextFrame(&'a FrameSyncContext),
    RawFence(vk::Fence),
    CompletedValue(u64),
}

pub struct CommandArena {
    device: ash::Device,
    frames_in_flight: u32,
    worker_count: usize,
    // indexed [worker][frame]
    frames: Vec<Vec<FrameState>>,
    sync_states: Vec<AtomicFrameSyncState>,
    reserved_primary: u32,
    reserved_secondary: u32,
}

impl CommandArena {
    pub fn new(
        device: &Device,
        queue_family_index: u32,
        worker_count: usize,
        frames_in_flight: u32,
        reserved_primary: u32,
        reserved_secondary: u32,
    ) -> Result<Self, ArenaError> {
        let mut frames = Vec::with_capacity(worker_count);
        for _worker in 0..worker_count {
            let mut per_frame = Vec::with_capacity(frames_in_flight as usize);
            for _frame in 0..frames_in_flight {
                per_frame.push(Self::create_frame_state(
                    &device.raw,
                    queue_family_index,
                    reserved_primary,
                    reserved_secondary,
                )?);
            }
            frames.push(per_frame);
        }

        let sync_states = (0..frames_in_flight).map(|_| AtomicFrameSyncState::default()).collect();

        Ok(Self {
            device: device.raw.clone(),
            frames_in_flight,
            worker_count,
            frames,
            sync_states,
            reserved_primary,
            reserved_secondary,
        })
    }

    fn create_frame_state(
        device: &ash::Device,
        queue_family_index: u32,
        reserved_primary: u32,
        reserved_secondary: u32,
    ) -> Result<FrameState, ArenaError> {
        let pool_ci = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(queue_family_index)
            .build();

        let pool = unsafe {
            device
                .create_command_pool(&pool_ci, None)
                .map_err(|_| ArenaError::Vulkan(ErrorContext::new("create_command_pool", Subsystem::CommandArena)))?
        };

        let primary_buffers = if reserved_primary > 0 {
            let alloc_info = vk::CommandBufferAllocateInfo::builder()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(reserved_primary)
                .build();
            unsafe {
                device
                    .allocate_command_buffers(&alloc_info)
                    .map_err(|_| ArenaError::Vulkan(ErrorContext::new("allocate_command_buffers", Subsystem::CommandArena)))?
            }
        } else {
            Vec::new()
        };

        let secondary_buffers = if reserved_secondary > 0 {
            let alloc_info = vk::CommandBufferAllocateInfo::builder()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::SECONDARY)
                .command_buffer_count(reserved_secondary)
                .build();
            unsafe {
                device
                    .allocate_command_buffers(&alloc_info)
                    .map_err(|_| ArenaError::Vulkan(ErrorContext::new("allocate_command_buffers", Subsystem::CommandArena)))?
            }
        } else {
            Vec::new()
        };

        Ok(FrameState {
            pool,
            primary_buffers,
            secondary_buffers,
            next_primary: AtomicUsize::new(0),
            next_secondary: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            mutex: Mutex::new(()),
        })
    }

    /// Observes readiness, resets every worker's pool for this frame, bumps
    /// generations, mints a new epoch, and transitions the frame to
    /// `Retired` (meaning: retired from the caller's point of view — ready
    /// to be handed out again as the new "current" frame).
    pub fn begin_frame(&self, frame_index: u32, readiness: ReadinessSource, wait_policy: FenceWaitPolicy) -> Result<FrameToken, ArenaError> {
        let sync_state = &self.sync_states[frame_index as usize];
        let _transition_guard = sync_state.transition_lock.lock();

        let ready = self.observe_ready(frame_index, readiness, wait_policy)?;
        if !ready {
            return Err(ArenaError::NotReady(
                ErrorContext::new("begin_frame", Subsystem::CommandArena)
                    .with_frame_index(frame_index)
                    .retryable(),
            ));
        }

        for worker in 0..self.worker_count {
            let frame_state = &self.frames[worker][frame_index as usize];
            let _guard = frame_state.mutex.lock();
            unsafe {
                self.device
                    .reset_command_pool(frame_state.pool, vk::CommandPoolResetFlags::empty())
                    .map_err(|_| ArenaError::Vulkan(ErrorContext::new("reset_command_pool", Subsystem::CommandArena)))?;
            }
            frame_state.next_primary.store(0, Ordering::SeqCst);
            frame_state.next_secondary.store(0, Ordering::SeqCst);
            frame_state.generation.fetch_add(1, Ordering::SeqCst);
        }

        let epoch = sync_state.frame_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *sync_state.lifecycle.lock() = FrameLifecycle::Retired;
        sync_state.signaled.store(false, Ordering::SeqCst);

        Ok(FrameToken { frame_index, epoch })
    }

    fn observe_ready(&self, frame_index: u32, readiness: ReadinessSource, wait_policy: FenceWaitPolicy) -> Result<bool, ArenaError> {
        match readiness {
            ReadinessSource::RawFence(fence) => match wait_policy {
                FenceWaitPolicy::AssertSignaled => Ok(true),
                FenceWaitPolicy::Poll => unsafe {
                    self.device
                        .get_fence_status(fence)
                        .map_err(|_| ArenaError::Vulkan(ErrorContext::new("get_fence_status", Subsystem::CommandArena)))
                },
                FenceWaitPolicy::Wait(timeout) => unsafe {
                    match self.device.wait_for_fences(&[fence], true, timeout.as_nanos() as u64) {
                        Ok(()) => Ok(true),
                        Err(vk::Result::TIMEOUT) => Ok(false),
                        Err(_) => Err(ArenaError::Vulkan(ErrorContext::new("wait_for_fences", Subsystem::CommandArena))),
                    }
                },
            },
            ReadinessSource::CompletedValue(completed) => {
                let needed = self.sync_states[frame_index as usize].ticket_value.load(Ordering::SeqCst);
                Ok(completed >= needed)
            }
            ReadinessSource::SyncContextTicket(ctx) => {
                let value = self.sync_states[frame_index as usize].ticket_value.load(Ordering::SeqCst);
                if value == 0 {
                    return Ok(true);
                }
                match wait_policy {
                    FenceWaitPolicy::Poll => ctx
                        .is_ticket_complete(&self.device, crate::sync::SyncTicket { value, frame_index })
                        .map_err(|_| ArenaError::Vulkan(ErrorContext::new("is_ticket_complete", Subsystem::CommandArena))),
                    FenceWaitPolicy::Wait(timeout) => ctx
                        .wait_ticket(&self.device, crate::sync::SyncTicket { value, frame_index }, timeout)
                        .map_err(|_| ArenaError::Vulkan(ErrorContext::new("wait_ticket", Subsystem::CommandArena))),
                    FenceWaitPolicy::AssertSignaled => Ok(true),
                }
            }
            ReadinessSource::SyncContextFrame(ctx) => match wait_policy {
                FenceWaitPolicy::Poll => ctx
                    .is_frame_complete(&self.device, frame_index)
                    .map_err(|_| ArenaError::Vulkan(ErrorContext::new("is_frame_complete", Subsystem::CommandArena))),
                FenceWaitPolicy::Wait(timeout) => ctx
                    .wait_frame(&self.device, frame_index, timeout)
                    .map_err(|_| ArenaError::Vulkan(ErrorContext::new("wait_frame", Subsystem::CommandArena))),
                FenceWaitPolicy::AssertSignaled => Ok(true),
            },
        }
    }

    pub fn acquire_primary(&self, worker: usize, frame_index: u32, usage: vk::CommandBufferUsageFlags) -> Result<BorrowedCommandBuffer, ArenaError> {
        self.acquire(worker, frame_index, CommandBufferKind::Primary, usage, None)
    }

    pub fn acquire_secondary(
        &self,
        worker: usize,
        frame_index: u32,
        usage: vk::CommandBufferUsageFlags,
        inheritance: Option<vk::CommandBufferInheritanceInfo>,
    ) -> Result<BorrowedCommandBuffer, ArenaError> {
        self.acquire(worker, frame_index, CommandBufferKind::Secondary, usage, inheritance)
    }

    fn acquire(
        &self,
        worker: usize,
        frame_index: u32,
        kind: CommandBufferKind,
        usage: vk::CommandBufferUsageFlags,
        inheritance: Option<vk::CommandBufferInheritanceInfo>,
    ) -> Result<BorrowedCommandBuffer, ArenaError> {
        let frame_state = &self.frames[worker][frame_index as usize];
        let _guard = frame_state.mutex.lock();

        let raw = match kind {
            CommandBufferKind::Primary => {
                let next = frame_state.next_primary.fetch_add(1, Ordering::SeqCst);
                if next < frame_state.primary_buffers.len() {
                    frame_state.primary_buffers[next]
                } else {
                    self.allocate_one(frame_state.pool, vk::CommandBufferLevel::PRIMARY)?
                }
            }
            CommandBufferKind::Secondary => {
                let next = frame_state.next_secondary.fetch_add(1, Ordering::SeqCst);
                if next < frame_state.secondary_buffers.len() {
                    frame_state.secondary_buffers[next]
                } else {
                    self.allocate_one(frame_state.pool, vk::CommandBufferLevel::SECONDARY)?
                }
            }
        };

        let mut begin_info = vk::CommandBufferBeginInfo::builder().flags(usage);
        let inheritance_storage;
        if let Some(inheritance) = inheritance {
            inheritance_storage = inheritance;
            begin_info = begin_info.inheritance_info(&inheritance_storage);
        }

        unsafe {
            self.device
                .begin_command_buffer(raw, &begin_info)
                .map_err(|_| ArenaError::Vulkan(ErrorContext::new("begin_command_buffer", Subsystem::CommandArena)))?;
        }

        Ok(BorrowedCommandBuffer {
            raw,
            kind,
            worker,
            frame_index: frame_index as usize,
            generation: frame_state.generation.load(Ordering::SeqCst),
            epoch: self.sync_states[frame_index as usize].frame_epoch.load(Ordering::SeqCst),
        })
    }

    fn allocate_one(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer, ArenaError> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder().command_pool(pool).level(level).command_buffer_count(1).build();
        let buffers = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(|_| ArenaError::Vulkan(ErrorContext::new("allocate_command_buffers", Subsystem::CommandArena)))?
        };
        Ok(buffers[0])
    }

    /// Cheaply detects use-after-reset by comparing the borrow's captured
    /// `(generation, epoch)` against the arena's current values.
    pub fn validate_borrowed(&self, cb: &BorrowedCommandBuffer) -> ValidateReason {
        if cb.worker >= self.worker_count {
            return ValidateReason::InvalidWorkerIndex;
        }
        if cb.frame_index >= self.frames_in_flight as usize {
            return ValidateReason::InvalidFrameIndex;
        }
        if cb.raw == vk::CommandBuffer::null() {
            return ValidateReason::InvalidHandle;
        }

        let frame_state = &self.frames[cb.worker][cb.frame_index];
        if frame_state.generation.load(Ordering::SeqCst) != cb.generation {
            return ValidateReason::StaleGeneration;
        }

        let current_epoch = self.sync_states[cb.frame_index].frame_epoch.load(Ordering::SeqCst);
        if current_epoch != cb.epoch {
            return ValidateReason::StaleEpoch;
        }

        ValidateReason::Ok
    }

    pub fn end_borrowed(&self, cb: &BorrowedCommandBuffer) -> Result<(), ArenaError> {
        let reason = self.validate_borrowed(cb);
        if reason != ValidateReason::Ok {
            return Err(ArenaError::Validation(
                ErrorContext::new("end_borrowed", Subsystem::CommandArena).with_object_hint(format!("{reason:?}")),
            ));
        }

        unsafe {
            self.device
                .end_command_buffer(cb.raw)
                .map_err(|_| ArenaError::Vulkan(ErrorContext::new("end_command_buffer", Subsystem::CommandArena)))
        }
    }

    pub fn mark_frame_submitted(&self, frame_index: u32, ticket: crate::sync::SyncTicket) {
        let sync_state = &self.sync_states[frame_index as usize];
        *sync_state.lifecycle.lock() = FrameLifecycle::InFlight;
        sync_state.ticket_value.store(ticket.value, Ordering::SeqCst);
        sync_state.ticket_frame_index.store(ticket.frame_index, Ordering::SeqCst);
        sync_state.signaled.store(false, Ordering::SeqCst);
    }

    pub fn mark_frame_complete(&self, frame_index: u32) {
        let sync_state = &self.sync_states[frame_index as usize];
        *sync_state.lifecycle.lock() = FrameLifecycle::Available;
        sync_state.signaled.store(true, Ordering::SeqCst);
    }

    pub fn frame_lifecycle(&self, frame_index: u32) -> FrameLifecycle {
        *self.sync_states[frame_index as usize].lifecycle.lock()
    }

    /// Number of independent worker slots backing this arena. The caller
    /// must never run more than this many jobs against the same frame
    /// concurrently, since each slot's pool has exactly one owner at a time.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl Drop for CommandArena {
    fn drop(&mut self) {
        for worker_frames in &self.frames {
            for frame in worker_frames {
                unsafe {
                    self.device.destroy_command_pool(frame.pool, None);
                }
            }
        }
    }
}

/// RAII wrapper around a [`BorrowedCommandBuffer`] that guarantees
/// `end_borrowed` runs exactly once, on drop if not called explicitly.
pub struct CommandRecorder<'a> {
    arena: &'a CommandArena,
    cb: Option<BorrowedCommandBuffer>,
}

impl<'a> CommandRecorder<'a> {
    pub fn new(arena: &'a CommandArena, cb: BorrowedCommandBuffer) -> Self {
        Self { arena, cb: Some(cb) }
    }

    pub fn raw(&self) -> vk::CommandBuffer {
        self.cb.as_ref().expect("command recorder used after finish").raw
    }

    pub fn finish(mut self) -> Result<BorrowedCommandBuffer, ArenaError> {
        let cb = self.cb.take().expect("command recorder already finished");
        self.arena.end_borrowed(&cb)?;
        Ok(cb)
    }
}

impl Drop for CommandRecorder<'_> {
    fn drop(&mut self) {
        if let Some(cb) = self.cb.take() {
            if let Err(err) = self.arena.end_borrowed(&cb) {
                log::warn!("command recorder dropped without finish(): {err}");
            }
        }
    }
}
