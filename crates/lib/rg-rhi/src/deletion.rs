//! Process-wide registry mapping each live device to a deletion queue
//! keyed by a monotonically increasing "retire-after" value. On every
//! submission the scheduler advances the "submitted" watermark; on frame
//! completion the service drains all tasks whose retire value has been
//! reached.
//!
//! Each deferred handle type gets one small closure captured at
//! construction time instead of a shared destructor trait object, so
//! there's no open inheritance tree to keep in sync with new handle
//! kinds.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rg_container::OnceQueue;
use rg_core::error::{ErrorContext, Subsystem};

use crate::device::{DeviceId, QueueClass};
use crate::error::DeletionError;

/// Bumped on every (re)registration of a device id, so a deferred handle
/// captured against a stale generation destroys immediately instead of
/// enqueuing against a device that has since been recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceGeneration(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceLifecycle {
    Dead,
    Registered,
    Unregistering,
}

/// The deletion service's view of a submission: a monotonic value plus
/// which queue it went through.
#[derive(Clone, Copy, Debug)]
pub struct SubmissionTicket {
    pub value: u64,
    pub queue_class: QueueClass,
    pub queue_family: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOrder {
    Fifo,
    Lifo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    KeepFailedTasks,
    DiscardFailedTasks,
}

/// Exact default values preserved from the original's `DeletionQueue.h`.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub max_frame_age: u64,
    pub base_retry_backoff_frames: u64,
    pub hard_fail_in_debug: bool,
    pub failure_policy: FailurePolicy,
    pub drain_order: DrainOrder,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            max_frame_age: 512,
            base_retry_backoff_frames: 1,
            hard_fail_in_debug: false,
            failure_policy: FailurePolicy::KeepFailedTasks,
            drain_order: DrainOrder::Fifo,
        }
    }
}

impl From<&rg_core::config::DeletionQueueConfig> for RetryPolicy {
    fn from(cfg: &rg_core::config::DeletionQueueConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            max_frame_age: cfg.max_frame_age,
            base_retry_backoff_frames: cfg.base_retry_backoff_frames,
            hard_fail_in_debug: cfg.hard_fail_in_debug,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CollectStats {
    pub executed: u32,
    pub retried: u32,
    pub escalated: u32,
}

#[derive(Clone, Debug)]
pub struct FailureEscalationEvent {
    pub device_id: DeviceId,
    pub retire_after_value: u64,
    pub retries: u32,
    pub frame_age: u64,
    pub reason: String,
}

pub type FailureEscalationHook = dyn Fn(FailureEscalationEvent) + Send + Sync;

/// What happens when an invariant (no retire value, `StrictRequireQueue`
/// with a dropped queue) is violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvariantViolationPolicy {
    Abort,
    ImmediateFallback,
    ReportAndLeakSafely,
}

/// How a deferred handle releases its GPU resource: either immediate
/// (caller has already proved the GPU is idle) or deferred, never both.
#[derive(Clone, Copy, Debug)]
pub enum HandlePolicy {
    ImmediateOnly,
    Deferred { retire_after: u64 },
    DeferredBestEffort,
}

type DeletionTask = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

struct PendingTask {
    task: DeletionTask,
    retries: u32,
    first_seen_frame: u64,
}

struct DeletionQueue {
    buckets: BTreeMap<u64, Vec<PendingTask>>,
    retry_buckets: BTreeMap<u64, Vec<PendingTask>>,
    retry_policy: RetryPolicy,
}

impl DeletionQueue {
    fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            buckets: BTreeMap::new(),
            retry_buckets: BTreeMap::new(),
            retry_policy,
        }
    }

    fn enqueue(&mut self, retire_after: u64, task: DeletionTask) {
        self.buckets.entry(retire_after).or_default().push(PendingTask {
            task,
            retries: 0,
            first_seen_frame: 0,
        });
    }

    fn collect(&mut self, completed_value: u64, frame_index: u64, hook: Option<&FailureEscalationHook>, device_id: DeviceId) -> CollectStats {
        // Ready retry-bucket tasks move back into the normal schedule.
        let ready_retry_keys: Vec<u64> = self.retry_buckets.range(..=completed_value).map(|(k, _)| *k).collect();
        for key in ready_retry_keys {
            if let Some(tasks) = self.retry_buckets.remove(&key) {
                self.buckets.entry(key).or_default().extend(tasks);
            }
        }

        let ready_keys: Vec<u64> = self.buckets.range(..=completed_value).map(|(k, _)| *k).collect();
        let mut ready: Vec<(u64, PendingTask)> = Vec::new();
        for key in ready_keys {
            if let Some(tasks) = self.buckets.remove(&key) {
                ready.extend(tasks.into_iter().map(|t| (key, t)));
            }
        }

        match self.retry_policy.drain_order {
            DrainOrder::Fifo => {}
            DrainOrder::Lifo => ready.reverse(),
        }

        let mut stats = CollectStats::default();

        for (retire_after, mut pending) in ready {
            match (pending.task)() {
                Ok(()) => {
                    stats.executed += 1;
                }
                Err(err) => match self.retry_policy.failure_policy {
                    FailurePolicy::DiscardFailedTasks => {
                        stats.escalated += 1;
                        if let Some(hook) = hook {
                            hook(FailureEscalationEvent {
                                device_id,
                                retire_after_value: retire_after,
                                retries: pending.retries,
                                frame_age: frame_index.saturating_sub(pending.first_seen_frame),
                                reason: err.to_string(),
                            });
                        }
                    }
                    FailurePolicy::KeepFailedTasks => {
                        let frame_age = frame_index.saturating_sub(pending.first_seen_frame);
                        if pending.retries >= self.retry_policy.max_retries || frame_age >= self.retry_policy.max_frame_age {
                            stats.escalated += 1;
                            if let Some(hook) = hook {
                                hook(FailureEscalationEvent {
                                    device_id,
                                    retire_after_value: retire_after,
                                    retries: pending.retries,
                                    frame_age,
                                    reason: err.to_string(),
                                });
                            }
                        } else {
                            let backoff = (self.retry_policy.base_retry_backoff_frames << pending.retries.min(32)).max(1);
                            pending.retries += 1;
                            if pending.first_seen_frame == 0 {
                                pending.first_seen_frame = frame_index;
                            }
                            stats.retried += 1;
                            self.retry_buckets.entry(completed_value.saturating_add(backoff)).or_default().push(pending);
                        }
                    }
                },
            }
        }

        stats
    }

    fn is_empty(&self) -> bool {
        self.buckets.is_empty() && self.retry_buckets.is_empty()
    }
}

struct DeviceRecord {
    generation: AtomicU64,
    lifecycle: Mutex<DeviceLifecycle>,
    queue: Mutex<DeletionQueue>,
    submitted_value: AtomicU64,
    per_queue_watermarks: Mutex<HashMap<(u8, u32), u64>>,
    escalation_hook: Mutex<Option<Box<FailureEscalationHook>>>,
    // Guards the final drain so a racing double-unregister can't run it twice.
    teardown: Mutex<OnceQueue>,
}

impl DeviceRecord {
    fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            generation: AtomicU64::new(1),
            lifecycle: Mutex::new(DeviceLifecycle::Registered),
            queue: Mutex::new(DeletionQueue::new(retry_policy)),
            submitted_value: AtomicU64::new(0),
            per_queue_watermarks: Mutex::new(HashMap::new()),
            escalation_hook: Mutex::new(None),
            teardown: Mutex::new(OnceQueue::new()),
        }
    }
}

fn queue_class_tag(class: QueueClass) -> u8 {
    match class {
        QueueClass::Graphics => 0,
        QueueClass::Transfer => 1,
        QueueClass::Compute => 2,
    }
}

static REGISTRY: Lazy<Mutex<HashMap<DeviceId, Arc<DeviceRecord>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

thread_local! {
    static INGRESS: RefCell<HashMap<DeviceId, Vec<(u64, DeletionTask)>>> = RefCell::new(HashMap::new());
}

const INGRESS_FLUSH_THRESHOLD: usize = 32;

fn record_for(device_id: DeviceId) -> Option<Arc<DeviceRecord>> {
    REGISTRY.lock().get(&device_id).cloned()
}

/// Registers (or re-registers) a device, returning its new generation.
pub fn register_device(device_id: DeviceId, retry_policy: RetryPolicy) -> DeviceGeneration {
    let mut registry = REGISTRY.lock();
    match registry.get(&device_id) {
        Some(existing) => {
            let generation = existing.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *existing.lifecycle.lock() = DeviceLifecycle::Registered;
            DeviceGeneration(generation)
        }
        None => {
            registry.insert(device_id, Arc::new(DeviceRecord::new(retry_policy)));
            DeviceGeneration(1)
        }
    }
}

/// Flushes and drops the device's record. Any deferred handle whose
/// closure still captures this generation will destroy immediately
/// instead of enqueuing, since the generation check fails.
pub fn unregister_device(device_id: DeviceId) {
    if let Some(record) = record_for(device_id) {
        *record.lifecycle.lock() = DeviceLifecycle::Unregistering;

        let record_for_job = record.clone();
        record.teardown.lock().push_job(move || {
            flush_ingress(device_id, &record_for_job);
            record_for_job.queue.lock().collect(u64::MAX, u64::MAX, None, device_id);
            *record_for_job.lifecycle.lock() = DeviceLifecycle::Dead;
            Ok(())
        });

        if let Err(err) = record.teardown.lock().execute() {
            log::error!("device {device_id:?} teardown job failed: {err}");
        }
    }
    REGISTRY.lock().remove(&device_id);
}

pub fn set_escalation_hook(device_id: DeviceId, hook: Box<FailureEscalationHook>) {
    if let Some(record) = record_for(device_id) {
        *record.escalation_hook.lock() = Some(hook);
    }
}

/// Advances the device's submitted watermark. Called by
/// `FrameSyncContext::submit` on every successful timeline submission.
pub fn update_submitted_ticket(device_id: DeviceId, value: u64) {
    if let Some(record) = record_for(device_id) {
        record.submitted_value.fetch_max(value, Ordering::SeqCst);
    }
}

pub fn update_submitted_ticket_full(device_id: DeviceId, ticket: SubmissionTicket) {
    if let Some(record) = record_for(device_id) {
        record.submitted_value.fetch_max(ticket.value, Ordering::SeqCst);
        let mut watermarks = record.per_queue_watermarks.lock();
        let key = (queue_class_tag(ticket.queue_class), ticket.queue_family);
        let entry = watermarks.entry(key).or_insert(0);
        *entry = (*entry).max(ticket.value);
    }
}

fn flush_ingress(device_id: DeviceId, record: &DeviceRecord) {
    INGRESS.with(|ingress| {
        if let Some(tasks) = ingress.borrow_mut().remove(&device_id) {
            let mut queue = record.queue.lock();
            for (retire_after, task) in tasks {
                queue.enqueue(retire_after, task);
            }
        }
    });
}

/// Enqueues a closure to run once the device's completed watermark
/// reaches `retire_after`. Buffered thread-locally and flushed either
/// when the local buffer for this device crosses
/// [`INGRESS_FLUSH_THRESHOLD`] or on the next `collect`.
pub fn enqueue_after<F>(device_id: DeviceId, retire_after: u64, task: F)
where
    F: FnMut() -> anyhow::Result<()> + Send + 'static,
{
    let should_flush = INGRESS.with(|ingress| {
        let mut ingress = ingress.borrow_mut();
        let bucket = ingress.entry(device_id).or_default();
        bucket.push((retire_after, Box::new(task)));
        bucket.len() >= INGRESS_FLUSH_THRESHOLD
    });

    if should_flush {
        if let Some(record) = record_for(device_id) {
            flush_ingress(device_id, &record);
        }
    }
}

/// A deferred handle: on drop, enqueues a destroy closure bound to the
/// device generation captured at construction. If the generation no
/// longer matches at enqueue time, the handle destroys immediately — no
/// dangling submission could still reference it.
pub struct DeferredHandle<T: Send + 'static> {
    device_id: DeviceId,
    generation: DeviceGeneration,
    handle: Option<T>,
    destroy_fn: Option<Box<dyn FnOnce(T) + Send>>,
    policy: HandlePolicy,
    violation_policy: InvariantViolationPolicy,
}

impl<T: Send + 'static> DeferredHandle<T> {
    pub fn destroy_now(mut self) {
        if let (Some(handle), Some(destroy_fn)) = (self.handle.take(), self.destroy_fn.take()) {
            destroy_fn(handle);
        }
    }

    pub fn get(&self) -> &T {
        self.handle.as_ref().expect("handle already destroyed")
    }
}

impl<T: Send + 'static> Drop for DeferredHandle<T> {
    fn drop(&mut self) {
        let (Some(handle), Some(destroy_fn)) = (self.handle.take(), self.destroy_fn.take()) else {
            return;
        };

        let retire_after = match self.policy {
            HandlePolicy::ImmediateOnly => {
                destroy_fn(handle);
                return;
            }
            HandlePolicy::Deferred { retire_after } => retire_after,
            HandlePolicy::DeferredBestEffort => {
                let Some(record) = record_for(self.device_id) else {
                    destroy_fn(handle);
                    return;
                };
                record.submitted_value.load(Ordering::SeqCst)
            }
        };

        let Some(record) = record_for(self.device_id) else {
            return handle_invariant_violation(self.violation_policy, handle, destroy_fn, "device not registered");
        };

        if record.generation.load(Ordering::SeqCst) != self.generation.0 {
            destroy_fn(handle);
            return;
        }

        let mut handle = Some(handle);
        let mut destroy_fn = Some(destroy_fn);
        enqueue_after(self.device_id, retire_after, move || {
            if let (Some(handle), Some(destroy_fn)) = (handle.take(), destroy_fn.take()) {
                destroy_fn(handle);
            }
            Ok(())
        });
    }
}

fn handle_invariant_violation<T>(policy: InvariantViolationPolicy, handle: T, destroy_fn: Box<dyn FnOnce(T) + Send>, reason: &str) {
    match policy {
        InvariantViolationPolicy::Abort => panic!("deferred deletion invariant violated: {reason}"),
        InvariantViolationPolicy::ImmediateFallback => destroy_fn(handle),
        InvariantViolationPolicy::ReportAndLeakSafely => {
            log::error!("deferred deletion invariant violated, leaking handle safely: {reason}");
            std::mem::forget(handle);
        }
    }
}

/// Constructs a deferred handle wrapper around a GPU-owned value.
pub fn make_deferred_handle<T: Send + 'static>(
    device_id: DeviceId,
    generation: DeviceGeneration,
    handle: T,
    destroy_fn: impl FnOnce(T) + Send + 'static,
    policy: HandlePolicy,
    violation_policy: InvariantViolationPolicy,
) -> DeferredHandle<T> {
    DeferredHandle {
        device_id,
        generation,
        handle: Some(handle),
        destroy_fn: Some(Box::new(destroy_fn)),
        policy,
        violation_policy,
    }
}

/// Drains every task whose retire value is `<= completed_value`.
pub fn collect(device_id: DeviceId, completed_value: u64, frame_index: u64) -> Result<CollectStats, DeletionError> {
    let Some(record) = record_for(device_id) else {
        return Err(DeletionError::InvariantViolation(
            ErrorContext::new("collect", Subsystem::DeferredDeletion).with_object_hint("device not registered"),
        ));
    };

    flush_ingress(device_id, &record);

    let hook = record.escalation_hook.lock();
    let hook_ref: Option<&FailureEscalationHook> = hook.as_deref();
    let stats = record.queue.lock().collect(completed_value, frame_index, hook_ref, device_id);
    Ok(stats)
}

pub fn flush(device_id: DeviceId, frame_index: u64) -> Result<CollectStats, DeletionError> {
    collect(device_id, u64::MAX, frame_index)
}

pub fn is_drained(device_id: DeviceId) -> bool {
    record_for(device_id).map(|r| r.queue.lock().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn retire_after_gates_destruction() {
        let device_id = DeviceId(u64::MAX - 1);
        let generation = register_device(device_id, RetryPolicy::default());

        let destroyed = Arc::new(AtomicUsize::new(0));
        let destroyed_clone = destroyed.clone();

        let handle = make_deferred_handle(
            device_id,
            generation,
            42u32,
            move |_| {
                destroyed_clone.fetch_add(1, Ordering::SeqCst);
            },
            HandlePolicy::Deferred { retire_after: 2 },
            InvariantViolationPolicy::ImmediateFallback,
        );
        drop(handle);

        collect(device_id, 1, 1).unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);

        collect(device_id, 2, 2).unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        unregister_device(device_id);
    }

    #[test]
    fn stale_generation_destroys_immediately() {
        let device_id = DeviceId(u64::MAX - 2);
        let generation = register_device(device_id, RetryPolicy::default());

        let destroyed = Arc::new(AtomicUsize::new(0));
        let destroyed_clone = destroyed.clone();

        // Re-register bumps the generation before the handle drops.
        register_device(device_id, RetryPolicy::default());

        let handle = make_deferred_handle(
            device_id,
            generation,
            7u32,
            move |_| {
                destroyed_clone.fetch_add(1, Ordering::SeqCst);
            },
            HandlePolicy::Deferred { retire_after: 100 },
            InvariantViolationPolicy::ImmediateFallback,
        );
        drop(handle);

        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        unregister_device(device_id);
    }

    /// Hammers `enqueue_after`/`collect` from many threads against one
    /// device and asserts every task id runs exactly once, with no task
    /// silently dropped.
    #[test]
    fn stress_self_test() {
        use std::collections::HashSet;
        use std::sync::Barrier;
        use std::thread;

        const THREADS: u64 = 8;
        const TASKS_PER_THREAD: u64 = 256;
        const TOTAL: u64 = THREADS * TASKS_PER_THREAD;

        let device_id = DeviceId(u64::MAX - 3);
        register_device(device_id, RetryPolicy::default());

        let seen: Arc<Mutex<HashSet<u64>>> = Arc::new(Mutex::new(HashSet::new()));
        let start = Arc::new(Barrier::new(THREADS as usize + 1));

        let producers: Vec<_> = (0..THREADS)
            .map(|thread_index| {
                let seen = seen.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    for i in 0..TASKS_PER_THREAD {
                        let task_id = thread_index * TASKS_PER_THREAD + i;
                        let seen = seen.clone();
                        // Spread retire_after values so collect has to
                        // sweep several watermarks, not just one.
                        enqueue_after(device_id, task_id % 32, move || {
                            assert!(seen.lock().insert(task_id), "task {task_id} ran more than once");
                            Ok(())
                        });
                    }
                })
            })
            .collect();

        start.wait();
        for producer in producers {
            producer.join().unwrap();
        }

        // Threads buffer into thread-local ingress, flushed lazily; keep
        // collecting at increasing watermarks until everything drains.
        let mut frame = 0u64;
        while !is_drained(device_id) && frame < 1000 {
            collect(device_id, frame, frame).unwrap();
            frame += 1;
        }
        flush(device_id, frame).unwrap();

        assert_eq!(seen.lock().len() as u64, TOTAL, "every enqueued task must run exactly once");
        unregister_device(device_id);
    }
}
