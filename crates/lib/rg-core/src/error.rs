//! Shared error-reporting scaffolding used by every fallible operation in
//! the render task graph core. Every component-specific error enum
//! (`DeviceError`, `SchedulerError`, `SyncError`, `ArenaError`,
//! `DeletionError`, ...) embeds an [`ErrorContext`] in its variants instead
//! of re-deriving operation name / subsystem / retryability bookkeeping on
//! its own.

use std::panic::Location;

/// Coarse subsystem tag attached to every error, so a diagnostic sink can
/// group/filter without parsing message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Device,
    Queue,
    Scheduler,
    SyncContext,
    CommandArena,
    DeferredDeletion,
    RenderTaskGraph,
    Allocator,
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Subsystem::Device => "device",
            Subsystem::Queue => "queue",
            Subsystem::Scheduler => "scheduler",
            Subsystem::SyncContext => "sync_context",
            Subsystem::CommandArena => "command_arena",
            Subsystem::DeferredDeletion => "deferred_deletion",
            Subsystem::RenderTaskGraph => "render_task_graph",
            Subsystem::Allocator => "allocator",
        };
        f.write_str(name)
    }
}

/// The record every fallible operation in this crate attaches to its
/// error: operation name, subsystem, an optional object hint (a debug
/// label), the frame this happened on if known, whether the caller may
/// retry, and the call site.
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: &'static str,
    pub subsystem: Subsystem,
    pub object_hint: Option<String>,
    pub frame_index: Option<u32>,
    pub retryable: bool,
    pub location: &'static Location<'static>,
}

impl ErrorContext {
    #[track_caller]
    pub fn new(operation: &'static str, subsystem: Subsystem) -> Self {
        Self {
            operation,
            subsystem,
            object_hint: None,
            frame_index: None,
            retryable: false,
            location: Location::caller(),
        }
    }

    pub fn with_object_hint(mut self, hint: impl Into<String>) -> Self {
        self.object_hint = Some(hint.into());
        self
    }

    pub fn with_frame_index(mut self, frame_index: u32) -> Self {
        self.frame_index = Some(frame_index);
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}::{}",
            self.subsystem, self.operation
        )?;
        if let Some(hint) = &self.object_hint {
            write!(f, " ({hint})")?;
        }
        if let Some(frame) = self.frame_index {
            write!(f, " [frame {frame}]")?;
        }
        write!(f, " at {}", self.location)
    }
}

/// The pluggable diagnostic sink mentioned in the error handling design:
/// every failure is reported through this trait in addition to being
/// returned as an `Err`. Defaults to stderr; tests and embedders may
/// install their own (e.g. an in-memory ring buffer).
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, context: &ErrorContext, message: &str);
}

pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&self, context: &ErrorContext, message: &str) {
        eprintln!("[{}] {message} ({context})", context.subsystem);
    }
}

lazy_static::lazy_static! {
    static ref SINK: parking_lot::RwLock<Box<dyn DiagnosticSink>> =
        parking_lot::RwLock::new(Box::new(StderrSink));
}

/// Replace the process-wide diagnostic sink.
pub fn set_diagnostic_sink(sink: Box<dyn DiagnosticSink>) {
    *SINK.write() = sink;
}

/// Report a failure through the currently installed diagnostic sink.
pub fn report(context: &ErrorContext, message: &str) {
    SINK.read().report(context, message);
}
