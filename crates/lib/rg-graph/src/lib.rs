//! The render task graph: a per-frame DAG of passes over declared
//! resources, compiled into barriers and a topological schedule, then
//! driven through the submission scheduler on top of `rg-rhi`. This
//! crate knows nothing about how the device, queues or sync primitives
//! are created; it only consumes them.

pub mod compile;
pub mod error;
pub mod graph;
pub mod pass;
pub mod resource;
pub mod scheduler;
pub mod transient;

pub use compile::{AliasAllocation, BarrierBatch, CompileError, CompiledGraph, TransientLifetime};
pub use error::GraphError;
pub use graph::{ExecuteContext, RenderTaskGraph};
pub use pass::{JobEnvelope, PassId, PassNode, PresentRequest, RecordCallback};
pub use resource::{AccessKind, AliasClass, BufferShape, ImageShape, ResourceDescriptor, ResourceId, ResourceKind, ResourceUsage};
pub use scheduler::{
    DependencyEdge, FrameExecutionResult, JobId, JobRequest, PresentOutcome, QueueSet, SchedulerPolicy, SubmissionScheduler,
};
pub use transient::{BackingHandle, TransientResourceNursery};
