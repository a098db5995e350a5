//! The render task graph's own error enum, composing the lower layers'
//! errors (compile-time validation, scheduling, command arena, transient
//! allocation) with the one failure mode unique to this crate: a pass's
//! own recording callback returning an error.

use rg_rhi::allocator::AllocatorError;
use rg_rhi::error::{ArenaError, SchedulerError};
use thiserror::Error;

use crate::compile::CompileError;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("compile failure: {0}")]
    Compile(#[from] CompileError),
    #[error("scheduler failure: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("command arena failure: {0}")]
    Arena(#[from] ArenaError),
    #[error("transient resource allocation failure: {0}")]
    Allocation(#[from] AllocatorError),
    #[error("pass {0:?} record callback failed: {1}")]
    RecordFailed(crate::pass::PassId, anyhow::Error),
}
