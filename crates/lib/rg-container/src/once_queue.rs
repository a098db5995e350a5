use std::collections::VecDeque;

use parking_lot::{Once, OnceState};
use thiserror::Error;

type OnceJobFunc = Box<dyn FnOnce() -> anyhow::Result<()> + 'static>;

#[derive(Debug, Error)]
pub enum OnceQueueError {
    #[error("once queue execution poisoned on {func_name}")]
    ExecutionPoisoned { func_name: String },
    #[error("once queue job failed on {func_name}: {source}")]
    JobFailed { func_name: String, source: anyhow::Error },
}

struct OnceJob {
    once: Once,
    job: OnceJobFunc,
}

/// Queue of one-shot teardown jobs that must each run exactly once and
/// report whether they succeeded. Used by the deferred deletion service
/// when a device is unregistered: every adapter's final-flush hook goes
/// through here so a double-unregister can't double-run a destructor.
pub struct OnceQueue {
    queue: VecDeque<(OnceJob, String)>,
}

impl Default for OnceQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OnceQueue {
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }

    pub fn push_job<F>(&mut self, func: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        let func_name = std::any::type_name::<F>().to_string();
        self.queue.push_back((
            OnceJob {
                once: Once::new(),
                job: Box::new(func),
            },
            func_name,
        ));
    }

    pub fn execute(&mut self) -> Result<(), OnceQueueError> {
        let drained = self.queue.drain(..);
        Self::execute_impl(drained)
    }

    pub fn execute_backwards(&mut self) -> Result<(), OnceQueueError> {
        let drained = self.queue.drain(..).rev();
        Self::execute_impl(drained)
    }

    fn execute_impl(iter: impl Iterator<Item = (OnceJob, String)>) -> Result<(), OnceQueueError> {
        for (job, name) in iter {
            let job_func = job.job;
            let mut outcome: Option<anyhow::Result<()>> = None;
            job.once.call_once(|| {
                outcome = Some(job_func());
            });

            if let OnceState::Poisoned = job.once.state() {
                return Err(OnceQueueError::ExecutionPoisoned { func_name: name });
            }

            if let Some(Err(source)) = outcome {
                return Err(OnceQueueError::JobFailed { func_name: name, source });
            }
        }

        Ok(())
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }
}
