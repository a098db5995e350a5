//! The persistent worker pool used to record render-graph passes within a
//! schedule level in parallel (see the concurrency model: "One dedicated
//! persistent worker pool records passes within a schedule level in
//! parallel"). Work-stealing deque per worker, global injector for
//! overflow, matching the pattern used elsewhere in this codebase for
//! CPU-side fan-out work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_deque::{Injector, Stealer, Worker as LocalQueue};

pub fn worker_count_default() -> usize {
    (num_cpus::get() / 2).max(1)
}

type JobFunc = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    func: Option<JobFunc>,
    complete: Arc<AtomicBool>,
}

unsafe impl Send for Job {}

impl Job {
    fn execute(&mut self) {
        if let Some(func) = self.func.take() {
            func();
        }
        self.complete.store(true, Ordering::Release);
    }
}

/// Handle to a single submitted job; lets a caller block until that one
/// job (not the whole pool) has finished.
pub struct JobHandle {
    complete: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn wait(&self) {
        while !self.is_complete() {
            thread::yield_now();
        }
    }
}

struct WorkerThread {
    handle: Option<JoinHandle<()>>,
}

pub struct ThreadPool {
    injector: Arc<Injector<Job>>,
    stop: Arc<AtomicBool>,
    workers: Vec<WorkerThread>,
}

impl ThreadPool {
    /// Build and immediately spawn `num_workers` worker threads.
    pub fn new(num_workers: usize) -> Self {
        let injector = Arc::new(Injector::new());
        let stop = Arc::new(AtomicBool::new(false));

        let locals: Vec<LocalQueue<Job>> = (0..num_workers).map(|_| LocalQueue::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(|q| q.stealer()).collect();

        let mut workers = Vec::with_capacity(num_workers);
        for (index, local) in locals.into_iter().enumerate() {
            let injector = injector.clone();
            let stop = stop.clone();
            let coworkers: Vec<Stealer<Job>> = stealers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, s)| s.clone())
                .collect();

            let handle = thread::Builder::new()
                .name(format!("rg-worker-{index}"))
                .spawn(move || Self::run(local, injector, coworkers, stop))
                .expect("failed to spawn render task graph worker thread");

            workers.push(WorkerThread { handle: Some(handle) });
        }

        Self { injector, stop, workers }
    }

    fn run(local: LocalQueue<Job>, injector: Arc<Injector<Job>>, coworkers: Vec<Stealer<Job>>, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::Acquire) {
            let task = local.pop().or_else(|| {
                std::iter::repeat_with(|| {
                    injector
                        .steal_batch_and_pop(&local)
                        .or_else(|| coworkers.iter().map(|s| s.steal()).collect())
                })
                .find(|s| !s.is_retry())
                .and_then(|s| s.success())
            });

            match task {
                Some(mut job) => job.execute(),
                None => thread::yield_now(),
            }
        }
    }

    /// Submit a job to the pool's global queue. Returns a handle the
    /// caller can wait on for just this job.
    pub fn spawn<F>(&self, f: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let complete = Arc::new(AtomicBool::new(false));
        let job = Job {
            func: Some(Box::new(f)),
            complete: complete.clone(),
        };
        self.injector.push(job);
        JobHandle { complete }
    }

    /// Run a batch of closures across the pool and block until all of
    /// them complete. This is the shape the render task graph uses to
    /// record every pass in one schedule level in parallel.
    pub fn scoped_for_each<F>(&self, jobs: Vec<F>)
    where
        F: FnOnce() + Send + 'static,
    {
        let handles: Vec<JobHandle> = jobs.into_iter().map(|f| self.spawn(f)).collect();
        for handle in handles {
            handle.wait();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_every_job_exactly_once() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..256)
            .map(|_| {
                let counter = counter.clone();
                move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
            .collect();

        pool.scoped_for_each(jobs);

        assert_eq!(counter.load(Ordering::Relaxed), 256);
    }
}
