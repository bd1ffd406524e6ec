//! Bounded worker pool with keyed supersession and priority dispatch.
//!
//! Jobs wait in a priority queue until [`JobPool::poll`] hands them to a
//! `rayon` thread pool of fixed size. At most `capacity` jobs are dispatched at
//! once; the rest stay queued without limit. A job submitted under a source
//! key replaces that key's queued (not yet dispatched) job. Dispatched work
//! always runs to completion; stale results are the caller's to ignore.
//!
//! Every call on the pool is non-blocking.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Lower values dispatch first.
pub type Priority = u32;

/// Error type for job pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The job has not finished yet; poll again later.
    #[error("Job result not ready")]
    NotReady,

    /// The job was replaced by a newer submission before it started.
    #[error("Job superseded before dispatch")]
    Superseded,

    /// The pool was terminated.
    #[error("Job pool terminated")]
    Terminated,

    /// The job's work panicked.
    #[error("Job panicked: {0}")]
    JobPanicked(String),

    /// The worker threads could not be started.
    #[error("Failed to build worker pool: {0}")]
    Build(#[from] ThreadPoolBuildError),
}

// ─── Job Handles ────────────────────────────────────────────────────

/// Lifecycle of one submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Dispatched,
    Ready,
    Failed,
    Superseded,
    Abandoned,
}

impl JobState {
    /// No further transitions happen from this state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Queued | JobState::Dispatched)
    }
}

enum Slot<T> {
    Queued,
    Dispatched,
    Ready(Arc<T>),
    Failed(String),
    Superseded,
    Abandoned,
}

struct JobCell<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> JobCell<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Queued),
        }
    }

    fn state(&self) -> JobState {
        match *self.slot.lock() {
            Slot::Queued => JobState::Queued,
            Slot::Dispatched => JobState::Dispatched,
            Slot::Ready(_) => JobState::Ready,
            Slot::Failed(_) => JobState::Failed,
            Slot::Superseded => JobState::Superseded,
            Slot::Abandoned => JobState::Abandoned,
        }
    }

    /// Move to `next` only from `from`.
    fn transition(&self, from: JobState, next: Slot<T>) -> bool {
        let mut slot = self.slot.lock();
        let current = match *slot {
            Slot::Queued => JobState::Queued,
            Slot::Dispatched => JobState::Dispatched,
            _ => return false,
        };
        if current != from {
            return false;
        }
        *slot = next;
        true
    }

    fn abandon(&self) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Queued | Slot::Dispatched) {
            *slot = Slot::Abandoned;
        }
    }
}

/// Caller's view of a submitted job.
pub struct JobHandle<T> {
    cell: Arc<JobCell<T>>,
}

impl<T> Clone for JobHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> std::fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl<T> JobHandle<T> {
    /// Current lifecycle state. Non-blocking.
    pub fn state(&self) -> JobState {
        self.cell.state()
    }

    /// The job reached a final state. Non-blocking.
    pub fn ready(&self) -> bool {
        self.state().is_terminal()
    }

    /// The job's output.
    ///
    /// Fails with [`PoolError::NotReady`] until [`ready`](Self::ready) is true.
    pub fn get(&self) -> Result<Arc<T>, PoolError> {
        match &*self.cell.slot.lock() {
            Slot::Queued | Slot::Dispatched => Err(PoolError::NotReady),
            Slot::Ready(out) => Ok(Arc::clone(out)),
            Slot::Failed(msg) => Err(PoolError::JobPanicked(msg.clone())),
            Slot::Superseded => Err(PoolError::Superseded),
            Slot::Abandoned => Err(PoolError::Terminated),
        }
    }
}

// ─── Pool ───────────────────────────────────────────────────────────

type Work<T> = Box<dyn FnOnce() -> T + Send + 'static>;

struct Queued<K, T> {
    key: Option<K>,
    cell: Arc<JobCell<T>>,
    work: Work<T>,
}

/// Counters for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    /// Queued jobs replaced by a newer submission under the same key.
    pub superseded: u64,
    /// Queued jobs removed by [`JobPool::cancel`].
    pub cancelled: u64,
    pub dispatched: u64,
}

/// Worker pool keyed by `K`, producing `T`.
pub struct JobPool<K, T> {
    capacity: usize,
    next_seq: u64,
    queue: BTreeMap<(Priority, u64), Queued<K, T>>,
    keyed: HashMap<K, (Priority, u64)>,
    dispatched: Vec<Arc<JobCell<T>>>,
    workers: Option<ThreadPool>,
    stats: PoolStats,
}

impl<K, T> JobPool<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    T: Send + Sync + 'static,
{
    /// Start `capacity` workers (at least one).
    ///
    /// # Errors
    ///
    /// [`PoolError::Build`] if the worker threads cannot be spawned.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        let capacity = capacity.max(1);
        let workers = ThreadPoolBuilder::new()
            .num_threads(capacity)
            .thread_name(|i| format!("reach-worker-{i}"))
            .build()?;
        debug!(capacity, "job pool started");
        Ok(Self {
            capacity,
            next_seq: 0,
            queue: BTreeMap::new(),
            keyed: HashMap::new(),
            dispatched: Vec::new(),
            workers: Some(workers),
            stats: PoolStats::default(),
        })
    }

    /// Queue `work`, replacing any queued job with the same `key`.
    ///
    /// The replaced job's handle reports [`JobState::Superseded`]. A job
    /// under `key` that is already dispatched is left running.
    ///
    /// # Errors
    ///
    /// [`PoolError::Terminated`] after [`terminate`](Self::terminate).
    pub fn submit<F>(&mut self, work: F, key: Option<K>, priority: Priority) -> Result<JobHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_terminated() {
            return Err(PoolError::Terminated);
        }
        if let Some(k) = &key {
            if let Some(pos) = self.keyed.remove(k) {
                if let Some(old) = self.queue.remove(&pos) {
                    old.cell.transition(JobState::Queued, Slot::Superseded);
                    self.stats.superseded += 1;
                    trace!(key = ?k, "superseded queued job");
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let cell = Arc::new(JobCell::new());
        if let Some(k) = &key {
            self.keyed.insert(k.clone(), (priority, seq));
        }
        self.queue.insert(
            (priority, seq),
            Queued {
                key,
                cell: Arc::clone(&cell),
                work: Box::new(work),
            },
        );
        self.stats.submitted += 1;
        Ok(JobHandle { cell })
    }

    /// Move the queued job under `key` to `priority`, keeping its place
    /// among equal priorities. Returns false if no such job is queued.
    pub fn reprioritize(&mut self, key: &K, priority: Priority) -> bool {
        let Some(pos) = self.keyed.get(key).copied() else {
            return false;
        };
        if pos.0 == priority {
            return true;
        }
        let Some(job) = self.queue.remove(&pos) else {
            return false;
        };
        let next = (priority, pos.1);
        self.queue.insert(next, job);
        self.keyed.insert(key.clone(), next);
        true
    }

    /// Remove the queued job under `key` without running it. Its handle
    /// reports [`JobState::Superseded`]. Returns false if nothing under
    /// `key` is queued; dispatched jobs are never cancelled.
    pub fn cancel(&mut self, key: &K) -> bool {
        let Some(pos) = self.keyed.remove(key) else {
            return false;
        };
        let Some(job) = self.queue.remove(&pos) else {
            return false;
        };
        job.cell.transition(JobState::Queued, Slot::Superseded);
        self.stats.cancelled += 1;
        trace!(key = ?key, "cancelled queued job");
        true
    }

    /// Drop finished jobs from the dispatched set, then dispatch queued
    /// jobs until `capacity` are in flight.
    ///
    /// # Errors
    ///
    /// [`PoolError::Terminated`] after [`terminate`](Self::terminate).
    pub fn poll(&mut self) -> Result<(), PoolError> {
        let Some(workers) = self.workers.as_ref() else {
            return Err(PoolError::Terminated);
        };
        self.dispatched.retain(|cell| !cell.state().is_terminal());

        while self.dispatched.len() < self.capacity {
            let Some((_, job)) = self.queue.pop_first() else {
                break;
            };
            if let Some(k) = &job.key {
                self.keyed.remove(k);
            }
            if !job.cell.transition(JobState::Queued, Slot::Dispatched) {
                continue;
            }
            let cell = Arc::clone(&job.cell);
            let work = job.work;
            workers.spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(work));
                let next = match outcome {
                    Ok(out) => Slot::Ready(Arc::new(out)),
                    Err(payload) => {
                        let msg = panic_message(payload.as_ref());
                        warn!(panic = %msg, "job panicked");
                        Slot::Failed(msg)
                    }
                };
                cell.transition(JobState::Dispatched, next);
            });
            self.dispatched.push(job.cell);
            self.stats.dispatched += 1;
        }
        Ok(())
    }
}

impl<K, T> JobPool<K, T> {
    /// Most jobs dispatched at once; also the worker thread count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// [`terminate`](Self::terminate) has run.
    pub fn is_terminated(&self) -> bool {
        self.workers.is_none()
    }

    /// Jobs waiting for a worker.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Jobs handed to workers and not yet observed finished by `poll`.
    pub fn dispatched_len(&self) -> usize {
        self.dispatched.len()
    }

    /// Counters since the pool started.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Stop the pool. Queued and in-flight jobs are abandoned, workers exit
    /// after their current job, and later submissions fail. Idempotent;
    /// never waits on a worker.
    pub fn terminate(&mut self) {
        let Some(workers) = self.workers.take() else {
            return;
        };
        // Dropping a rayon pool signals its threads without joining them.
        drop(workers);
        let queued = self.queue.len();
        for (_, job) in std::mem::take(&mut self.queue) {
            job.cell.abandon();
        }
        self.keyed.clear();
        for cell in self.dispatched.drain(..) {
            cell.abandon();
        }
        debug!(queued, "job pool terminated");
    }
}

impl<K, T> Drop for JobPool<K, T> {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_ready<T>(handle: &JobHandle<T>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.ready() {
            assert!(Instant::now() < deadline, "job did not finish");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn get_before_ready_is_not_ready() {
        let mut pool: JobPool<u32, u32> = JobPool::new(1).unwrap();
        let handle = pool.submit(|| 7, None, 0).unwrap();
        assert_eq!(handle.state(), JobState::Queued);
        assert!(matches!(handle.get(), Err(PoolError::NotReady)));
        pool.poll().unwrap();
        wait_ready(&handle);
        assert_eq!(*handle.get().unwrap(), 7);
    }

    #[test]
    fn lower_priority_value_dispatches_first() {
        let mut pool: JobPool<u32, u32> = JobPool::new(1).unwrap();
        let gate = Arc::new(Mutex::new(()));
        let guard = gate.lock();
        let g = Arc::clone(&gate);
        let blocker = pool
            .submit(
                move || {
                    let _g = g.lock();
                    0
                },
                None,
                0,
            )
            .unwrap();
        pool.poll().unwrap();
        let late = pool.submit(|| 1, None, 50).unwrap();
        let early = pool.submit(|| 2, None, 5).unwrap();
        pool.poll().unwrap();
        assert_eq!(late.state(), JobState::Queued);
        assert_eq!(early.state(), JobState::Queued);
        drop(guard);
        wait_ready(&blocker);
        pool.poll().unwrap();
        assert_ne!(early.state(), JobState::Queued);
        assert_eq!(late.state(), JobState::Queued);
    }

    #[test]
    fn panicking_job_reports_failure() {
        let mut pool: JobPool<u32, u32> = JobPool::new(1).unwrap();
        let handle = pool.submit(|| panic!("boom"), None, 0).unwrap();
        pool.poll().unwrap();
        wait_ready(&handle);
        match handle.get() {
            Err(PoolError::JobPanicked(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
        // The worker survives the panic.
        let next = pool.submit(|| 3, None, 0).unwrap();
        pool.poll().unwrap();
        wait_ready(&next);
        assert_eq!(*next.get().unwrap(), 3);
    }

    #[test]
    fn reprioritize_moves_queued_job() {
        let mut pool: JobPool<&'static str, u32> = JobPool::new(1).unwrap();
        pool.submit(|| 0, Some("a"), 10).unwrap();
        assert!(pool.reprioritize(&"a", 1));
        assert!(!pool.reprioritize(&"missing", 1));
        assert_eq!(pool.queued_len(), 1);
    }

    #[test]
    fn cancel_removes_only_queued_jobs() {
        let mut pool: JobPool<&'static str, u32> = JobPool::new(1).unwrap();
        let queued = pool.submit(|| 1, Some("idle"), 0).unwrap();
        assert!(pool.cancel(&"idle"));
        assert!(!pool.cancel(&"idle"));
        assert_eq!(pool.queued_len(), 0);
        assert_eq!(queued.state(), JobState::Superseded);
        assert_eq!(pool.stats().cancelled, 1);

        let running = pool.submit(|| 2, Some("busy"), 0).unwrap();
        pool.poll().unwrap();
        assert!(!pool.cancel(&"busy"));
        wait_ready(&running);
        assert_eq!(*running.get().unwrap(), 2);
    }

    #[test]
    fn workers_carry_pool_names() {
        let mut pool: JobPool<u32, String> = JobPool::new(2).unwrap();
        let handle = pool
            .submit(
                || thread::current().name().unwrap_or_default().to_string(),
                None,
                0,
            )
            .unwrap();
        pool.poll().unwrap();
        wait_ready(&handle);
        assert!(handle.get().unwrap().starts_with("reach-worker-"));
    }

    #[test]
    fn terminate_is_idempotent_and_final() {
        let mut pool: JobPool<u32, u32> = JobPool::new(2).unwrap();
        let handle = pool.submit(|| 1, Some(1), 0).unwrap();
        pool.terminate();
        pool.terminate();
        assert!(pool.is_terminated());
        assert_eq!(handle.state(), JobState::Abandoned);
        assert!(matches!(handle.get(), Err(PoolError::Terminated)));
        assert!(matches!(pool.submit(|| 2, None, 0), Err(PoolError::Terminated)));
        assert!(matches!(pool.poll(), Err(PoolError::Terminated)));
    }
}
