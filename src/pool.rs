// src/pool.rs
//! Task distribution pool.
//!
//! Decouples heavy per-frame numeric work (large-n force/position batches)
//! from the simulation thread without blocking it:
//!
//! - **Bounded priority queue**: higher priority first, FIFO among equals
//!   (sequence numbers). Submission beyond the bound fails immediately with
//!   [`Error::QueueFull`] — work is never silently dropped.
//! - **Fixed worker set**: each execution unit runs at most one task; when
//!   it finishes it returns to the idle set and takes the highest-priority
//!   queued task.
//! - **Retry with backoff**: a failed task is re-queued at the same priority
//!   after a fixed delay via a scheduled re-submission heap (an explicit
//!   queued → running → {completed | retrying → queued | failed} state
//!   machine, not recursive re-invocation). After the retry budget is
//!   exhausted the failure callback fires exactly once and the handle
//!   resolves with [`Error::TaskFailed`].
//! - **Move semantics**: large numeric payloads are moved into the task and
//!   result buffers are moved back through the handle's channel — no copy
//!   on either side of the transfer.
//!
//! There is no cooperative cancellation: a caller may drop or time out a
//! [`TaskHandle`], but the unit completes the work and the late result is
//! simply discarded with the handle. Feeding a stale result back into world
//! state is a documented caller hazard.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use glam::Vec3;
use parking_lot::{Condvar, Mutex};

use crate::config::ForceMethod;
use crate::forces::{self, ForceField, PairwiseParams};
use crate::{Error, Result};

// ============================================================================
// TASK TYPES
// ============================================================================

/// Task priority. Ties are broken by submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

/// A custom job: called with the current attempt number (0 = first run).
pub type CustomJob =
    Box<dyn Fn(u32) -> std::result::Result<TaskResult, String> + Send + 'static>;

/// A unit of offloaded work. Buffers are owned by the payload — submission
/// transfers them to the execution unit, results transfer back.
pub enum TaskPayload {
    /// Bulk force evaluation: pairwise pass (per `method`) plus field
    /// generators, over parallel position/mass buffers.
    ForceBatch {
        positions: Vec<Vec3>,
        masses: Vec<f32>,
        method: ForceMethod,
        params: PairwiseParams,
        cell_size: f32,
        fields: Vec<ForceField>,
    },
    /// Bulk semi-implicit Euler position/velocity advance.
    IntegrateBatch {
        positions: Vec<Vec3>,
        velocities: Vec<Vec3>,
        forces: Vec<Vec3>,
        inv_masses: Vec<f32>,
        gravity: Vec3,
        damping: f32,
        max_speed: f32,
        dt: f32,
    },
    /// Arbitrary caller-supplied work (e.g. batching many independent
    /// simulations).
    Custom(CustomJob),
}

/// Typed result, moved back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Forces(Vec<Vec3>),
    Integrated {
        positions: Vec<Vec3>,
        velocities: Vec<Vec3>,
    },
    Buffer(Vec<f32>),
    Empty,
}

type SuccessCallback = Box<dyn FnOnce(&TaskResult) + Send + 'static>;
type FailureCallback = Box<dyn FnOnce(&Error) + Send + 'static>;

struct Task {
    id: u64,
    payload: TaskPayload,
    priority: Priority,
    seq: u64,
    /// Attempts already consumed (0 = never run).
    attempts: u32,
    created_at: Instant,
    result_tx: Sender<Result<TaskResult>>,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
}

/// Heap wrapper: max by priority, then FIFO by sequence.
struct QueuedTask(Task);

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.seq == other.0.seq
    }
}
impl Eq for QueuedTask {}
impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.seq.cmp(&self.0.seq))
    }
}

/// Heap wrapper: min by ready instant (earliest retry first).
struct DelayedTask {
    ready_at: Instant,
    task: Task,
}

impl PartialEq for DelayedTask {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at
    }
}
impl Eq for DelayedTask {}
impl PartialOrd for DelayedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for DelayedTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.ready_at.cmp(&self.ready_at)
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Resolves once with the task's final outcome: the moved result buffers on
/// success, or [`Error::TaskFailed`] after the retry budget is exhausted.
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    rx: Receiver<Result<TaskResult>>,
}

impl TaskHandle {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the task completes or finally fails.
    pub fn wait(self) -> Result<TaskResult> {
        self.rx.recv().unwrap_or(Err(Error::PoolShutdown))
    }

    /// Non-blocking poll.
    pub fn try_result(&self) -> Option<Result<TaskResult>> {
        self.rx.try_recv().ok()
    }

    /// Race the task against an external timer. `None` on timeout — the
    /// execution unit still completes the work; the late result stays in
    /// the handle (or is dropped with it) and must not be fed back into
    /// world state after the caller has moved on.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<TaskResult>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(Error::PoolShutdown)),
        }
    }
}

// ============================================================================
// POOL
// ============================================================================

/// Pool sizing and retry policy.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of execution units.
    pub workers: usize,
    /// Maximum queued (ready + delayed-retry) tasks.
    pub max_queue: usize,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Fixed delay before a retry is re-queued.
    pub retry_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_queue: 256,
            max_retries: 2,
            retry_backoff: Duration::from_millis(10),
        }
    }
}

/// Pool counters (monotonic, lock-free reads).
#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
}

struct PoolState {
    queue: BinaryHeap<QueuedTask>,
    delayed: BinaryHeap<DelayedTask>,
    busy: usize,
    shutdown: bool,
}

impl PoolState {
    fn pending(&self) -> usize {
        self.queue.len() + self.delayed.len()
    }

    /// Move every due retry into the ready queue. Returns the next wake-up
    /// instant if retries remain scheduled.
    fn promote_due_retries(&mut self, now: Instant) -> Option<Instant> {
        while let Some(head) = self.delayed.peek() {
            if head.ready_at > now {
                return Some(head.ready_at);
            }
            if let Some(due) = self.delayed.pop() {
                self.queue.push(QueuedTask(due.task));
            }
        }
        None
    }
}

struct PoolShared {
    state: Mutex<PoolState>,
    work_ready: Condvar,
    config: PoolConfig,
    metrics: PoolMetrics,
}

/// Fixed set of concurrent execution units with a bounded priority queue.
///
/// Explicitly owned — construct one at your composition root and hand out
/// `Arc` clones; there is no global instance.
pub struct TaskPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
    next_id: AtomicU64,
    next_seq: AtomicU64,
}

impl TaskPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(Error::config("pool must have at least one worker"));
        }
        if config.max_queue == 0 {
            return Err(Error::config("pool queue bound must be at least 1"));
        }

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: BinaryHeap::new(),
                delayed: BinaryHeap::new(),
                busy: 0,
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            config: config.clone(),
            metrics: PoolMetrics::default(),
        });

        let workers = (0..config.workers)
            .map(|unit| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("swarm-pool-{unit}"))
                    .spawn(move || worker_loop(unit, shared))
                    .map_err(|e| Error::custom(format!("failed to spawn pool worker: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shared,
            workers,
            next_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(0),
        })
    }

    /// Submit a task. Fails synchronously with [`Error::QueueFull`] when the
    /// bound is reached and [`Error::PoolShutdown`] after shutdown.
    pub fn submit(&self, payload: TaskPayload, priority: Priority) -> Result<TaskHandle> {
        self.submit_with_callbacks(payload, priority, None, None)
    }

    /// Like [`submit`](Self::submit), with optional completion callbacks.
    /// The failure callback fires exactly once, only after retries are
    /// exhausted.
    pub fn submit_with_callbacks(
        &self,
        payload: TaskPayload,
        priority: Priority,
        on_success: Option<SuccessCallback>,
        on_failure: Option<FailureCallback>,
    ) -> Result<TaskHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);

        let task = Task {
            id,
            payload,
            priority,
            seq,
            attempts: 0,
            created_at: Instant::now(),
            result_tx: tx,
            on_success,
            on_failure,
        };

        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return Err(Error::PoolShutdown);
            }
            if state.pending() >= self.shared.config.max_queue {
                return Err(Error::QueueFull { limit: self.shared.config.max_queue });
            }
            state.queue.push(QueuedTask(task));
        }
        self.shared.work_ready.notify_one();
        self.shared.metrics.submitted.fetch_add(1, Ordering::Relaxed);

        Ok(TaskHandle { id, rx })
    }

    /// Tasks waiting in the ready or delayed-retry queues.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending()
    }

    /// Tasks currently held by an execution unit.
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().busy
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PoolStats {
        let m = &self.shared.metrics;
        PoolStats {
            submitted: m.submitted.load(Ordering::Relaxed),
            completed: m.completed.load(Ordering::Relaxed),
            failed: m.failed.load(Ordering::Relaxed),
            retried: m.retried.load(Ordering::Relaxed),
        }
    }

    /// Drain remaining work and join every worker. Scheduled retries run
    /// their remaining attempts immediately (backoff is skipped), so every
    /// outstanding handle resolves. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
        }
        self.shared.work_ready.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("pool worker panicked outside task execution");
            }
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// WORKER
// ============================================================================

fn worker_loop(unit: usize, shared: Arc<PoolShared>) {
    log::debug!("pool worker {unit} up");
    loop {
        // Take the highest-priority ready task, waking early for due retries.
        let mut task = {
            let mut state = shared.state.lock();
            loop {
                // After shutdown, scheduled retries skip their backoff: the
                // remaining attempts run immediately so every handle still
                // resolves and every failure callback still fires.
                let next_retry = if state.shutdown {
                    while let Some(due) = state.delayed.pop() {
                        state.queue.push(QueuedTask(due.task));
                    }
                    None
                } else {
                    state.promote_due_retries(Instant::now())
                };
                if let Some(QueuedTask(task)) = state.queue.pop() {
                    state.busy += 1;
                    break task;
                }
                if state.shutdown {
                    log::debug!("pool worker {unit} down");
                    return;
                }
                match next_retry {
                    Some(at) => {
                        shared.work_ready.wait_until(&mut state, at);
                    }
                    None => shared.work_ready.wait(&mut state),
                }
            }
        };

        let started_at = Instant::now();
        let attempt = task.attempts;
        let outcome = catch_unwind(AssertUnwindSafe(|| execute(&task.payload, attempt)))
            .unwrap_or_else(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panic".into());
                Err(reason)
            });
        task.attempts += 1;

        match outcome {
            Ok(result) => {
                log::debug!(
                    "task {} completed on worker {unit} in {:?} (queued {:?}, attempt {})",
                    task.id,
                    started_at.elapsed(),
                    started_at - task.created_at,
                    task.attempts,
                );
                if let Some(callback) = task.on_success.take() {
                    callback(&result);
                }
                let _ = task.result_tx.send(Ok(result));
                shared.metrics.completed.fetch_add(1, Ordering::Relaxed);
                shared.state.lock().busy -= 1;
            }
            Err(reason) if task.attempts <= shared.config.max_retries => {
                log::warn!(
                    "task {} failed on attempt {} ({reason}); retrying in {:?}",
                    task.id,
                    task.attempts,
                    shared.config.retry_backoff,
                );
                shared.metrics.retried.fetch_add(1, Ordering::Relaxed);
                let ready_at = Instant::now() + shared.config.retry_backoff;
                {
                    let mut state = shared.state.lock();
                    state.busy -= 1;
                    state.delayed.push(DelayedTask { task, ready_at });
                }
                // Wake a sleeper so the retry deadline is observed.
                shared.work_ready.notify_one();
            }
            Err(reason) => {
                let error = Error::TaskFailed {
                    id: task.id,
                    attempts: task.attempts,
                    reason,
                };
                log::error!("{error}");
                if let Some(callback) = task.on_failure.take() {
                    callback(&error);
                }
                let _ = task.result_tx.send(Err(error));
                shared.metrics.failed.fetch_add(1, Ordering::Relaxed);
                shared.state.lock().busy -= 1;
            }
        }
    }
}

/// Run one task payload. String errors feed the retry machinery.
fn execute(payload: &TaskPayload, attempt: u32) -> std::result::Result<TaskResult, String> {
    match payload {
        TaskPayload::ForceBatch { positions, masses, method, params, cell_size, fields } => {
            if positions.len() != masses.len() {
                return Err(format!(
                    "force batch length mismatch: {} positions vs {} masses",
                    positions.len(),
                    masses.len()
                ));
            }
            let mut out = vec![Vec3::ZERO; positions.len()];
            match *method {
                ForceMethod::Direct => {
                    forces::accumulate_direct(positions, masses, params, &mut out)
                }
                ForceMethod::Grid => {
                    forces::accumulate_grid(positions, masses, *cell_size, params, &mut out)
                }
                ForceMethod::Hierarchical { theta } => {
                    forces::accumulate_hierarchical(positions, masses, theta, params, &mut out)
                }
            }
            forces::apply_fields(positions, masses, fields, &mut out);
            Ok(TaskResult::Forces(out))
        }
        TaskPayload::IntegrateBatch {
            positions,
            velocities,
            forces: applied,
            inv_masses,
            gravity,
            damping,
            max_speed,
            dt,
        } => {
            let n = positions.len();
            if velocities.len() != n || applied.len() != n || inv_masses.len() != n {
                return Err("integrate batch length mismatch".into());
            }
            let mut out_p = positions.clone();
            let mut out_v = velocities.clone();
            for i in 0..n {
                let mut v = out_v[i] + applied[i] * inv_masses[i] * *dt + *gravity * *dt;
                v *= *damping;
                let speed_sq = v.length_squared();
                if speed_sq > max_speed * max_speed {
                    v *= max_speed / speed_sq.sqrt();
                }
                out_v[i] = v;
                out_p[i] += v * *dt;
            }
            Ok(TaskResult::Integrated { positions: out_p, velocities: out_v })
        }
        TaskPayload::Custom(job) => job(attempt),
    }
}
