//! Worker pool acquired per computation
//!
//! Every parallel computation acquires its own [`ThreadPoolResource`] and
//! shuts it down when finished. There is no process-wide pool: unrelated
//! computations never share workers or queue behind each other.

use crate::core::{Result, SVMError};
use log::{debug, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Number of hardware threads available to this process (at least 1)
pub fn available_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Sizing and teardown settings for a worker pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    /// Worker count; `None` uses one worker per hardware thread
    pub threads: Option<usize>,
    /// Upper bound on how long shutdown waits for outstanding tasks
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: None,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// Set an explicit worker count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Effective worker count, clamped to `[1, P + 2]` for `P` hardware threads
    pub fn resolved_threads(&self) -> usize {
        let available = available_threads();
        match self.threads {
            Some(threads) => threads.clamp(1, available + 2),
            None => available,
        }
    }
}

/// Bounded worker pool owned by a single computation
///
/// Backed by a `rayon` pool with an unbounded queue; idle workers park
/// themselves. Call [`shutdown`](Self::shutdown) when done. Dropping the
/// resource without shutting it down performs the same bounded drain.
pub struct ThreadPoolResource {
    pool: rayon::ThreadPool,
    pending: Arc<AtomicUsize>,
    threads: usize,
    shutdown_timeout: Duration,
    shut_down: bool,
}

impl ThreadPoolResource {
    /// Start a pool sized to the available hardware threads
    pub fn acquire() -> Result<Self> {
        Self::acquire_with(PoolConfig::default())
    }

    /// Start a pool with explicit settings
    pub fn acquire_with(config: PoolConfig) -> Result<Self> {
        let threads = config.resolved_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rtsvm-worker-{i}"))
            .build()
            .map_err(|e| SVMError::ParallelFailure(format!("failed to start worker pool: {e}")))?;

        debug!("Acquired worker pool with {threads} threads");

        Ok(Self {
            pool,
            pending: Arc::new(AtomicUsize::new(0)),
            threads,
            shutdown_timeout: config.shutdown_timeout,
            shut_down: false,
        })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Number of submitted tasks that have not finished yet
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Submit a task that owns all of its data
    pub fn submit<F, R>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let guard = PendingGuard::new(&self.pending);
        self.pool.spawn(move || {
            let _guard = guard;
            let _ = sender.send(panic::catch_unwind(AssertUnwindSafe(task)));
        });
        TaskHandle { receiver }
    }

    /// Run `op` with a [`TaskScope`] whose tasks may borrow from the caller
    ///
    /// Returns once every task submitted through the scope has completed.
    /// The body runs on the calling thread, so it may join handles without
    /// occupying a worker. A panic in the body is reported as
    /// [`SVMError::ParallelFailure`].
    pub fn scope<'scope, OP, R>(&self, op: OP) -> Result<R>
    where
        OP: FnOnce(&TaskScope<'_, 'scope>) -> R,
    {
        let pending = &self.pending;
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.in_place_scope(|scope| {
                op(&TaskScope {
                    inner: scope,
                    pending,
                })
            })
        }))
        .map_err(|payload| {
            SVMError::ParallelFailure(format!("scope panicked: {}", panic_message(&*payload)))
        })
    }

    /// Wait for outstanding tasks and stop the pool
    ///
    /// Polls the pending-task count until it reaches zero or the configured
    /// timeout elapses. A timeout is reported as an error rather than
    /// blocking forever.
    pub fn shutdown(mut self) -> Result<()> {
        self.shut_down = true;
        self.drain()
    }

    fn drain(&self) -> Result<()> {
        let deadline = Instant::now() + self.shutdown_timeout;
        loop {
            let pending = self.pending();
            if pending == 0 {
                debug!("Worker pool with {} threads shut down", self.threads);
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(
                    "Worker pool shutdown timed out after {:?} with {pending} tasks pending",
                    self.shutdown_timeout
                );
                return Err(SVMError::ParallelFailure(format!(
                    "shutdown timed out with {pending} tasks pending"
                )));
            }
            thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }
    }
}

impl Drop for ThreadPoolResource {
    fn drop(&mut self) {
        if !self.shut_down {
            debug!("Worker pool dropped without explicit shutdown");
            let _ = self.drain();
        }
    }
}

/// Submission handle for tasks that borrow data living for `'scope`
pub struct TaskScope<'a, 'scope> {
    inner: &'a rayon::Scope<'scope>,
    pending: &'a Arc<AtomicUsize>,
}

impl<'a, 'scope> TaskScope<'a, 'scope> {
    /// Submit a task; it completes before the enclosing scope returns
    pub fn submit<F, R>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'scope,
        R: Send + 'scope,
    {
        let (sender, receiver) = mpsc::channel();
        let guard = PendingGuard::new(self.pending);
        self.inner.spawn(move |_| {
            let _guard = guard;
            let _ = sender.send(panic::catch_unwind(AssertUnwindSafe(task)));
        });
        TaskHandle { receiver }
    }
}

/// Result of a submitted task
pub struct TaskHandle<R> {
    receiver: mpsc::Receiver<thread::Result<R>>,
}

impl<R> TaskHandle<R> {
    /// Block until the task finishes
    ///
    /// A panicking task is reported as [`SVMError::ParallelFailure`].
    pub fn join(self) -> Result<R> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(SVMError::ParallelFailure(format!(
                "task panicked: {}",
                panic_message(&*payload)
            ))),
            Err(_) => Err(SVMError::ParallelFailure(
                "task was dropped before completing".to_string(),
            )),
        }
    }
}

/// Join every handle, returning the first failure in submission order
///
/// All handles are joined even after a failure, so no task is still
/// writing when the caller observes the error.
pub fn join_all<I>(handles: I) -> Result<()>
where
    I: IntoIterator<Item = TaskHandle<Result<()>>>,
{
    let mut first_error = None;
    for handle in handles {
        if let Err(e) = handle.join().and_then(|result| result) {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Keeps the pending-task counter accurate even if a task unwinds
struct PendingGuard {
    pending: Arc<AtomicUsize>,
}

impl PendingGuard {
    fn new(pending: &Arc<AtomicUsize>) -> Self {
        pending.fetch_add(1, Ordering::AcqRel);
        Self {
            pending: Arc::clone(pending),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
