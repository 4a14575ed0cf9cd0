use crate::pool::builder::{Builder, Config};
use crate::pool::queue::TaskQueue;
use crate::pool::worker::{self, Worker};
use crate::task::{self, JoinHandle};
use anyhow::{Result, anyhow};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

/// State shared between the pool handle and its workers.
pub(crate) struct Shared {
    /// One submission queue per worker, index-for-index.
    pub(crate) queues: Box<[TaskQueue]>,

    /// Tasks pushed but not yet popped, across all queues. Incremented
    /// strictly before a successful push and decremented strictly after a
    /// successful pop, so zero means "no queue holds work" even while
    /// invocations are still running. Workers rely on this to decide when
    /// the post-close drain is finished.
    pub(crate) in_flight: AtomicUsize,

    /// Workers that have not yet exited their run loop, with a condvar
    /// signaled at zero so [`Pool::wait`] can block instead of spinning.
    live_workers: Mutex<usize>,
    all_exited: Condvar,
}

impl Shared {
    fn new(worker_threads: usize) -> Self {
        Self {
            queues: (0..worker_threads).map(|_| TaskQueue::new()).collect(),
            in_flight: AtomicUsize::new(0),
            live_workers: Mutex::new(worker_threads),
            all_exited: Condvar::new(),
        }
    }

    pub(crate) fn worker_exited(&self) {
        let mut live = self.live_workers.lock();
        *live -= 1;
        if *live == 0 {
            drop(live);
            self.all_exited.notify_all();
        }
    }

    fn wait_all_exited(&self) {
        let mut live = self.live_workers.lock();
        while *live > 0 {
            self.all_exited.wait(&mut live);
        }
    }
}

/// A work-stealing pool of worker threads for one-shot blocking tasks.
///
/// Each worker owns one FIFO submission queue. [`spawn`] rotates new tasks
/// across the queues, and workers that find their own queue empty steal from
/// their peers, so a single expensive task does not back up the work queued
/// behind it.
///
/// Shutdown is cooperative: [`close`] announces that no further tasks are
/// coming, after which the workers finish everything already submitted
/// (stealing across queues as needed) and exit. [`wait`] blocks until they
/// have. Dropping the pool performs the same close-and-drain, so submitted
/// work is never silently discarded.
///
/// ```
/// use taskmill::Pool;
///
/// let pool = Pool::new(4);
/// let handles: Vec<_> = (0..100).map(|i| pool.spawn(move || i * i)).collect();
///
/// pool.close();
/// pool.wait();
///
/// for (i, handle) in handles.into_iter().enumerate() {
///     assert_eq!(handle.join().unwrap(), i * i);
/// }
/// ```
///
/// [`spawn`]: Pool::spawn
/// [`close`]: Pool::close
/// [`wait`]: Pool::wait
pub struct Pool {
    shared: Arc<Shared>,

    /// Round-robin start index for submission routing. Submitter side only;
    /// workers never touch it.
    next_queue: AtomicUsize,

    /// Set by [`Pool::close`]. Spawning afterwards is a caller bug.
    closed: AtomicBool,

    /// Kept so [`Pool::reset`] can relaunch an identical worker set.
    config: Config,

    handles: Vec<thread::JoinHandle<()>>,
}

impl Pool {
    /// Creates a pool with `worker_threads` workers, clamped to at least 1.
    ///
    /// Does not return until every worker thread has started. See
    /// [`Builder`] for thread naming and stack-size knobs.
    pub fn new(worker_threads: usize) -> Self {
        Builder::new().worker_threads(worker_threads.max(1)).build()
    }

    /// Returns a builder for a customized pool.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn with_config(config: Config) -> Self {
        let (shared, handles) = launch_workers(&config);

        Self {
            shared,
            next_queue: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            config,
            handles,
        }
    }

    /// Number of worker threads (and submission queues).
    pub fn worker_threads(&self) -> usize {
        self.shared.queues.len()
    }

    /// Submits a closure, returning the handle that will carry its output.
    ///
    /// Starting from a rotating index, every queue is tried without
    /// blocking (ten passes over the pool); only if each attempt hits mutex
    /// contention does the submission fall back to a blocking push on the
    /// starting queue. Submitting therefore costs at most one mutex
    /// acquisition, and concurrent submitters spread their load across all
    /// queues.
    ///
    /// A panic inside `f` does not disturb the pool: it is captured and
    /// re-surfaces as a [`JoinError`] when the handle is joined.
    ///
    /// # Panics
    ///
    /// Panics if the pool was closed. Submitting after [`Pool::close`] is a
    /// caller bug; the pool itself remains intact.
    ///
    /// [`JoinError`]: crate::task::JoinError
    pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        assert!(
            !self.closed.load(Ordering::Acquire),
            "spawn called on a closed pool"
        );

        let (task, handle) = task::new_task(f);
        let n = self.shared.queues.len();
        let idx = self.next_queue.fetch_add(1, Ordering::Relaxed);

        let mut task = task;
        for k in 0..10 * n {
            // Speculative accounting: the in-flight count must rise before
            // a push and fall only after a pop, so count first and roll
            // back if the queue was contended.
            self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
            match self.shared.queues[(idx + k) % n].try_push(task) {
                Ok(()) => return handle,
                Err(returned) => {
                    self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                    task = returned;
                }
            }
        }

        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        self.shared.queues[idx % n].push(task);
        handle
    }

    /// Signals that no further tasks will be submitted. Idempotent.
    ///
    /// Workers finish everything already queued, stealing across queues as
    /// needed, and then exit. Use [`Pool::wait`] to block until they have.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for queue in self.shared.queues.iter() {
            queue.close();
        }
    }

    /// Blocks until every queued task has run and every worker has exited.
    ///
    /// Workers only exit once the pool is closed, so call [`Pool::close`]
    /// first; otherwise this waits until some other thread closes the pool.
    pub fn wait(&self) {
        self.shared.wait_all_exited();
    }

    /// Tears the current workers down and launches a fresh set.
    ///
    /// The pool is closed, the workers drain it and are joined, and new
    /// workers start over empty queues with the in-flight count at zero.
    /// The pool then accepts submissions again. Any task that was somehow
    /// left queued (a submission racing the close on another thread) is
    /// dropped and its handle reports abandonment.
    ///
    /// Taking `&mut self` statically keeps other threads from submitting
    /// mid-reset.
    pub fn reset(&mut self) -> Result<()> {
        self.close();
        self.join_workers()?;

        let (shared, handles) = launch_workers(&self.config);
        self.shared = shared;
        self.handles = handles;
        self.next_queue.store(0, Ordering::Relaxed);
        self.closed.store(false, Ordering::Release);

        Ok(())
    }

    fn join_workers(&mut self) -> Result<()> {
        let panicked = self
            .handles
            .drain(..)
            .map(|handle| handle.join())
            .filter(|res| res.is_err())
            .count();

        if panicked == 0 {
            Ok(())
        } else {
            Err(anyhow!("{} worker thread(s) panicked", panicked))
        }
    }
}

impl Drop for Pool {
    /// Closes the pool and joins every worker. The workers' shutdown sweep
    /// drains the queues first, so destruction never strands submitted
    /// work.
    fn drop(&mut self) {
        self.close();

        if let Err(e) = self.join_workers() {
            // Task panics are captured onto handles, so a dead worker means
            // a failure outside user code; nothing left to recover here.
            tracing::error!("pool shutdown: {e}");
        }
    }
}

fn launch_workers(config: &Config) -> (Arc<Shared>, Vec<thread::JoinHandle<()>>) {
    let shared = Arc::new(Shared::new(config.worker_threads));

    let barrier = Arc::new(Barrier::new(config.worker_threads + 1));
    let handles = (0..config.worker_threads)
        .map(|id| {
            let worker = Worker::new(id, Arc::clone(&shared));
            worker::spawn_worker_thread(worker, config, Arc::clone(&barrier))
        })
        .collect();

    // Spawning threads is asynchronous; don't hand the pool out before all
    // of its workers are up.
    barrier.wait();

    (shared, handles)
}
