use crate::pool::pool::Pool;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Generates names for worker threads.
#[derive(Clone)]
pub(crate) struct ThreadNameFn(pub(crate) Arc<dyn Fn() -> String + Send + Sync + 'static>);

impl fmt::Debug for ThreadNameFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The closure itself isn't printable; show a placeholder.
        f.debug_tuple("ThreadNameFn").field(&"<function>").finish()
    }
}

/// The default name fn yields worker names with monotonically increasing N:
/// "taskmill-{N}".
fn default_thread_name_fn() -> ThreadNameFn {
    let counter = Arc::new(AtomicUsize::new(0));

    ThreadNameFn(Arc::new(move || {
        let prev = counter.fetch_add(1, Ordering::Relaxed);
        format!("taskmill-{prev}")
    }))
}

/// Worker-thread configuration, kept by the pool so [`Pool::reset`] can
/// relaunch an identical set of workers.
///
/// [`Pool::reset`]: crate::pool::Pool::reset
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) worker_threads: usize,
    pub(crate) thread_name: ThreadNameFn,
    pub(crate) thread_stack_size: Option<usize>,
}

/// Configures and builds a [`Pool`].
///
/// ```
/// use taskmill::Builder;
///
/// let pool = Builder::new()
///     .worker_threads(4)
///     .thread_name("miller")
///     .build();
///
/// assert_eq!(pool.worker_threads(), 4);
/// ```
#[derive(Debug)]
pub struct Builder {
    /// The number of worker threads (one submission queue each).
    ///
    /// Defaults to 1 worker per CPU core.
    worker_threads: Option<usize>,

    /// Name fn used for threads spawned by the pool.
    thread_name: ThreadNameFn,

    /// Stack size used for threads spawned by the pool.
    thread_stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            worker_threads: None,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
        }
    }

    /// Sets the number of worker threads.
    ///
    /// # Panics
    ///
    /// Panics if 0 is passed as an argument.
    pub fn worker_threads(&mut self, val: usize) -> &mut Self {
        assert!(val > 0, "worker threads cannot be set to 0");
        self.worker_threads = Some(val);
        self
    }

    /// Sets the name of threads spawned by the pool.
    ///
    /// The default name is "taskmill-{N}".
    pub fn thread_name(&mut self, val: impl Into<String>) -> &mut Self {
        let val = val.into();
        self.thread_name = ThreadNameFn(Arc::new(move || val.clone()));
        self
    }

    /// Sets a function used to generate the name of threads spawned by the
    /// pool.
    pub fn thread_name_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.thread_name = ThreadNameFn(Arc::new(f));
        self
    }

    /// Sets the stack size (in bytes) for worker threads.
    ///
    /// The actual stack size may be greater than this value if the platform
    /// specifies a minimal stack size.
    pub fn thread_stack_size(&mut self, val: usize) -> &mut Self {
        self.thread_stack_size = Some(val);
        self
    }

    /// Builds the pool, launching its workers.
    ///
    /// Does not return until every worker thread has started.
    pub fn build(&mut self) -> Pool {
        let worker_threads = self.worker_threads.unwrap_or_else(|| {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        });

        Pool::with_config(Config {
            worker_threads,
            thread_name: self.thread_name.clone(),
            thread_stack_size: self.thread_stack_size,
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
