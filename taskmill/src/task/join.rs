use crate::task::Result;
use crate::task::channel::Channel;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// An owned permission to collect the output of a pooled task.
///
/// Created by [`Pool::spawn`]. The task starts running as soon as a worker
/// picks it up, whether or not the handle is ever consulted; dropping the
/// handle detaches the task, which still runs but whose output is discarded.
///
/// The handle stays valid after the pool itself is gone:
///
/// ```
/// use taskmill::Pool;
///
/// let handle = {
///     let pool = Pool::new(2);
///     pool.spawn(|| "alive")
/// };
///
/// assert_eq!(handle.join().unwrap(), "alive");
/// ```
///
/// The outcome can be collected exactly once. [`join`] consumes the handle;
/// [`try_join`] and [`join_timeout`] leave it in place, but once one of them
/// has returned the outcome, any later collection attempt yields a
/// [`JoinError`] marked consumed.
///
/// [`Pool::spawn`]: crate::pool::Pool::spawn
/// [`join`]: JoinHandle::join
/// [`try_join`]: JoinHandle::try_join
/// [`join_timeout`]: JoinHandle::join_timeout
/// [`JoinError`]: crate::task::JoinError
pub struct JoinHandle<T> {
    channel: Arc<Channel<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(channel: Arc<Channel<T>>) -> Self {
        Self { channel }
    }

    /// Blocks until the task delivers its output.
    ///
    /// Returns the closure's return value, or a [`JoinError`] if the closure
    /// panicked, the task was dropped before running, or the output was
    /// already taken through [`try_join`] / [`join_timeout`].
    ///
    /// [`JoinError`]: crate::task::JoinError
    /// [`try_join`]: JoinHandle::try_join
    /// [`join_timeout`]: JoinHandle::join_timeout
    pub fn join(self) -> Result<T> {
        self.channel.take_blocking()
    }

    /// Collects the output if the task has already finished, without
    /// blocking. `None` means the task is still pending.
    pub fn try_join(&mut self) -> Option<Result<T>> {
        self.channel.try_take()
    }

    /// Blocks up to `timeout` for the output. `None` means the task is still
    /// pending; the task itself is not disturbed by the timeout.
    pub fn join_timeout(&mut self, timeout: Duration) -> Option<Result<T>> {
        self.channel.take_timeout(timeout)
    }

    /// Whether the task has published an outcome.
    pub fn is_finished(&self) -> bool {
        self.channel.is_ready()
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}
