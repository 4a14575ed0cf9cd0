use crate::task::JoinError;
use crate::task::channel::{Channel, Completion};
use crate::task::join::JoinHandle;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A queued unit of work: one type-erased closure bound to the write half of
/// its handle's channel.
///
/// Every queue slot has this shape no matter what the underlying closure
/// returns; the erasure cost is paid once, at construction. A task runs at
/// most once, since `run` consumes it, and if it is dropped without running,
/// the completion half reports the abandonment to the paired handle.
pub(crate) struct Task {
    cell: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Execute the stored closure.
    ///
    /// A panic inside the closure is captured into the paired channel and
    /// never unwinds into the caller, so the worker loop survives any
    /// submitted workload.
    pub(crate) fn run(self) {
        (self.cell)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// Type-erases `f`, pairing it with the handle that will observe its output.
pub(crate) fn new_task<F, T>(f: F) -> (Task, JoinHandle<T>)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let channel = Channel::new();
    let completion = Completion::new(Arc::clone(&channel));
    let handle = JoinHandle::new(channel);

    let cell = Box::new(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(JoinError::panicked);
        completion.complete(outcome);
    });

    (Task { cell }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_a_task_completes_its_handle() {
        let (task, handle) = new_task(|| 6 * 7);
        task.run();
        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn a_panic_is_captured_not_propagated() {
        let (task, handle) = new_task(|| -> () { panic!("boom") });

        // Does not unwind into us.
        task.run();

        let err = handle.join().unwrap_err();
        assert!(err.is_panic());
        assert_eq!(err.into_panic().downcast_ref::<&str>(), Some(&"boom"));
    }

    #[test]
    fn dropping_an_unrun_task_abandons_its_handle() {
        let (task, handle) = new_task(|| 1);
        drop(task);

        let err = handle.join().unwrap_err();
        assert!(err.is_abandoned());
    }
}
