use crate::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// A worker's submission queue: a FIFO of tasks behind a single mutex, with
/// a condvar releasing blocked poppers.
///
/// The closed flag lives under the same mutex as the deque so shutdown
/// transitions are serialized with queue traffic; `pop` re-checks both
/// emptiness and the flag on every wakeup, which makes spurious wakeups
/// harmless.
///
/// The `try_` variants use `try_lock` and report contention back to the
/// caller instead of waiting. They never fail on a populated, uncontended
/// queue.
pub(crate) struct TaskQueue {
    state: Mutex<State>,
    nonempty_or_closed: Condvar,
}

struct State {
    tasks: VecDeque<Task>,
    closed: bool,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tasks: VecDeque::new(),
                closed: false,
            }),
            nonempty_or_closed: Condvar::new(),
        }
    }

    /// Push without blocking on the mutex. On contention the task is handed
    /// back to the caller.
    pub(crate) fn try_push(&self, task: Task) -> Result<(), Task> {
        match self.state.try_lock() {
            Some(mut state) => {
                state.tasks.push_back(task);
                drop(state);
                self.nonempty_or_closed.notify_one();
                Ok(())
            }
            None => Err(task),
        }
    }

    /// Push, waiting for the mutex if necessary.
    pub(crate) fn push(&self, task: Task) {
        self.state.lock().tasks.push_back(task);
        self.nonempty_or_closed.notify_one();
    }

    /// Pop without blocking on the mutex. `None` on contention or empty.
    pub(crate) fn try_pop(&self) -> Option<Task> {
        self.state.try_lock()?.tasks.pop_front()
    }

    /// Pop, blocking until a task arrives or the queue is closed.
    ///
    /// `None` only when the queue is closed *and* drained; a closed queue
    /// still hands out whatever it holds, in FIFO order.
    pub(crate) fn pop(&self) -> Option<Task> {
        let mut state = self.state.lock();
        while state.tasks.is_empty() && !state.closed {
            self.nonempty_or_closed.wait(&mut state);
        }
        state.tasks.pop_front()
    }

    /// Close the queue and release every blocked popper. Idempotent; once
    /// closed, a queue stays closed.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.nonempty_or_closed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{JoinHandle, new_task};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// A task that records its id when run, so pop order is observable.
    fn probe(log: &Arc<Mutex<Vec<usize>>>, id: usize) -> (Task, JoinHandle<()>) {
        let log = Arc::clone(log);
        new_task(move || log.lock().push(id))
    }

    #[test]
    fn pops_preserve_push_order() {
        let queue = TaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let (task, _handle) = probe(&log, id);
            queue.push(task);
        }
        while let Some(task) = queue.try_pop() {
            task.run();
        }

        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn try_ops_fail_only_under_contention() {
        let queue = TaskQueue::new();
        let (task, _handle) = new_task(|| ());
        queue.push(task);

        // Populated and uncontended: the try variants must succeed.
        let task = queue.try_pop().expect("uncontended try_pop");

        let guard = queue.state.lock();
        let task = queue.try_push(task).expect_err("the mutex is held");
        assert!(queue.try_pop().is_none());
        drop(guard);

        assert!(queue.try_push(task).is_ok());
    }

    #[test]
    fn empty_try_pop_is_none() {
        let queue = TaskQueue::new();
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn pop_blocks_until_a_push_arrives() {
        let queue = Arc::new(TaskQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let popper = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop().expect("woken by a push").run())
        };

        thread::sleep(Duration::from_millis(20));
        let (task, _handle) = probe(&log, 7);
        queue.push(task);

        popper.join().unwrap();
        assert_eq!(*log.lock(), vec![7]);
    }

    #[test]
    fn close_releases_blocked_poppers() {
        let queue = Arc::new(TaskQueue::new());

        let popper = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();

        assert!(popper.join().unwrap().is_none());
    }

    #[test]
    fn a_closed_queue_still_drains_in_order() {
        let queue = TaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in 0..2 {
            let (task, _handle) = probe(&log, id);
            queue.push(task);
        }
        queue.close();
        queue.close(); // idempotent

        queue.pop().expect("closed but populated").run();
        queue.pop().expect("closed but populated").run();
        assert!(queue.pop().is_none());
        assert_eq!(*log.lock(), vec![0, 1]);
    }

    #[test]
    fn dropping_a_loaded_queue_abandons_its_tasks() {
        let queue = TaskQueue::new();
        let (task, handle) = new_task(|| 1);
        queue.push(task);
        drop(queue);

        assert!(handle.join().unwrap_err().is_abandoned());
    }
}
