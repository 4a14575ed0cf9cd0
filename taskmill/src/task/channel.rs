use crate::task::{JoinError, Result};
use parking_lot::{Condvar, Mutex};
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Single-shot outcome slot connecting a running task (writer) to its
/// [`JoinHandle`] (reader).
///
/// The slot only ever moves forward: `Pending` → `Ready` → `Consumed`. The
/// first publish wins and consuming is final, so at most one outcome is ever
/// written and at most one reader ever observes it.
///
/// [`JoinHandle`]: crate::task::JoinHandle
pub(crate) struct Channel<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

enum Slot<T> {
    Pending,
    Ready(Result<T>),
    Consumed,
}

impl<T> Channel<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
        })
    }

    /// Publish the outcome and wake every waiter. A second publish is a
    /// no-op; the slot never transitions out of `Pending` twice.
    pub(crate) fn publish(&self, outcome: Result<T>) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Ready(outcome);
            drop(slot);
            self.ready.notify_all();
        }
    }

    /// Block until an outcome is available, then take it.
    pub(crate) fn take_blocking(&self) -> Result<T> {
        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.ready.wait(&mut slot);
        }
        take(&mut slot)
    }

    /// Take the outcome if one is available, without blocking.
    pub(crate) fn try_take(&self) -> Option<Result<T>> {
        let mut slot = self.slot.lock();
        match *slot {
            Slot::Pending => None,
            _ => Some(take(&mut slot)),
        }
    }

    /// Block up to `timeout` for an outcome. `None` means the writer has not
    /// published yet; the slot is left untouched.
    pub(crate) fn take_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let deadline = Instant::now() + timeout;

        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Pending) {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                // The publish may have raced the timeout; only give up if
                // the slot is still pending.
                if matches!(*slot, Slot::Pending) {
                    return None;
                }
                break;
            }
        }
        Some(take(&mut slot))
    }

    pub(crate) fn is_ready(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Pending)
    }
}

fn take<T>(slot: &mut Slot<T>) -> Result<T> {
    match mem::replace(slot, Slot::Consumed) {
        Slot::Ready(outcome) => outcome,
        Slot::Consumed => Err(JoinError::consumed()),
        Slot::Pending => unreachable!("caller checked the slot is not pending"),
    }
}

/// Write half of a [`Channel`].
///
/// The task wrapper completes it exactly once. If it is instead dropped
/// unsent, because the task never reached a worker, it publishes the
/// abandonment failure so the paired handle can never block forever.
pub(crate) struct Completion<T> {
    channel: Option<Arc<Channel<T>>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(channel: Arc<Channel<T>>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    pub(crate) fn complete(mut self, outcome: Result<T>) {
        if let Some(channel) = self.channel.take() {
            channel.publish(outcome);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.publish(Err(JoinError::abandoned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn publish_then_take() {
        let channel = Channel::new();
        channel.publish(Ok(7));
        assert_eq!(channel.take_blocking().unwrap(), 7);
    }

    #[test]
    fn first_publish_wins() {
        let channel = Channel::new();
        channel.publish(Ok(1));
        channel.publish(Ok(2));
        assert_eq!(channel.take_blocking().unwrap(), 1);
    }

    #[test]
    fn try_take_on_pending_is_none() {
        let channel = Channel::<u32>::new();
        assert!(channel.try_take().is_none());
        assert!(!channel.is_ready());
    }

    #[test]
    fn second_take_reports_consumed() {
        let channel = Channel::new();
        channel.publish(Ok(5));

        assert_eq!(channel.try_take().unwrap().unwrap(), 5);
        let err = channel.try_take().unwrap().unwrap_err();
        assert!(err.is_consumed());
    }

    #[test]
    fn timeout_leaves_the_slot_pending() {
        let channel = Channel::<u32>::new();
        assert!(channel.take_timeout(Duration::from_millis(10)).is_none());

        channel.publish(Ok(3));
        assert_eq!(
            channel.take_timeout(Duration::from_millis(10)).unwrap().unwrap(),
            3
        );
    }

    #[test]
    fn blocked_reader_is_woken_by_publish() {
        let channel = Channel::new();
        let reader = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.take_blocking())
        };

        channel.publish(Ok("done"));
        assert_eq!(reader.join().unwrap().unwrap(), "done");
    }

    #[test]
    fn dropping_the_completion_unsent_abandons() {
        let channel = Channel::<u32>::new();
        drop(Completion::new(Arc::clone(&channel)));

        let err = channel.take_blocking().unwrap_err();
        assert!(err.is_abandoned());
    }

    #[test]
    fn completing_suppresses_the_abandonment() {
        let channel = Channel::new();
        Completion::new(Arc::clone(&channel)).complete(Ok(9));
        assert_eq!(channel.take_blocking().unwrap(), 9);
    }
}
