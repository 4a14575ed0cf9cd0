use crate::pool::builder::Config;
use crate::pool::pool::Shared;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

/// A pool worker. Queue `id` is its primary source; everything else it
/// reaches through the `(id + k) % n` rotation, so the scan is biased toward
/// its own queue before it starts stealing from peers.
pub(crate) struct Worker {
    id: usize,
    shared: Arc<Shared>,
}

impl Worker {
    pub(crate) fn new(id: usize, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    pub(crate) fn run(self) {
        let n = self.shared.queues.len();

        loop {
            // Opportunistic sweep over every queue, own queue first. Going
            // through `try_pop` keeps a busy worker from serializing on a
            // peer's mutex.
            let mut found = None;
            for k in 0..10 * n {
                if let Some(task) = self.shared.queues[(self.id + k) % n].try_pop() {
                    found = Some(task);
                    break;
                }
            }

            let task = match found {
                Some(task) => task,
                // Nothing stealable right now; block on our own queue until
                // work arrives or the pool closes.
                None => match self.shared.queues[self.id].pop() {
                    Some(task) => task,
                    None => break,
                },
            };

            // The in-flight count rises before a push, so it falls after the
            // pop and before the invocation. Zero then means "no queue holds
            // work anywhere", independent of how long invocations take.
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            task.run();
        }

        self.drain();

        tracing::trace!(worker = self.id, "worker exited");
        self.shared.worker_exited();
    }

    /// Our queue is closed and empty, but peers may still hold tasks pushed
    /// before the close that no one has claimed. Sweep every queue until the
    /// in-flight count reaches zero; exiting earlier would strand queued
    /// work.
    fn drain(&self) {
        let n = self.shared.queues.len();
        tracing::trace!(worker = self.id, "draining peer queues");

        while self.shared.in_flight.load(Ordering::SeqCst) > 0 {
            for k in 0..n {
                if let Some(task) = self.shared.queues[(self.id + k) % n].try_pop() {
                    self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                    task.run();
                }
            }

            thread::yield_now();
        }
    }
}

pub(crate) fn spawn_worker_thread(
    worker: Worker,
    config: &Config,
    barrier: Arc<Barrier>,
) -> thread::JoinHandle<()> {
    let mut builder = thread::Builder::new().name((config.thread_name.0)());

    if let Some(stack_size) = config.thread_stack_size {
        builder = builder.stack_size(stack_size);
    }

    builder
        .spawn(move || {
            barrier.wait();
            worker.run();
        })
        .expect("failed to spawn worker thread")
}
