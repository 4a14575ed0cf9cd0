//! A work-stealing pool of worker threads for one-shot blocking tasks.
//!
//! Closures of arbitrary return type are type-erased at submission time and
//! rotated across per-worker FIFO queues; idle workers steal from their
//! peers. Every submission returns a [`JoinHandle`] that later delivers the
//! closure's output, or the failure that kept it from producing one.
//!
//! ```
//! use taskmill::Pool;
//!
//! let pool = Pool::new(2);
//! let handle = pool.spawn(|| 40 + 2);
//!
//! assert_eq!(handle.join().unwrap(), 42);
//! ```

pub mod pool;
pub use pool::{Builder, Pool};

pub mod task;
pub use task::{JoinError, JoinHandle};

pub(crate) mod utils;
