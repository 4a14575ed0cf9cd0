//! The scheduler side of the crate: worker threads, their submission
//! queues, and the pool handle that routes tasks across them.

// Public API
mod builder;
pub use self::builder::Builder;

mod pool;
pub use self::pool::Pool;

// Re-exports
mod queue;

mod worker;
