//! The unit-of-work side of the pool: type-erased tasks, the handles that
//! observe their outputs, and the single-shot channel connecting the two.

// Public API
mod error;
pub use self::error::JoinError;

mod join;
pub use self::join::JoinHandle;

// Re-exports
pub(crate) mod channel;

mod task;
pub(crate) use self::task::{Task, new_task};

/// Task outcome delivered through a [`JoinHandle`].
pub type Result<T> = std::result::Result<T, JoinError>;
