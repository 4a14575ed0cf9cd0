use crate::utils::SyncWrapper;
use std::any::Any;
use std::fmt;

/// Payload recovered from a panicking task closure.
pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// Returned when a [`JoinHandle`] cannot deliver its task's output.
///
/// Three things can go wrong between submitting a closure and collecting its
/// result:
///
/// - the closure panicked; the payload is preserved and can be re-raised
///   with [`std::panic::resume_unwind`] after [`into_panic`];
/// - the task was dropped before any worker ran it (for example it was still
///   queued when its queue was torn down), in which case the handle reports
///   abandonment instead of blocking forever;
/// - the output was already taken out of this handle through an earlier
///   [`try_join`] or [`join_timeout`] call.
///
/// [`JoinHandle`]: crate::task::JoinHandle
/// [`into_panic`]: JoinError::into_panic
/// [`try_join`]: crate::task::JoinHandle::try_join
/// [`join_timeout`]: crate::task::JoinHandle::join_timeout
#[derive(thiserror::Error)]
#[error("{repr}")]
pub struct JoinError {
    repr: Repr,
}

enum Repr {
    Panicked(SyncWrapper<PanicPayload>),
    Abandoned,
    Consumed,
}

impl JoinError {
    pub(crate) fn panicked(payload: PanicPayload) -> Self {
        Self {
            repr: Repr::Panicked(SyncWrapper::new(payload)),
        }
    }

    pub(crate) fn abandoned() -> Self {
        Self {
            repr: Repr::Abandoned,
        }
    }

    pub(crate) fn consumed() -> Self {
        Self {
            repr: Repr::Consumed,
        }
    }

    /// Returns true if the task's closure panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self.repr, Repr::Panicked(_))
    }

    /// Returns true if the task was dropped before it could run.
    pub fn is_abandoned(&self) -> bool {
        matches!(self.repr, Repr::Abandoned)
    }

    /// Returns true if the output was already taken from the handle.
    pub fn is_consumed(&self) -> bool {
        matches!(self.repr, Repr::Consumed)
    }

    /// Consumes the error, returning the panic payload.
    ///
    /// # Panics
    ///
    /// Panics if the error is not a panic; check [`is_panic`] first or use
    /// [`try_into_panic`].
    ///
    /// [`is_panic`]: JoinError::is_panic
    /// [`try_into_panic`]: JoinError::try_into_panic
    pub fn into_panic(self) -> Box<dyn Any + Send + 'static> {
        self.try_into_panic()
            .expect("`JoinError` is not a panic; use `try_into_panic()`")
    }

    /// Consumes the error, returning the panic payload if the task panicked.
    pub fn try_into_panic(self) -> Result<Box<dyn Any + Send + 'static>, JoinError> {
        match self.repr {
            Repr::Panicked(payload) => Ok(payload.into_inner()),
            repr => Err(JoinError { repr }),
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repr::Panicked(_) => write!(f, "task panicked"),
            Repr::Abandoned => write!(f, "task was dropped before it ran"),
            Repr::Consumed => write!(f, "task output was already consumed"),
        }
    }
}

// The panic payload is an opaque `dyn Any`, so Debug has to be written by
// hand rather than derived.
impl fmt::Debug for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Panicked(_) => write!(f, "JoinError::Panicked(..)"),
            Repr::Abandoned => write!(f, "JoinError::Abandoned"),
            Repr::Consumed => write!(f, "JoinError::Consumed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(JoinError: Send, Sync, std::error::Error);

    #[test]
    fn predicates_match_the_variant() {
        let panic = JoinError::panicked(Box::new("boom"));
        assert!(panic.is_panic());
        assert!(!panic.is_abandoned());
        assert!(!panic.is_consumed());

        assert!(JoinError::abandoned().is_abandoned());
        assert!(JoinError::consumed().is_consumed());
    }

    #[test]
    fn panic_payload_round_trips() {
        let err = JoinError::panicked(Box::new("boom"));
        let payload = err.into_panic();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    }

    #[test]
    fn try_into_panic_hands_back_other_errors() {
        let err = JoinError::abandoned()
            .try_into_panic()
            .expect_err("abandonment is not a panic");
        assert!(err.is_abandoned());
    }

    #[test]
    fn display_names_the_failure() {
        assert_eq!(JoinError::panicked(Box::new(())).to_string(), "task panicked");
        assert_eq!(
            JoinError::abandoned().to_string(),
            "task was dropped before it ran"
        );
        assert_eq!(
            JoinError::consumed().to_string(),
            "task output was already consumed"
        );
    }
}
