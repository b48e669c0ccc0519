//! Error type for guarded credential checks.
use std::fmt;
use std::time::Duration;

/// Unified error for [`guard`](crate::AttemptTracker::guard)ed operations.
///
/// `blocked = true` from the tracker is policy, not failure, so the plain
/// tracker operations never produce this type; only the guard combinator
/// does, where "locked out" has to share an error channel with the
/// credential check itself.
#[derive(Debug)]
pub enum LockoutError<E> {
    /// The identifier is locked out; the operation was not run.
    LockedOut {
        /// How long until the lockout lapses.
        retry_after: Duration,
    },
    /// The record store failed (never happens with the in-memory store).
    Store(Box<dyn std::error::Error + Send + Sync>),
    /// The underlying operation failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for LockoutError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockedOut { retry_after } => {
                write!(f, "identifier locked out (retry after {:?})", retry_after)
            }
            Self::Store(e) => write!(f, "attempt store error: {}", e),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for LockoutError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Store(e) => Some(e.as_ref()),
            Self::LockedOut { .. } => None,
        }
    }
}

impl<E> LockoutError<E> {
    /// Check if this error is a lockout rejection.
    pub fn is_locked_out(&self) -> bool {
        matches!(self, Self::LockedOut { .. })
    }

    /// Check if this error wraps an inner error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Get the inner error if this is an `Inner` variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Time until the lockout lapses, if this is a lockout rejection.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::LockedOut { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
