//! Error taxonomy for owner access.

use std::fmt;

/// Which kind of owner reported an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    Exclusive,
    Shared,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKind::Exclusive => write!(f, "exclusive owner"),
            OwnerKind::Shared => write!(f, "shared owner"),
        }
    }
}

/// Errors reported by owner handles.
///
/// Accessing a value through an owner that was released, reset, moved
/// from, or never filled is reported as [`OwnershipError::EmptyOwnerAccess`].
/// A failed [`WeakObserver::lock`](crate::WeakObserver::lock) is not an
/// error; it returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OwnershipError {
    #[error("attempted to access the value of an empty {owner}")]
    EmptyOwnerAccess { owner: OwnerKind },
}

impl OwnershipError {
    pub(crate) const fn empty(owner: OwnerKind) -> Self {
        OwnershipError::EmptyOwnerAccess { owner }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = OwnershipError> = std::result::Result<T, E>;
