//! Exclusive, move-only ownership.

use crate::error::{OwnerKind, OwnershipError, Result};
use std::any::type_name;
use std::fmt;
use std::mem;
use std::ptr;
use tracing::trace;

/// The sole owner of a heap-allocated value.
///
/// Ownership moves, it is never copied: there is no `Clone`, so two live
/// owners of one value cannot exist.
///
/// ```compile_fail
/// use custody::ExclusiveOwner;
///
/// let first = ExclusiveOwner::make(1);
/// let second = first.clone();
/// ```
///
/// [`take`](Self::take) is the explicit move that leaves the source
/// empty, and [`release`](Self::release) hands the allocation back to the
/// caller. Accessing an empty owner returns
/// [`OwnershipError::EmptyOwnerAccess`].
///
/// # Example
///
/// ```
/// use custody::ExclusiveOwner;
///
/// let mut owner = ExclusiveOwner::make(String::from("Jack"));
/// owner.get_mut()?.replace_range(.., "Stafania");
///
/// let moved = owner.take();
/// assert!(owner.is_empty());
/// assert_eq!(moved.get().map(String::as_str), Ok("Stafania"));
/// # Ok::<(), custody::OwnershipError>(())
/// ```
pub struct ExclusiveOwner<T> {
    value: Option<Box<T>>,
}

impl<T> ExclusiveOwner<T> {
    /// Create an empty owner.
    #[inline]
    pub const fn new() -> Self {
        Self { value: None }
    }

    /// Allocate `value` and own it.
    #[inline]
    pub fn make(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    #[inline]
    pub fn get(&self) -> Result<&T> {
        self.value
            .as_deref()
            .ok_or(OwnershipError::empty(OwnerKind::Exclusive))
    }

    #[inline]
    pub fn get_mut(&mut self) -> Result<&mut T> {
        self.value
            .as_deref_mut()
            .ok_or(OwnershipError::empty(OwnerKind::Exclusive))
    }

    /// Address of the value, or null when empty.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.value
            .as_deref()
            .map_or(ptr::null(), |value| value as *const T)
    }

    /// Give up ownership without dropping the value.
    ///
    /// The caller becomes responsible for the returned allocation and this
    /// owner is left empty, so it cannot reach the value again.
    pub fn release(&mut self) -> Option<Box<T>> {
        let released = self.value.take();
        if released.is_some() {
            trace!(ty = type_name::<T>(), "exclusive owner released value");
        }
        released
    }

    /// Drop the current value, if any, then own `value`.
    pub fn reset(&mut self, value: Option<T>) {
        if let Some(old) = self.value.take() {
            trace!(ty = type_name::<T>(), "exclusive owner reset");
            drop(old);
        }
        self.value = value.map(Box::new);
    }

    /// Move the value out into a new owner, leaving this one empty.
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Exchange values with another owner.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.value, &mut other.value);
    }

    /// Consume the owner and return the value.
    #[inline]
    pub fn into_inner(self) -> Option<T> {
        self.value.map(|value| *value)
    }
}

impl<T> From<Box<T>> for ExclusiveOwner<T> {
    #[inline]
    fn from(value: Box<T>) -> Self {
        Self { value: Some(value) }
    }
}

impl<T> Default for ExclusiveOwner<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ExclusiveOwner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => f.debug_tuple("ExclusiveOwner").field(value).finish(),
            None => f.write_str("ExclusiveOwner(<empty>)"),
        }
    }
}
