//! Shared ownership with deterministic last-owner destruction.

use crate::control_block::{ControlBlock, ControlBlockHandle};
use crate::error::{OwnerKind, OwnershipError, Result};
use crate::weak::WeakObserver;
use std::fmt;
use std::mem;
use std::ptr;

/// A reference-counted owner of a value.
///
/// Any number of `SharedOwner`s may co-own one value. Cloning takes another
/// strong reference; dropping, [`reset`](Self::reset)ting or moving out
/// with [`take`](Self::take) gives one back. The value is dropped exactly
/// once, when the last strong reference goes away, even if
/// [`WeakObserver`]s still point at its block.
///
/// An owner can be empty. Accessing the value of an empty owner returns
/// [`OwnershipError::EmptyOwnerAccess`].
///
/// Handles may be cloned and sent to other threads when `T: Send + Sync`.
/// A single handle must not be mutated from two threads at once, and the
/// pointee needs its own synchronization (a `Mutex` or atomics inside `T`)
/// if it is to be mutated while shared.
///
/// # Example
///
/// ```
/// use custody::SharedOwner;
///
/// let data = SharedOwner::make(vec![1, 2, 3]);
/// let shared = data.clone();
///
/// assert_eq!(data.use_count(), 2);
/// assert_eq!(shared.get().map(Vec::len), Ok(3));
/// ```
pub struct SharedOwner<T> {
    handle: Option<ControlBlockHandle<T>>,
}

impl<T> SharedOwner<T> {
    /// Create an empty owner.
    #[inline]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Allocate `value` in a fresh control block.
    #[inline]
    pub fn make(value: T) -> Self {
        Self::from(ControlBlock::allocate(value))
    }

    /// Returns true if this owner holds no value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
    }

    /// Shared access to the value.
    #[inline]
    pub fn get(&self) -> Result<&T> {
        self.handle
            .as_ref()
            .map(ControlBlockHandle::value)
            .ok_or(OwnershipError::empty(OwnerKind::Shared))
    }

    /// Number of strong owners of this value, or 0 when empty.
    ///
    /// The count can change at any moment if other threads hold clones.
    /// Use it for diagnostics and tests, never to decide whether another
    /// thread may still touch the value.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.handle
            .as_ref()
            .map_or(0, |handle| handle.block().strong_count())
    }

    /// Number of weak observers of this value, or 0 when empty.
    ///
    /// Diagnostics only, with the same caveat as
    /// [`use_count`](Self::use_count).
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.handle
            .as_ref()
            .map_or(0, |handle| handle.block().weak_count())
    }

    /// Returns true if both owners share a control block, or both are
    /// empty.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.handle, &other.handle) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Address of the value, or null when empty.
    ///
    /// For identity checks and diagnostics; ownership never passes through
    /// the returned pointer.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.handle
            .as_ref()
            .map_or(ptr::null(), |handle| handle.value() as *const T)
    }

    /// Create a weak observer of this owner's block.
    #[inline]
    pub fn downgrade(&self) -> WeakObserver<T> {
        WeakObserver::from(self)
    }

    /// Give up this owner's strong reference, leaving it empty.
    ///
    /// Drops the value if this was the last strong reference.
    #[inline]
    pub fn reset(&mut self) {
        self.handle = None;
    }

    /// Move the block reference out, leaving this owner empty.
    ///
    /// Counts are not touched.
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Mutable access when this is the only owner and no observers exist.
    ///
    /// Returns `None` while the value is shared or observed, and when the
    /// owner is empty.
    pub fn try_get_mut(&mut self) -> Option<&mut T> {
        self.handle.as_mut().and_then(ControlBlockHandle::value_mut)
    }

    /// Move the value out if this is the only strong owner.
    ///
    /// Observers see the value as expired afterwards. Returns `self`
    /// unchanged in the error case, including when it is empty.
    pub fn try_unwrap(mut self) -> std::result::Result<T, Self> {
        match self.handle.take() {
            Some(handle) => handle.try_into_value().map_err(Self::from),
            None => Err(self),
        }
    }

    #[inline]
    pub(crate) fn handle(&self) -> Option<&ControlBlockHandle<T>> {
        self.handle.as_ref()
    }
}

impl<T: Clone> SharedOwner<T> {
    /// Mutable access, cloning the value into a fresh block first if it is
    /// shared or observed (copy-on-write).
    ///
    /// Other owners and observers keep the original value.
    pub fn make_mut(&mut self) -> Result<&mut T> {
        let unique = match self.handle.as_ref() {
            Some(handle) => handle.block().is_unique(),
            None => return Err(OwnershipError::empty(OwnerKind::Shared)),
        };
        if !unique {
            let copy = self.get()?.clone();
            *self = Self::make(copy);
        }
        self.try_get_mut()
            .ok_or(OwnershipError::empty(OwnerKind::Shared))
    }
}

impl<T> From<ControlBlockHandle<T>> for SharedOwner<T> {
    #[inline]
    fn from(handle: ControlBlockHandle<T>) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl<T> Default for SharedOwner<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SharedOwner<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }

    /// Copy-assign. A no-op when both owners already share a block.
    fn clone_from(&mut self, source: &Self) {
        if self.ptr_eq(source) {
            return;
        }
        // The new reference is counted before the old one is released.
        *self = source.clone();
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedOwner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Ok(value) => f
                .debug_struct("SharedOwner")
                .field("value", value)
                .field("use_count", &self.use_count())
                .finish(),
            Err(_) => f.write_str("SharedOwner(<empty>)"),
        }
    }
}
