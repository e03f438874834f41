//! Weak observers for cycle prevention.

use crate::control_block::{ControlBlock, ControlBlockHandle};
use crate::shared::SharedOwner;
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use tracing::debug;

/// A non-owning observer of a shared value.
///
/// Observers keep the control block allocated but never the value: once
/// the last [`SharedOwner`] is gone the value is dropped, and every later
/// [`lock`](Self::lock) returns `None`.
///
/// Storing observers instead of owners in back-references (parent links,
/// partner links, self links) is how reference cycles are broken. The
/// library does not detect cycles of strong owners.
///
/// # Example
///
/// ```
/// use custody::{SharedOwner, WeakObserver};
///
/// let owner = SharedOwner::make(42);
/// let observer = WeakObserver::from(&owner);
///
/// assert!(observer.is_alive());
/// assert_eq!(observer.lock().map(|s| s.use_count()), Some(2));
///
/// drop(owner);
///
/// assert!(observer.expired());
/// assert!(observer.lock().is_none());
/// ```
pub struct WeakObserver<T> {
    /// Always a `ControlBlock<T>`, erased like `ControlBlockHandle`'s.
    block: Option<NonNull<()>>,
    _marker: PhantomData<T>,
}

// SAFETY: same reasoning as `ControlBlockHandle`; `lock` hands out owners.
unsafe impl<T: Send + Sync> Send for WeakObserver<T> {}
unsafe impl<T: Send + Sync> Sync for WeakObserver<T> {}

impl<T> WeakObserver<T> {
    /// Create an observer of nothing. It never locks.
    #[inline]
    pub const fn new() -> Self {
        Self {
            block: None,
            _marker: PhantomData,
        }
    }

    /// Take a new strong reference if the value is still alive.
    ///
    /// Checking liveness and taking the reference happen in one atomic
    /// step, so a value whose last owner is being dropped concurrently is
    /// never handed out.
    pub fn lock(&self) -> Option<SharedOwner<T>> {
        let ptr = self.raw()?;
        // SAFETY: this observer's weak reference keeps the block allocated.
        if !unsafe { ptr.as_ref() }.try_increment_strong() {
            debug!(block = ?ptr, ty = type_name::<T>(), "lock on expired observer");
            return None;
        }
        // SAFETY: the strong reference was counted by the successful
        // increment above.
        Some(SharedOwner::from(unsafe { ControlBlockHandle::adopt(ptr) }))
    }

    /// Returns true while the observed value has not been dropped.
    ///
    /// A racing drop on another thread can make this stale immediately;
    /// use [`lock`](Self::lock) to actually reach the value.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.block().is_some_and(ControlBlock::is_alive)
    }

    /// Returns true if the value has been dropped or nothing is observed.
    #[inline]
    pub fn expired(&self) -> bool {
        !self.is_alive()
    }

    /// Number of strong owners of the observed value, or 0.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.block().map_or(0, ControlBlock::strong_count)
    }

    /// Number of observers of the block, this one included, or 0 when
    /// empty. Diagnostics only, like
    /// [`ControlBlock::weak_count`].
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.block().map_or(0, ControlBlock::weak_count)
    }

    /// Returns true if both observers watch the same block, or both are
    /// empty.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.block == other.block
    }

    /// Move the block reference out, leaving this observer empty.
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    #[inline]
    fn raw(&self) -> Option<NonNull<ControlBlock<T>>> {
        self.block.map(NonNull::cast)
    }

    #[inline]
    fn block(&self) -> Option<&ControlBlock<T>> {
        // SAFETY: this observer's weak reference keeps the block allocated.
        self.raw().map(|ptr| unsafe { &*ptr.as_ptr() })
    }
}

impl<T> From<&SharedOwner<T>> for WeakObserver<T> {
    fn from(owner: &SharedOwner<T>) -> Self {
        match owner.handle() {
            Some(handle) => {
                handle.block().increment_weak();
                Self {
                    block: Some(handle.as_non_null().cast()),
                    _marker: PhantomData,
                }
            }
            None => Self::new(),
        }
    }
}

impl<T> Default for WeakObserver<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for WeakObserver<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.increment_weak();
        }
        Self {
            block: self.block,
            _marker: PhantomData,
        }
    }

    /// Copy-assign. A no-op when both observers already watch one block.
    fn clone_from(&mut self, source: &Self) {
        if self.ptr_eq(source) {
            return;
        }
        *self = source.clone();
    }
}

impl<T> Drop for WeakObserver<T> {
    fn drop(&mut self) {
        if let Some(block) = self.raw() {
            // SAFETY: this observer owns one weak reference.
            unsafe { ControlBlock::<T>::decrement_weak(block) };
        }
    }
}

impl<T> fmt::Debug for WeakObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObserver")
            .field("alive", &self.is_alive())
            .field("use_count", &self.use_count())
            .finish()
    }
}
