//! Shared bookkeeping behind [`SharedOwner`](crate::SharedOwner) and
//! [`WeakObserver`](crate::WeakObserver).
//!
//! A control block is allocated together with the value it manages and
//! carries two atomic counts. The value is dropped when the strong count
//! crosses to zero; the block itself is freed when the weak count does.
//!
//! All strong owners together hold one implicit weak reference, released
//! right after the value is dropped. This makes "last strong release" and
//! "last weak release" two steps on the same counter, so exactly one
//! thread ever frees the block.

use crate::counter::{RefCounter, LOCKED};
use std::any::type_name;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ptr::NonNull;
use tracing::trace;

/// Strong and weak counts plus the managed value.
///
/// Blocks are only reachable through handles; see [`ControlBlock::allocate`].
pub struct ControlBlock<T> {
    strong: RefCounter,
    /// Observers, plus the implicit reference shared by the strong owners.
    weak: RefCounter,
    value: UnsafeCell<ManuallyDrop<T>>,
}

impl<T> ControlBlock<T> {
    /// Allocate a block holding `value` with one strong reference and no
    /// observers.
    ///
    /// # Example
    ///
    /// ```
    /// use custody::{ControlBlock, SharedOwner};
    ///
    /// let handle = ControlBlock::allocate(7);
    /// assert_eq!(handle.block().strong_count(), 1);
    /// assert_eq!(handle.block().weak_count(), 0);
    ///
    /// let owner = SharedOwner::from(handle);
    /// assert_eq!(owner.get().copied(), Ok(7));
    /// ```
    pub fn allocate(value: T) -> ControlBlockHandle<T> {
        let block = Box::new(ControlBlock {
            strong: RefCounter::new(1),
            weak: RefCounter::new(1),
            value: UnsafeCell::new(ManuallyDrop::new(value)),
        });
        let block = NonNull::from(Box::leak(block));
        trace!(block = ?block, ty = type_name::<T>(), "control block allocated");
        // SAFETY: the block starts with the strong reference handed out here.
        unsafe { ControlBlockHandle::adopt(block) }
    }

    /// Current number of strong owners.
    #[inline]
    pub fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// Current number of weak observers.
    ///
    /// The two counts are read separately, so a last strong release that
    /// races with this call can report one observer too many. Use it for
    /// diagnostics and tests only.
    pub fn weak_count(&self) -> usize {
        let weak = self.weak.get();
        if weak == LOCKED {
            // Only a sole owner with no observers can hold the lock.
            return 0;
        }
        if self.strong.get() == 0 {
            weak
        } else {
            weak.saturating_sub(1)
        }
    }

    /// Returns true while the value has not been dropped.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.strong.get() > 0
    }

    #[inline]
    pub(crate) fn increment_strong(&self) {
        self.strong.increment();
    }

    /// Take a new strong reference only if the value is still alive.
    #[inline]
    pub(crate) fn try_increment_strong(&self) -> bool {
        self.strong.increment_if_nonzero().is_some()
    }

    #[inline]
    pub(crate) fn increment_weak(&self) {
        self.weak.increment_unless_locked();
    }

    /// True when the caller's strong reference is the only reference of
    /// either kind.
    ///
    /// The weak count is parked while the strong count is read, so no
    /// observer can be created from another owner in between.
    pub(crate) fn is_unique(&self) -> bool {
        if !self.weak.try_lock(1) {
            return false;
        }
        let unique = self.strong.get() == 1;
        self.weak.unlock(1);
        unique
    }

    /// # Safety
    ///
    /// The caller must hold a strong reference for as long as the returned
    /// borrow lives.
    #[inline]
    pub(crate) unsafe fn value(&self) -> &T {
        // SAFETY: a strong reference keeps the value initialized.
        unsafe { &**self.value.get() }
    }

    /// # Safety
    ///
    /// The caller must hold the only reference of either kind, checked with
    /// [`is_unique`](Self::is_unique), for as long as the borrow lives.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn value_mut(&self) -> &mut T {
        // SAFETY: uniqueness rules out every other access path.
        unsafe { &mut **self.value.get() }
    }

    /// Release one strong reference. Returns true if this call dropped the
    /// value.
    ///
    /// # Safety
    ///
    /// `block` must be live and the caller must give up one strong
    /// reference it owns.
    pub(crate) unsafe fn decrement_strong(block: NonNull<Self>) -> bool {
        // SAFETY: the caller's strong reference keeps the block allocated.
        let remaining = unsafe { block.as_ref() }.strong.decrement();
        if remaining != 0 {
            return false;
        }

        trace!(block = ?block, ty = type_name::<T>(), "destroying value");
        // Released after the value, even if its destructor unwinds.
        let _implicit = ImplicitWeak(block);
        // SAFETY: strong crossed to zero in this call, so no handle can
        // reach the value again and no other thread will drop it.
        unsafe { ManuallyDrop::drop(&mut *(*block.as_ptr()).value.get()) };
        true
    }

    /// Release one weak reference. Returns true if this call freed the
    /// block.
    ///
    /// # Safety
    ///
    /// `block` must be live and the caller must give up one weak reference
    /// it owns (observer or implicit).
    pub(crate) unsafe fn decrement_weak(block: NonNull<Self>) -> bool {
        // SAFETY: the caller's weak reference keeps the block allocated.
        let remaining = unsafe { block.as_ref() }.weak.decrement();
        if remaining != 0 {
            return false;
        }

        trace!(block = ?block, ty = type_name::<T>(), "control block reclaimed");
        // SAFETY: no references of either kind remain. The value was
        // already dropped or moved out and `ManuallyDrop` keeps it that way.
        drop(unsafe { Box::from_raw(block.as_ptr()) });
        true
    }

    /// Move the value out if the caller holds the only strong reference.
    ///
    /// # Safety
    ///
    /// Same as [`decrement_strong`](Self::decrement_strong). On `Some`, the
    /// caller's strong reference has been consumed; on `None` it is still
    /// held.
    pub(crate) unsafe fn try_take_value(block: NonNull<Self>) -> Option<T> {
        // SAFETY: the caller's strong reference keeps the block allocated.
        if !unsafe { block.as_ref() }.strong.transition(1, 0) {
            return None;
        }

        // SAFETY: strong is zero now; observers can no longer lock it.
        let value = unsafe { ManuallyDrop::take(&mut *(*block.as_ptr()).value.get()) };
        trace!(block = ?block, ty = type_name::<T>(), "value moved out of block");

        // SAFETY: the implicit weak reference is still held.
        unsafe { Self::decrement_weak(block) };
        Some(value)
    }
}

/// The weak reference held collectively by the strong owners, given back
/// on drop.
struct ImplicitWeak<T>(NonNull<ControlBlock<T>>);

impl<T> Drop for ImplicitWeak<T> {
    fn drop(&mut self) {
        // SAFETY: only created once strong has reached zero, by the call
        // that owns the implicit weak reference.
        unsafe { ControlBlock::decrement_weak(self.0) };
    }
}

impl<T> fmt::Debug for ControlBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}

/// One counted strong reference to a [`ControlBlock`].
///
/// Cloning takes another strong reference and dropping gives it back. A
/// handle is never empty; [`SharedOwner`](crate::SharedOwner) adds the
/// empty state on top of it.
pub struct ControlBlockHandle<T> {
    /// Always a `ControlBlock<T>`. Stored erased so the handle is covariant
    /// in `T` despite the block's `UnsafeCell`.
    block: NonNull<()>,
    _marker: PhantomData<T>,
}

// SAFETY: the counts are atomic. `T: Send` is needed because the last
// handle may drop the value on any thread, `T: Sync` because every handle
// hands out `&T`.
unsafe impl<T: Send + Sync> Send for ControlBlockHandle<T> {}
unsafe impl<T: Send + Sync> Sync for ControlBlockHandle<T> {}

impl<T> ControlBlockHandle<T> {
    /// Wrap a strong reference that has already been counted.
    ///
    /// # Safety
    ///
    /// The caller must transfer ownership of one strong reference on a live
    /// block.
    #[inline]
    pub(crate) unsafe fn adopt(block: NonNull<ControlBlock<T>>) -> Self {
        Self {
            block: block.cast(),
            _marker: PhantomData,
        }
    }

    /// The block this handle keeps alive.
    #[inline]
    pub fn block(&self) -> &ControlBlock<T> {
        // SAFETY: this handle's strong reference keeps the block allocated.
        unsafe { self.as_non_null().as_ref() }
    }

    /// The managed value.
    #[inline]
    pub fn value(&self) -> &T {
        // SAFETY: this handle is a strong reference.
        unsafe { self.block().value() }
    }

    #[inline]
    pub(crate) fn as_non_null(&self) -> NonNull<ControlBlock<T>> {
        self.block.cast()
    }

    /// Returns true if both handles refer to the same block.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.block == other.block
    }

    /// Mutable access when no other reference of either kind exists.
    pub(crate) fn value_mut(&mut self) -> Option<&mut T> {
        if self.block().is_unique() {
            // SAFETY: uniqueness was just established and `&mut self`
            // prevents new references until the borrow ends.
            Some(unsafe { self.block().value_mut() })
        } else {
            None
        }
    }

    /// Move the value out if this is the only strong reference.
    pub(crate) fn try_into_value(self) -> Result<T, Self> {
        // SAFETY: `self` owns one strong reference.
        match unsafe { ControlBlock::try_take_value(self.as_non_null()) } {
            Some(value) => {
                // The strong reference was consumed above.
                mem::forget(self);
                Ok(value)
            }
            None => Err(self),
        }
    }
}

impl<T> Clone for ControlBlockHandle<T> {
    #[inline]
    fn clone(&self) -> Self {
        self.block().increment_strong();
        // SAFETY: the strong reference was counted just above.
        unsafe { Self::adopt(self.as_non_null()) }
    }
}

impl<T> Drop for ControlBlockHandle<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one strong reference.
        unsafe { ControlBlock::decrement_strong(self.as_non_null()) };
    }
}

impl<T> fmt::Debug for ControlBlockHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlockHandle")
            .field("block", &self.block)
            .field("strong", &self.block().strong_count())
            .field("weak", &self.block().weak_count())
            .finish()
    }
}
