//! A buffer-owning value type with explicit copy and move semantics.
//!
//! `MovableResource` is the reference shape for values placed inside the
//! owners of this crate: deep copies through `Clone`, cheap transfers
//! through moves, and a moved-from state whose drop does nothing.

use std::fmt;
use std::mem;
use tracing::trace;

/// Owns a zero-initialized buffer of `u32`.
///
/// - `Clone` duplicates every element into a new allocation.
/// - `clone_from` (copy-assign) reuses the existing allocation when the
///   lengths match.
/// - [`take`](Self::take) (move-out) steals the buffer and leaves the
///   source with no buffer and length 0.
///
/// Self-assignment in either form cannot corrupt state: Rust forbids a
/// `&mut` and a `&` to the same value at once, and `r = r.take()` moves
/// the buffer out and straight back in.
///
/// # Example
///
/// ```
/// use custody::MovableResource;
///
/// let mut original = MovableResource::new(4);
/// original.as_mut_slice()[0] = 7;
///
/// let copy = original.clone();
/// let moved = original.take();
///
/// assert!(original.is_moved_from());
/// assert_eq!(copy.as_slice(), moved.as_slice());
/// ```
#[derive(Default)]
pub struct MovableResource {
    buffer: Option<Box<[u32]>>,
    length: usize,
}

impl MovableResource {
    /// Allocate `size` zeroed elements.
    pub fn new(size: usize) -> Self {
        Self {
            buffer: Some(vec![0; size].into_boxed_slice()),
            length: size,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns true once the buffer has been moved out.
    #[inline]
    pub fn is_moved_from(&self) -> bool {
        self.buffer.is_none()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        self.buffer.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        self.buffer.as_deref_mut().unwrap_or(&mut [])
    }

    /// Move the buffer into a new resource, leaving this one with no
    /// buffer and length 0.
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl Clone for MovableResource {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            length: self.length,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if let (Some(target), Some(from)) = (self.buffer.as_deref_mut(), source.buffer.as_deref()) {
            if target.len() == from.len() {
                target.copy_from_slice(from);
                return;
            }
        }
        self.buffer = source.buffer.clone();
        self.length = source.length;
    }
}

impl Drop for MovableResource {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            trace!(length = buffer.len(), "releasing resource buffer");
        }
    }
}

impl PartialEq for MovableResource {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer
    }
}

impl Eq for MovableResource {}

impl fmt::Debug for MovableResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MovableResource")
            .field("length", &self.length)
            .field("moved_from", &self.is_moved_from())
            .finish()
    }
}
