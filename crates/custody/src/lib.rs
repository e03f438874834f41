//! # Custody
//!
//! Ownership and lifetime primitives for heap-allocated values.
//!
//! ## Features
//!
//! - **Exclusive ownership**: [`ExclusiveOwner`] is move-only; release and
//!   reset are explicit
//! - **Shared ownership**: [`SharedOwner`] drops its value exactly once,
//!   when the last strong reference goes away
//! - **Weak observation**: [`WeakObserver`] never keeps a value alive and
//!   locks atomically, so an expired value is never handed out
//! - **Control blocks**: [`ControlBlock`] keeps the strong and weak counts
//!   as atomics next to the value
//! - **Copy/move reference type**: [`MovableResource`] shows the deep-copy,
//!   move-out contract expected from stored values
//!
//! Strong cycles leak: two values that own each other through
//! [`SharedOwner`] fields are never dropped. Store a [`WeakObserver`] on
//! one side of every back-reference instead.
//!
//! ## Quick Start
//!
//! ```rust
//! use custody::{SharedOwner, WeakObserver};
//!
//! let owner = SharedOwner::make("hello".to_string());
//! let observer = WeakObserver::from(&owner);
//!
//! assert_eq!(owner.use_count(), 1);
//! assert!(observer.lock().is_some());
//!
//! drop(owner); // Value dropped here; the observer only sees it expire
//! assert!(observer.lock().is_none());
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod control_block;
mod counter;
mod error;
mod exclusive;
mod movable;
mod shared;
mod weak;

pub use control_block::{ControlBlock, ControlBlockHandle};
pub use error::{OwnerKind, OwnershipError, Result};
pub use exclusive::ExclusiveOwner;
pub use movable::MovableResource;
pub use shared::SharedOwner;
pub use weak::WeakObserver;
