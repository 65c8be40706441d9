//! Transferable handles.
//!
//! Some action payloads carry an object whose ownership must move with the
//! message instead of being copied, e.g. one end of a channel handed over to
//! a third party. A [`Transferable`] is a take-once slot: every clone shares
//! the slot, and the first successful [`Transferable::take`] detaches it for
//! all holders. [`Transferable::transfer`] moves the contents into a fresh
//! slot, so the sending side loses access as soon as the message is built.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

type Slot = Option<Box<dyn Any + Send>>;

/// A handle whose contents move across a transport by ownership transfer.
#[derive(Clone)]
pub struct Transferable {
    slot: Arc<Mutex<Slot>>,
}

impl Transferable {
    /// Wrap a value so it can be transferred.
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(Box::new(value)))),
        }
    }

    /// Take ownership of the contents.
    ///
    /// Returns `None` if the handle was already taken, or if it holds a value
    /// of a different type (in which case it stays attached).
    pub fn take<T: Any + Send>(&self) -> Option<T> {
        let mut slot = self.lock();
        let boxed = slot.take()?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                *slot = Some(other);
                None
            }
        }
    }

    /// Move the contents into a new handle, detaching this one and its clones.
    ///
    /// Returns `None` if the contents were already moved.
    pub fn transfer(&self) -> Option<Transferable> {
        let value = self.lock().take()?;
        Some(Self {
            slot: Arc::new(Mutex::new(Some(value))),
        })
    }

    /// Check whether the contents have already been taken.
    pub fn is_detached(&self) -> bool {
        self.lock().is_none()
    }

    /// Check whether the handle currently holds a value of type `T`.
    pub fn holds<T: Any>(&self) -> bool {
        self.lock().as_ref().is_some_and(|v| v.is::<T>())
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PartialEq for Transferable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Eq for Transferable {}

impl fmt::Debug for Transferable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_detached() {
            write!(f, "Transferable(detached)")
        } else {
            write!(f, "Transferable(attached)")
        }
    }
}
