// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Cell types for sharing state between callbacks.
//!
//! Capsules are reached through shared references from several directions at
//! once (hardware upcalls, deferred calls, alarms and the caller), so all of
//! their mutable state lives in cells. None of these types can panic: an
//! access to a value that is absent, or currently borrowed by an enclosing
//! closure, simply yields `None`.
//!
//! To use `TakeCell`, for example, users should use:
//!
//!     use kernel::utilities::cells::TakeCell;

use core::cell::Cell;

/// A shared reference to a mutable reference.
///
/// A `TakeCell` holds a `&'a mut T` that may or may not be present. Clients
/// either move the reference out with [`TakeCell::take`] or operate on it
/// inside a closure with [`TakeCell::map`]. This is how buffers are passed
/// down to hardware and handed back in completion callbacks.
pub struct TakeCell<'a, T: 'a + ?Sized> {
    val: Cell<Option<&'a mut T>>,
}

impl<'a, T: ?Sized> TakeCell<'a, T> {
    pub const fn empty() -> TakeCell<'a, T> {
        TakeCell {
            val: Cell::new(None),
        }
    }

    /// Creates a new `TakeCell` containing `value`
    pub const fn new(value: &'a mut T) -> TakeCell<'a, T> {
        TakeCell {
            val: Cell::new(Some(value)),
        }
    }

    pub fn is_none(&self) -> bool {
        let inner = self.take();
        let return_val = inner.is_none();
        self.val.set(inner);
        return_val
    }

    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Takes the mutable reference out of the `TakeCell` leaving a `None` in
    /// its place.
    pub fn take(&self) -> Option<&'a mut T> {
        self.val.replace(None)
    }

    /// Stores `val` in the `TakeCell`.
    pub fn put(&self, val: Option<&'a mut T>) {
        self.val.replace(val);
    }

    /// Replaces the contents of the `TakeCell` with `val`, returning the
    /// previous reference if there was one.
    pub fn replace(&self, val: &'a mut T) -> Option<&'a mut T> {
        self.val.replace(Some(val))
    }

    /// Allows `closure` to borrow the contents of the `TakeCell` if it is not
    /// taken already. The reference is put back after the closure returns.
    pub fn map<F, R>(&self, closure: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let maybe_val = self.take();
        maybe_val.map(|val| {
            let res = closure(&mut *val);
            self.replace(val);
            res
        })
    }

    /// Performs a `map` or returns a default value if the `TakeCell` is empty.
    pub fn map_or<F, R>(&self, default: R, closure: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.map(closure).unwrap_or(default)
    }
}

/// `OptionalCell` is a `Cell` that wraps an `Option` of a `Copy` value.
pub struct OptionalCell<T: Copy> {
    value: Cell<Option<T>>,
}

impl<T: Copy> OptionalCell<T> {
    /// Create a new `OptionalCell` holding `val`.
    pub const fn new(val: T) -> OptionalCell<T> {
        OptionalCell {
            value: Cell::new(Some(val)),
        }
    }

    /// Create an empty `OptionalCell`.
    pub const fn empty() -> OptionalCell<T> {
        OptionalCell {
            value: Cell::new(None),
        }
    }

    /// Update the stored value.
    pub fn set(&self, val: T) {
        self.value.set(Some(val));
    }

    /// Insert the value of the supplied `Option`, clearing the cell on `None`.
    pub fn insert(&self, opt: Option<T>) {
        self.value.set(opt);
    }

    /// Reset the stored value to `None`.
    pub fn clear(&self) {
        self.value.set(None);
    }

    /// Remove the value, leaving the cell empty.
    pub fn take(&self) -> Option<T> {
        self.value.take()
    }

    pub fn get(&self) -> Option<T> {
        self.value.get()
    }

    pub fn is_some(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn is_none(&self) -> bool {
        self.value.get().is_none()
    }

    /// Call `closure` with the value if there is one.
    pub fn map<F, R>(&self, closure: F) -> Option<R>
    where
        F: FnOnce(T) -> R,
    {
        self.value.get().map(closure)
    }

    /// Call `closure` with the value, or return `default` if the cell is
    /// empty.
    pub fn map_or<F, R>(&self, default: R, closure: F) -> R
    where
        F: FnOnce(T) -> R,
    {
        self.value.get().map_or(default, closure)
    }
}

/// A mutable memory location that enforces borrow rules at runtime without
/// possible panics.
///
/// A `MapCell` owns its value. While a closure passed to [`MapCell::map`] is
/// running the cell is empty, so a nested `map` on the same cell returns
/// `None` instead of aliasing the value.
pub struct MapCell<T> {
    val: Cell<Option<T>>,
}

impl<T> MapCell<T> {
    pub const fn empty() -> MapCell<T> {
        MapCell {
            val: Cell::new(None),
        }
    }

    /// Creates a new `MapCell` containing `value`
    pub const fn new(value: T) -> MapCell<T> {
        MapCell {
            val: Cell::new(Some(value)),
        }
    }

    /// Takes the value out of the `MapCell`, leaving it empty.
    pub fn take(&self) -> Option<T> {
        self.val.take()
    }

    /// Replaces the contents, returning the previous value if there was one.
    pub fn replace(&self, val: T) -> Option<T> {
        self.val.replace(Some(val))
    }

    pub fn is_some(&self) -> bool {
        let inner = self.val.take();
        let present = inner.is_some();
        self.val.set(inner);
        present
    }

    pub fn is_none(&self) -> bool {
        !self.is_some()
    }

    /// Mutably borrows the contents for the duration of `closure`.
    pub fn map<F, R>(&self, closure: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        self.val.take().map(|mut val| {
            let res = closure(&mut val);
            self.val.set(Some(val));
            res
        })
    }

    /// Performs a `map` or returns a default value if the `MapCell` is empty.
    pub fn map_or<F, R>(&self, default: R, closure: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.map(closure).unwrap_or(default)
    }
}
