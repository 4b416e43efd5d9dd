// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Hardware-independent kernel interface for deferred calls.
//!
//! This allows any struct in the kernel which implements
//! [`DynamicDeferredCallClient`] to set and receive deferred calls.
//!
//! These can be used to move work out of a hardware completion callback: the
//! callback schedules the deferred call and returns, and the kernel loop
//! invokes the client later from a clean call stack.
//!
//! Usage
//! -----
//!
//! The `client_states` array size determines how many [`DeferredCallHandle`]s
//! may be registered with the instance. When no more slots are available,
//! `dynamic_deferred_call.register(some_client)` will return `None`.
//!
//! The board owns the instance and calls [`DynamicDeferredCall::call`] from
//! its main loop whenever [`DynamicDeferredCall::has_pending`] is true.

use core::cell::Cell;

use crate::utilities::cells::OptionalCell;

/// Internal per-client state tracking for the [`DynamicDeferredCall`].
pub struct DynamicDeferredCallClientState<'a> {
    scheduled: Cell<bool>,
    client: OptionalCell<&'a dyn DynamicDeferredCallClient>,
}

impl Default for DynamicDeferredCallClientState<'_> {
    fn default() -> Self {
        DynamicDeferredCallClientState {
            scheduled: Cell::new(false),
            client: OptionalCell::empty(),
        }
    }
}

/// Dynamic deferred call.
///
/// This struct manages and calls dynamically (at runtime) registered deferred
/// calls from capsules and other kernel structures.
///
/// It has a fixed number of possible clients, which is determined by the
/// `client_states` slice passed in with the constructor.
pub struct DynamicDeferredCall<'a> {
    client_states: &'a [DynamicDeferredCallClientState<'a>],
    handle_counter: Cell<usize>,
    call_pending: Cell<bool>,
}

impl<'a> DynamicDeferredCall<'a> {
    /// Construct a new dynamic deferred call implementation.
    ///
    /// The `client_states` can be initialized using the implementation of
    /// [`Default`] for the [`DynamicDeferredCallClientState`].
    pub fn new(
        client_states: &'a [DynamicDeferredCallClientState<'a>],
    ) -> DynamicDeferredCall<'a> {
        DynamicDeferredCall {
            client_states,
            handle_counter: Cell::new(0),
            call_pending: Cell::new(false),
        }
    }

    /// Schedule a deferred call to be called.
    ///
    /// The handle addresses the client that will be called.
    ///
    /// If no client for the handle is found, this returns `None`. If a call
    /// is already scheduled, it returns `Some(false)`.
    pub fn set(&self, handle: DeferredCallHandle) -> Option<bool> {
        let DeferredCallHandle(client_pos) = handle;
        let client_state = self.client_states.get(client_pos)?;

        if client_state.client.is_none() {
            None
        } else if client_state.scheduled.get() {
            // Already set
            Some(false)
        } else {
            client_state.scheduled.set(true);
            self.call_pending.set(true);
            Some(true)
        }
    }

    /// Register a new client.
    ///
    /// On success, a `Some(handle)` will be returned. This handle is later
    /// required to schedule a deferred call.
    pub fn register(
        &self,
        ddc_client: &'a dyn DynamicDeferredCallClient,
    ) -> Option<DeferredCallHandle> {
        let current_counter = self.handle_counter.get();

        let client_state = self.client_states.get(current_counter)?;
        client_state.scheduled.set(false);
        client_state.client.set(ddc_client);
        self.handle_counter.set(current_counter + 1);

        Some(DeferredCallHandle(current_counter))
    }

    /// Check if one or more deferred calls are pending.
    pub fn has_pending(&self) -> bool {
        self.call_pending.get()
    }

    /// Call all registered and scheduled deferred calls.
    ///
    /// Each scheduled client runs once. A client that schedules itself again
    /// from within its `call` runs on the next invocation.
    pub fn call(&self) {
        self.call_while(|| true)
    }

    /// Call all registered and scheduled deferred calls while the supplied
    /// predicate returns `true`.
    pub fn call_while<F: Fn() -> bool>(&self, f: F) {
        if self.call_pending.get() {
            for (i, client_state) in self.client_states.iter().enumerate() {
                if !f() {
                    break;
                }
                if client_state.scheduled.get() {
                    client_state.client.map(|client| {
                        client_state.scheduled.set(false);
                        client.call(DeferredCallHandle(i));
                    });
                }
            }

            // Recompute call_pending here, as some deferred calls may have
            // been skipped or rescheduled.
            self.call_pending.set(
                self.client_states
                    .iter()
                    .any(|client_state| client_state.scheduled.get()),
            );
        }
    }
}

/// Client for the [`DynamicDeferredCall`].
///
/// This trait needs to be implemented for some struct to receive deferred
/// calls from a `DynamicDeferredCall`.
pub trait DynamicDeferredCallClient {
    fn call(&self, handle: DeferredCallHandle);
}

/// Unique identifier for a deferred call registered with a
/// [`DynamicDeferredCall`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeferredCallHandle(usize);
