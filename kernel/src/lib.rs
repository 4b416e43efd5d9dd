// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Core support crate for the streaming ADC stack.
//!
//! The kernel crate holds the pieces that capsules share: the Hardware
//! Interface Layer (HIL) definitions for SPI, alarms and DMA-capable memory,
//! the cell types used to share state in a single-threaded event-driven
//! system, the collections (ring buffer and intrusive list), deferred calls
//! and the `debug!` output facility.
//!
//! Most `unsafe` code is in this kernel crate.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod collections;
pub mod debug;
pub mod deferred_call;
pub mod errorcode;
pub mod hil;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
