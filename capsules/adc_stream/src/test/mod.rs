// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Host-side stand-ins for the HIL implementations a board provides.
//!
//! Nothing here runs on its own: tests complete transfers, advance time and
//! service deferred calls explicitly, so every interleaving is reproducible.

mod stream;

pub use mock::{MockAlarm, MockAllocator, MockSpiBus, MockSpiDevice};
