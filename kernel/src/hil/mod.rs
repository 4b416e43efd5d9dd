// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Public traits for interfaces between capsules and chips.

pub mod dma;
pub mod spi;
pub mod time;
