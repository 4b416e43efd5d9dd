// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Capsule streaming samples from a SPI-attached TI ADC122S101 / ADC128S052.
//!
//! - [`adc122s101`]: command and result frame encoding.
//! - [`descriptor`]: the pool of reusable transfers.
//! - [`adc_stream`]: the pipeline and the open/write/read control surface.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod adc122s101;
pub mod adc_stream;
pub mod descriptor;

#[cfg(test)]
pub mod test;
