// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interfaces for SPI controller (master) communication.
//!
//! Capsules talk to one peripheral through a [`SpiMasterDevice`], which is
//! bound to a single chip select. A bus virtualizer hands out one device per
//! client and serializes their transfers on the shared controller.

use crate::ErrorCode;

/// Clock polarity (CPOL) defines whether the SPI clock is high or low when
/// idle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockPolarity {
    /// The clock is low when the SPI bus is not active. This is CPOL = 0.
    IdleLow,
    /// The clock is high when the SPI bus is not active. This is CPOL = 1.
    IdleHigh,
}

/// Clock phase (CPHA) defines whether to sample and send data on a leading or
/// trailing clock edge.
///
/// Consult a SPI reference on how CPHA interacts with CPOL.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockPhase {
    /// Sample on the leading clock edge. This is CPHA = 0.
    SampleLeading,
    /// Sample on the trailing clock edge. This is CPHA = 1.
    SampleTrailing,
}

/// Trait for clients of a SPI bus in master mode.
pub trait SpiMasterClient {
    /// Callback issued when a read/write operation finishes.
    ///
    /// `write_buffer` and `read_buffer` are the buffers passed to
    /// [`SpiMasterDevice::read_write_bytes`]. The contents of `write_buffer`
    /// are unmodified, while `read_buffer` contains the bytes read over SPI.
    /// `len` is the number of bytes that were requested and `status` reports
    /// whether the transfer completed.
    fn read_write_done(
        &self,
        write_buffer: &'static mut [u8],
        read_buffer: Option<&'static mut [u8]>,
        len: usize,
        status: Result<(), ErrorCode>,
    );
}

/// Trait for interacting with SPI peripheral devices at a byte or buffer
/// level.
///
/// Using `SpiMasterDevice` a client cannot change the chip select line. The
/// device accepts one `read_write_bytes` at a time; a second call before the
/// previous one called back returns `BUSY`.
pub trait SpiMasterDevice<'a> {
    /// Set the callback for read_write operations.
    fn set_client(&self, client: &'a dyn SpiMasterClient);

    /// Configure the bus for this chip select.
    fn configure(&self, cpol: ClockPolarity, cpal: ClockPhase, rate: u32) -> Result<(), ErrorCode>;

    /// Perform an asynchronous read/write operation, whose completion is
    /// signaled by invoking [`SpiMasterClient::read_write_done`] on the
    /// client. Never calls back from within this call.
    ///
    /// On error the buffers are handed back to the caller.
    fn read_write_bytes(
        &self,
        write_buffer: &'static mut [u8],
        read_buffer: Option<&'static mut [u8]>,
        len: usize,
    ) -> Result<(), (ErrorCode, &'static mut [u8], Option<&'static mut [u8]>)>;

    /// Change the clock rate used for this chip select.
    fn set_rate(&self, rate: u32) -> Result<(), ErrorCode>;

    /// Return the current chip select's clock rate.
    fn get_rate(&self) -> u32;

    /// Change the bus polarity for this chip select.
    fn set_polarity(&self, polarity: ClockPolarity) -> Result<(), ErrorCode>;

    /// Return the current bus polarity.
    fn get_polarity(&self) -> ClockPolarity;

    /// Change the bus phase for this chip select.
    fn set_phase(&self, phase: ClockPhase) -> Result<(), ErrorCode>;

    /// Get the current bus phase for the current chip select.
    fn get_phase(&self) -> ClockPhase;
}
