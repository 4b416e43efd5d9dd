// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Reusable SPI transfer descriptors.
//!
//! A descriptor pairs a DMA-coherent transmit buffer holding the command
//! template with a receive buffer for the sampled frames, and drives one
//! chip-select-bound [`SpiMasterDevice`]. At most one transfer per descriptor
//! is in flight; the buffers live in the descriptor whenever the transfer is
//! not.
//!
//! Ownership cycles through the states of [`DescriptorState`]:
//!
//! ```text
//! Idle --submit--> InFlight --read_write_done--> Pending --drain--> Working
//!   ^                 ^                                               |
//!   |                 +-------------------resubmit--------------------+
//!   +-------------------------------not streaming---------------------+
//! ```

use core::cell::Cell;
use core::cmp;

use kernel::collections::list::{ListLink, ListNode};
use kernel::hil::dma::{BufferAllocator, DmaBuffer};
use kernel::hil::spi::{ClockPhase, ClockPolarity, SpiMasterClient, SpiMasterDevice};
use kernel::utilities::cells::{OptionalCell, TakeCell};
use kernel::ErrorCode;

use crate::adc122s101;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorState {
    /// Owned by the pool, not queued anywhere.
    Idle,
    /// Handed to the SPI device; buffers are away.
    InFlight,
    /// Completed and waiting on the pending list.
    Pending,
    /// Taken by the drain worker.
    Working,
}

/// Notified when a descriptor's transfer has completed.
pub trait DescriptorClient {
    fn transfer_done(&self, index: usize);
}

pub struct Descriptor<'a, S: SpiMasterDevice<'a>> {
    index: usize,
    spi: &'a S,
    tx_buffer: TakeCell<'static, [u8]>,
    rx_buffer: TakeCell<'static, [u8]>,
    tx_dma: Cell<usize>,
    rx_dma: Cell<usize>,
    len: Cell<usize>,
    received: Cell<usize>,
    rate_override: OptionalCell<u32>,
    state: Cell<DescriptorState>,
    complete: Cell<bool>,
    status: Cell<Result<(), ErrorCode>>,
    next: ListLink<'a, Descriptor<'a, S>>,
    client: OptionalCell<&'a dyn DescriptorClient>,
}

impl<'a, S: SpiMasterDevice<'a>> ListNode<'a, Descriptor<'a, S>> for Descriptor<'a, S> {
    fn next(&'a self) -> &'a ListLink<'a, Descriptor<'a, S>> {
        &self.next
    }
}

impl<'a, S: SpiMasterDevice<'a>> Descriptor<'a, S> {
    pub fn new(index: usize, spi: &'a S) -> Descriptor<'a, S> {
        Descriptor {
            index,
            spi,
            tx_buffer: TakeCell::empty(),
            rx_buffer: TakeCell::empty(),
            tx_dma: Cell::new(0),
            rx_dma: Cell::new(0),
            len: Cell::new(0),
            received: Cell::new(0),
            rate_override: OptionalCell::empty(),
            state: Cell::new(DescriptorState::Idle),
            complete: Cell::new(false),
            status: Cell::new(Ok(())),
            next: ListLink::empty(),
            client: OptionalCell::empty(),
        }
    }

    /// Register as the client of the SPI device.
    pub fn setup(&'a self) {
        self.spi.set_client(self);
    }

    pub fn set_client(&self, client: &'a dyn DescriptorClient) {
        self.client.set(client);
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> DescriptorState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: DescriptorState) {
        self.state.set(state);
    }

    /// Whether the last submitted transfer has called back.
    pub fn is_complete(&self) -> bool {
        self.complete.get()
    }

    /// Outcome of the last completed transfer.
    pub fn status(&self) -> Result<(), ErrorCode> {
        self.status.get()
    }

    /// Bus addresses of the transmit and receive buffers.
    pub fn dma_addresses(&self) -> (usize, usize) {
        (self.tx_dma.get(), self.rx_dma.get())
    }

    pub fn transfer_len(&self) -> usize {
        self.len.get()
    }

    /// Clock rate applied before each transfer, if the device default
    /// differs from the configured bus speed.
    pub fn rate_override(&self) -> Option<u32> {
        self.rate_override.get()
    }

    pub fn has_buffers(&self) -> bool {
        self.tx_buffer.is_some() && self.rx_buffer.is_some()
    }

    /// Allocate the transmit and receive buffers. On failure nothing stays
    /// allocated.
    pub fn install_buffers(
        &self,
        allocator: &dyn BufferAllocator,
        len: usize,
    ) -> Result<(), ErrorCode> {
        if self.tx_buffer.is_some() || self.rx_buffer.is_some() {
            return Err(ErrorCode::ALREADY);
        }
        let rx = allocator.alloc_coherent(len)?;
        let tx = match allocator.alloc_coherent(len) {
            Ok(tx) => tx,
            Err(e) => {
                allocator.free_coherent(rx);
                return Err(e);
            }
        };
        self.rx_dma.set(rx.dma_addr);
        self.rx_buffer.replace(rx.buf);
        self.tx_dma.set(tx.dma_addr);
        self.tx_buffer.replace(tx.buf);
        Ok(())
    }

    /// Free whichever buffers the descriptor currently holds.
    pub fn release_buffers(&self, allocator: &dyn BufferAllocator) {
        if let Some(buf) = self.tx_buffer.take() {
            allocator.free_coherent(DmaBuffer {
                buf,
                dma_addr: self.tx_dma.take(),
            });
        }
        if let Some(buf) = self.rx_buffer.take() {
            allocator.free_coherent(DmaBuffer {
                buf,
                dma_addr: self.rx_dma.take(),
            });
        }
        self.len.set(0);
        self.received.set(0);
    }

    /// Put the device in SPI mode 3 and report its default clock rate.
    pub fn configure(&self) -> Result<u32, ErrorCode> {
        let rate = self.spi.get_rate();
        self.spi
            .configure(ClockPolarity::IdleHigh, ClockPhase::SampleTrailing, rate)?;
        Ok(rate)
    }

    /// Prepare the descriptor for its next transfer: clear the completion
    /// flag, lay down the command template, zero the receive buffer and pick
    /// the clock rate. Safe to call again on an idle descriptor.
    pub fn initialize(&self, bus_speed_hz: u32) -> Result<(), ErrorCode> {
        if self.state.get() == DescriptorState::InFlight {
            return Err(ErrorCode::BUSY);
        }
        if !self.has_buffers() {
            return Err(ErrorCode::RESERVE);
        }

        self.complete.set(false);
        self.status.set(Ok(()));
        self.received.set(0);

        let tx_len = self.tx_buffer.map_or(0, |tx| {
            adc122s101::fill_command_template(tx);
            tx.len()
        });
        let rx_len = self.rx_buffer.map_or(0, |rx| {
            rx.fill(0);
            rx.len()
        });
        self.len.set(cmp::min(tx_len, rx_len));

        if self.spi.get_rate() != bus_speed_hz {
            self.rate_override.set(bus_speed_hz);
        } else {
            self.rate_override.clear();
        }
        Ok(())
    }

    /// Start the transfer. Returns immediately; completion arrives through
    /// the SPI upcall.
    pub fn submit(&self) -> Result<(), ErrorCode> {
        if self.state.get() == DescriptorState::InFlight {
            return Err(ErrorCode::BUSY);
        }
        if !self.has_buffers() || self.len.get() == 0 {
            return Err(ErrorCode::RESERVE);
        }
        if let Some(rate) = self.rate_override.get() {
            self.spi.set_rate(rate)?;
        }

        let (Some(tx), rx) = (self.tx_buffer.take(), self.rx_buffer.take()) else {
            return Err(ErrorCode::RESERVE);
        };
        self.complete.set(false);
        self.state.set(DescriptorState::InFlight);
        self.spi
            .read_write_bytes(tx, rx, self.len.get())
            .map_err(|(e, tx, rx)| {
                self.tx_buffer.replace(tx);
                self.rx_buffer.put(rx);
                self.state.set(DescriptorState::Idle);
                e
            })
    }

    /// Run `closure` over the bytes received by the last transfer.
    pub fn map_received<F, R>(&self, closure: F) -> Option<R>
    where
        F: FnOnce(&[u8]) -> R,
    {
        let received = self.received.get();
        self.rx_buffer
            .map(|rx| closure(&rx[..cmp::min(received, rx.len())]))
    }
}

impl<'a, S: SpiMasterDevice<'a>> SpiMasterClient for Descriptor<'a, S> {
    fn read_write_done(
        &self,
        write_buffer: &'static mut [u8],
        read_buffer: Option<&'static mut [u8]>,
        len: usize,
        status: Result<(), ErrorCode>,
    ) {
        self.tx_buffer.replace(write_buffer);
        self.rx_buffer.put(read_buffer);
        self.received.set(if status.is_ok() { len } else { 0 });
        self.status.set(status);
        self.complete.set(true);
        self.state.set(DescriptorState::Pending);
        self.client.map(|client| client.transfer_done(self.index));
    }
}
