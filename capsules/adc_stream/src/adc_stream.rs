// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Continuous sampling from an ADC122S101 / ADC128S052 into a byte FIFO.
//!
//! Every descriptor of the pool is kept in flight on the SPI bus while
//! streaming is on. The pipeline has two stages:
//!
//! - The SPI upcall (through [`DescriptorClient::transfer_done`]) only moves
//!   the finished descriptor onto the pending list and schedules a deferred
//!   call.
//! - The deferred call drains: it moves the pending list onto the work list,
//!   pushes each descriptor's samples into the FIFO and resubmits the
//!   descriptor if streaming is still on. A failed resubmission stops
//!   streaming.
//!
//! Consumers read fixed-size blocks. A read completes only once the FIFO holds
//! the whole block; until then the capsule polls the FIFO with an alarm whose
//! interval is the time the bus needs to clock in the missing bytes.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! # use kernel::static_init;
//! let descriptors = static_init!(
//!     [Descriptor<'static, VirtualSpiMasterDevice<'static, Spi>>; NUM_DESCRIPTORS],
//!     [Descriptor::new(0, adc_spi0), Descriptor::new(1, adc_spi1)]
//! );
//! let fifo = static_init!([u8; FIFO_LEN], [0; FIFO_LEN]);
//! let adc_stream = static_init!(
//!     AdcStream<'static, VirtualSpiMasterDevice<'static, Spi>, VirtualMuxAlarm<'static, Rtc>>,
//!     AdcStream::new(descriptors, fifo, allocator, alarm, dynamic_deferred_caller, DEFAULT_BUS_SPEED_HZ)
//! );
//! for descriptor in descriptors.iter() {
//!     descriptor.setup();
//!     descriptor.set_client(adc_stream);
//! }
//! alarm.set_alarm_client(adc_stream);
//! adc_stream.initialize_callback_handle(
//!     dynamic_deferred_caller.register(adc_stream).unwrap(),
//! );
//! adc_stream.attach().unwrap();
//! ```

use core::cell::Cell;

use kernel::collections::list::List;
use kernel::collections::queue::Queue;
use kernel::collections::ring_buffer::RingBuffer;
use kernel::deferred_call::{DeferredCallHandle, DynamicDeferredCall, DynamicDeferredCallClient};
use kernel::hil::dma::BufferAllocator;
use kernel::hil::spi::SpiMasterDevice;
use kernel::hil::time::{Alarm, AlarmClient, ConvertTicks};
use kernel::utilities::cells::{MapCell, OptionalCell, TakeCell};
use kernel::{debug, debug_verbose, ErrorCode};

use crate::descriptor::{Descriptor, DescriptorClient, DescriptorState};

/// Transfers kept in flight while streaming.
pub const NUM_DESCRIPTORS: usize = 2;
/// Conversions per transfer.
pub const READS_PER_TRANSFER: usize = 4096;
/// Bytes per transfer: one 16-bit frame per conversion.
pub const TRANSFER_LEN: usize = READS_PER_TRANSFER * 2;
/// Bytes of FIFO storage a board should provide.
pub const FIFO_LEN: usize = TRANSFER_LEN * NUM_DESCRIPTORS * 32;
/// Size of the command scratch buffer allocated on `open`.
pub const SCRATCH_LEN: usize = 128;
/// Bytes of a write that are looked at for a command.
pub const MAX_COMMAND_LEN: usize = 8;
/// Bus clock giving about 93750 samples/s. The chips top out at 16 MHz.
pub const DEFAULT_BUS_SPEED_HZ: u32 = 3_000_000;

/// Receives completed reads.
pub trait ReadClient {
    /// `result` is `Ok(count)` with exactly the requested count, or the
    /// reason the read ended early. The buffer is always returned.
    fn read_done(&self, buffer: &'static mut [u8], result: Result<usize, ErrorCode>);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    On,
    Off,
    Other,
}

impl Command {
    /// Commands are matched case-insensitively as prefixes of the window, so
    /// a trailing newline or anything else after them is ignored.
    fn parse(window: &[u8]) -> Command {
        let starts_with = |cmd: &[u8]| {
            window.len() >= cmd.len() && window[..cmd.len()].eq_ignore_ascii_case(cmd)
        };
        if starts_with(b"on") {
            Command::On
        } else if starts_with(b"off") {
            Command::Off
        } else {
            Command::Other
        }
    }
}

/// Non-reentrant exclusion flag. Contention means the caller has to try
/// again later, reported as `BUSY`.
struct Guard {
    held: Cell<bool>,
}

struct GuardHeld<'g> {
    guard: &'g Guard,
}

impl Guard {
    const fn new() -> Guard {
        Guard {
            held: Cell::new(false),
        }
    }

    fn try_lock(&self) -> Result<GuardHeld<'_>, ErrorCode> {
        if self.held.replace(true) {
            Err(ErrorCode::BUSY)
        } else {
            Ok(GuardHeld { guard: self })
        }
    }
}

impl Drop for GuardHeld<'_> {
    fn drop(&mut self) {
        self.guard.held.set(false);
    }
}

struct DescriptorLists<'a, S: SpiMasterDevice<'a>> {
    /// Filled by the SPI upcall.
    pending: List<'a, Descriptor<'a, S>>,
    /// Consumed by the drain.
    work: List<'a, Descriptor<'a, S>>,
}

/// Milliseconds to wait for `shortfall` more bytes at `bus_speed_hz`: eight
/// bus clocks per byte, never less than one millisecond.
pub fn poll_interval_ms(shortfall: usize, bus_speed_hz: u32) -> u32 {
    let ms = (shortfall as u64 * 8000) / u64::from(bus_speed_hz.max(1));
    u32::try_from(ms).unwrap_or(u32::MAX).max(1)
}

pub struct AdcStream<'a, S: SpiMasterDevice<'a>, A: Alarm<'a>> {
    descriptors: &'a [Descriptor<'a, S>],
    allocator: &'a dyn BufferAllocator,
    alarm: &'a A,
    deferred_caller: &'a DynamicDeferredCall<'a>,
    handle: OptionalCell<DeferredCallHandle>,
    bus_speed_hz: u32,

    attached: Cell<bool>,
    streaming: Cell<bool>,
    bus_guard: Guard,
    control_guard: Guard,
    lists: MapCell<DescriptorLists<'a, S>>,
    fifo: MapCell<RingBuffer<'a, u8>>,
    fifo_faulted: Cell<bool>,
    scratch: TakeCell<'static, [u8]>,

    read_client: OptionalCell<&'a dyn ReadClient>,
    read_buffer: TakeCell<'static, [u8]>,
    read_len: Cell<usize>,
    read_iteration: Cell<usize>,
    /// Why the pending read ended before its data arrived.
    read_ended: OptionalCell<ErrorCode>,
    poll_now: Cell<bool>,
    offset: Cell<u64>,
}

impl<'a, S: SpiMasterDevice<'a>, A: Alarm<'a>> AdcStream<'a, S, A> {
    pub fn new(
        descriptors: &'a [Descriptor<'a, S>],
        fifo: &'a mut [u8],
        allocator: &'a dyn BufferAllocator,
        alarm: &'a A,
        deferred_caller: &'a DynamicDeferredCall<'a>,
        bus_speed_hz: u32,
    ) -> AdcStream<'a, S, A> {
        AdcStream {
            descriptors,
            allocator,
            alarm,
            deferred_caller,
            handle: OptionalCell::empty(),
            bus_speed_hz,
            attached: Cell::new(false),
            streaming: Cell::new(false),
            bus_guard: Guard::new(),
            control_guard: Guard::new(),
            lists: MapCell::new(DescriptorLists {
                pending: List::new(),
                work: List::new(),
            }),
            fifo: MapCell::new(RingBuffer::new(fifo)),
            fifo_faulted: Cell::new(false),
            scratch: TakeCell::empty(),
            read_client: OptionalCell::empty(),
            read_buffer: TakeCell::empty(),
            read_len: Cell::new(0),
            read_iteration: Cell::new(0),
            read_ended: OptionalCell::empty(),
            poll_now: Cell::new(false),
            offset: Cell::new(0),
        }
    }

    pub fn initialize_callback_handle(&self, handle: DeferredCallHandle) {
        self.handle.set(handle);
    }

    pub fn set_read_client(&self, client: &'a dyn ReadClient) {
        self.read_client.set(client);
    }

    pub fn bus_speed_hz(&self) -> u32 {
        self.bus_speed_hz
    }

    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.get()
    }

    /// Total bytes handed to readers.
    pub fn offset(&self) -> u64 {
        self.offset.get()
    }

    /// Bytes waiting in the FIFO.
    pub fn fifo_len(&self) -> usize {
        self.fifo.map_or(0, |fifo| fifo.len())
    }

    pub fn fifo_capacity(&self) -> usize {
        self.fifo.map_or(0, |fifo| fifo.capacity())
    }

    /// Longest read the FIFO is always able to satisfy. Samples arrive in
    /// whole transfers, so occupancy can stall up to one transfer short of
    /// capacity.
    pub fn max_read_len(&self) -> usize {
        (self.fifo_capacity() + 1).saturating_sub(TRANSFER_LEN)
    }

    /// Whether the last FIFO push was short.
    pub fn is_fifo_faulted(&self) -> bool {
        self.fifo_faulted.get()
    }

    pub fn descriptors(&self) -> &'a [Descriptor<'a, S>] {
        self.descriptors
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.lists.map_or(0, |lists| lists.pending.iter().count())
    }

    #[cfg(test)]
    pub(crate) fn work_len(&self) -> usize {
        self.lists.map_or(0, |lists| lists.work.iter().count())
    }

    /// Run `f` while the descriptor lists are held, as the drain holds them.
    #[cfg(test)]
    pub(crate) fn with_lists_taken<R>(&self, f: impl FnOnce() -> R) -> R {
        let lists = self.lists.take();
        let result = f();
        if let Some(lists) = lists {
            self.lists.replace(lists);
        }
        result
    }

    fn schedule_deferred(&self) -> Result<(), ErrorCode> {
        self.handle
            .get()
            .and_then(|handle| self.deferred_caller.set(handle))
            .map(|_| ())
            .ok_or(ErrorCode::FAIL)
    }

    /// The device showed up on the bus: allocate the transfer buffers, put
    /// the chip in SPI mode 3 and prepare every descriptor.
    ///
    /// If an allocation fails, whatever this call allocated is freed again.
    pub fn attach(&self) -> Result<(), ErrorCode> {
        let _bus = self.bus_guard.try_lock()?;
        if self.attached.get() {
            return Err(ErrorCode::ALREADY);
        }
        // A descriptor of the previous attachment has not drained yet.
        if self
            .descriptors
            .iter()
            .any(|d| d.state() != DescriptorState::Idle)
        {
            return Err(ErrorCode::BUSY);
        }

        let mut max_speed_hz = 0;
        let prepared = self.descriptors.iter().try_for_each(|d| {
            d.install_buffers(self.allocator, TRANSFER_LEN)?;
            max_speed_hz = d.configure()?;
            d.initialize(self.bus_speed_hz)
        });
        if let Err(e) = prepared {
            for d in self.descriptors.iter() {
                d.release_buffers(self.allocator);
            }
            debug!("adc_stream: attach failed: {:?}", e);
            return Err(e);
        }

        self.fifo.map(|fifo| fifo.empty());
        self.fifo_faulted.set(false);
        self.attached.set(true);

        debug!(
            "adc_stream: SPI max_speed_hz {} Hz  bus_speed {} Hz",
            max_speed_hz, self.bus_speed_hz
        );
        Ok(())
    }

    /// The device went away. Streaming stops, idle descriptors free their
    /// buffers now and descriptors still in flight free theirs once their
    /// completion drains. A pending read completes with `NODEVICE`.
    pub fn detach(&self) -> Result<(), ErrorCode> {
        let _bus = self.bus_guard.try_lock()?;
        if !self.attached.get() {
            return Err(ErrorCode::NODEVICE);
        }
        self.attached.set(false);
        self.streaming.set(false);

        for d in self
            .descriptors
            .iter()
            .filter(|d| d.state() == DescriptorState::Idle)
        {
            d.release_buffers(self.allocator);
        }
        if let Some(buf) = self.scratch.take() {
            self.allocator.free(buf);
        }

        if self.read_buffer.is_some() {
            self.alarm.disarm();
            self.end_read(ErrorCode::NODEVICE);
            self.poll_now.set(true);
            self.schedule_deferred()?;
        }
        Ok(())
    }

    /// Allocate the command scratch buffer if this is the first open.
    pub fn open(&self) -> Result<(), ErrorCode> {
        let _control = self.control_guard.try_lock()?;
        if self.scratch.is_none() {
            let buf = self.allocator.alloc(SCRATCH_LEN)?;
            self.scratch.replace(buf);
        }
        Ok(())
    }

    /// Accept a control command. `"on"` starts streaming and `"off"` stops
    /// it; anything else is consumed without effect. Only the first
    /// [`MAX_COMMAND_LEN`] bytes are looked at. Returns `data.len()`.
    pub fn write(&self, data: &[u8]) -> Result<usize, ErrorCode> {
        let _control = self.control_guard.try_lock()?;

        let command = self
            .scratch
            .map(|scratch| {
                scratch.fill(0);
                let len = data.len().min(MAX_COMMAND_LEN).min(scratch.len());
                scratch[..len].copy_from_slice(&data[..len]);
                Command::parse(&scratch[..MAX_COMMAND_LEN.min(scratch.len())])
            })
            .ok_or(ErrorCode::RESERVE)?;

        match command {
            Command::On if !self.streaming.get() => self.start()?,
            Command::Off => self.stop(),
            _ => {}
        }
        Ok(data.len())
    }

    /// Submit every idle descriptor and mark the device streaming.
    ///
    /// Descriptors still in the pipeline from an earlier run are left alone;
    /// the drain resubmits them. If any submission fails streaming stays off
    /// and the error is returned. Descriptors that did go out complete and
    /// drain once without being resubmitted.
    pub fn start(&self) -> Result<(), ErrorCode> {
        if self.streaming.get() {
            return Ok(());
        }
        if !self.attached.get() {
            return Err(ErrorCode::NODEVICE);
        }

        for d in self
            .descriptors
            .iter()
            .filter(|d| d.state() == DescriptorState::Idle)
        {
            if let Err(e) = self.submit(d) {
                debug!("adc_stream: start: submit {} failed: {:?}", d.index(), e);
                return Err(e);
            }
        }
        self.streaming.set(true);
        Ok(())
    }

    /// Stop resubmitting. Transfers in flight complete and drain normally.
    pub fn stop(&self) {
        self.streaming.set(false);
    }

    /// Read exactly `count` bytes of samples into `buffer`.
    ///
    /// Returns at once; [`ReadClient::read_done`] is called with `Ok(count)`
    /// once the FIFO held `count` bytes and they were copied out, or with the
    /// reason the read ended: `CANCEL` after [`AdcStream::abort_read`],
    /// `NODEVICE` after [`AdcStream::detach`].
    pub fn read(
        &self,
        buffer: &'static mut [u8],
        count: usize,
    ) -> Result<(), (ErrorCode, &'static mut [u8])> {
        let _control = match self.control_guard.try_lock() {
            Ok(held) => held,
            Err(e) => return Err((e, buffer)),
        };

        let check = if self.read_buffer.is_some() {
            Err(ErrorCode::BUSY)
        } else if !self.attached.get() {
            Err(ErrorCode::NODEVICE)
        } else if count == 0 || self.bus_speed_hz == 0 {
            Err(ErrorCode::INVAL)
        } else if count > buffer.len() || count > self.max_read_len() {
            Err(ErrorCode::SIZE)
        } else {
            Ok(())
        };
        if let Err(e) = check {
            return Err((e, buffer));
        }

        self.read_len.set(count);
        self.read_iteration.set(0);
        self.read_ended.clear();
        self.read_buffer.replace(buffer);
        self.poll_now.set(true);
        if let Err(e) = self.schedule_deferred() {
            self.poll_now.set(false);
            return match self.read_buffer.take() {
                Some(buffer) => Err((e, buffer)),
                None => Ok(()),
            };
        }
        Ok(())
    }

    /// Give up on the pending read. Its buffer comes back through
    /// [`ReadClient::read_done`] with `CANCEL`.
    pub fn abort_read(&self) -> Result<(), ErrorCode> {
        if self.read_buffer.is_none() {
            return Err(ErrorCode::OFF);
        }
        self.alarm.disarm();
        self.end_read(ErrorCode::CANCEL);
        self.poll_now.set(true);
        self.schedule_deferred()
    }

    /// The first reason given sticks; the read completes with it on the next
    /// poll whatever happens to the device in between.
    fn end_read(&self, reason: ErrorCode) {
        if self.read_ended.is_none() {
            self.read_ended.set(reason);
        }
    }

    /// Check whether the pending read can complete, arming the alarm for the
    /// next check if it cannot.
    fn poll_read(&self) {
        if self.read_buffer.is_none() {
            return;
        }
        let count = self.read_len.get();

        let result = if let Some(reason) = self.read_ended.take() {
            Err(reason)
        } else if !self.attached.get() {
            Err(ErrorCode::NODEVICE)
        } else {
            let available = self.fifo_len();
            if available < count {
                let wait_ms = poll_interval_ms(count - available, self.bus_speed_hz);
                debug_verbose!(
                    "adc_stream: read iter {}, len {} < count {}, sleeping {} ms",
                    self.read_iteration.get(),
                    available,
                    count,
                    wait_ms
                );
                self.read_iteration.set(self.read_iteration.get() + 1);
                let dt = self
                    .alarm
                    .ticks_from_ms(wait_ms)
                    .max(self.alarm.minimum_dt());
                self.alarm.set_alarm(self.alarm.now(), dt);
                return;
            }
            Ok(count)
        };

        let Some(buffer) = self.read_buffer.take() else {
            return;
        };
        let result = result.map(|count| {
            let copied = self
                .fifo
                .map_or(0, |fifo| fifo.dequeue_into(&mut buffer[..count]));
            self.offset.set(self.offset.get() + copied as u64);
            copied
        });
        self.read_client
            .map(|client| client.read_done(buffer, result));
    }

    /// Engine: hand one descriptor to the bus.
    fn submit(&self, descriptor: &Descriptor<'a, S>) -> Result<(), ErrorCode> {
        if !self.attached.get() {
            return Err(ErrorCode::NODEVICE);
        }
        let _bus = self.bus_guard.try_lock()?;
        descriptor.submit()
    }

    /// Move every completed descriptor's samples into the FIFO and resubmit
    /// the descriptor while streaming.
    fn drain(&self) {
        // These closures never call out, so the SPI upcall can not find the
        // lists taken.
        self.lists.map(|lists| {
            lists.pending.splice_onto(&lists.work);
            for d in lists.work.iter() {
                d.set_state(DescriptorState::Working);
            }
            // Completions that found the lists held are marked but unlinked.
            for d in self
                .descriptors
                .iter()
                .filter(|d| d.state() == DescriptorState::Pending)
            {
                lists.work.push_tail(d);
                d.set_state(DescriptorState::Working);
            }
        });

        while let Some(d) = self.lists.map(|lists| lists.work.pop_head()).flatten() {
            if !self.attached.get() {
                // Late completion after detach.
                debug!("adc_stream: descriptor {} drained after detach", d.index());
                d.release_buffers(self.allocator);
                d.set_state(DescriptorState::Idle);
                continue;
            }

            match d.status() {
                Ok(()) => {
                    let bus = match self.bus_guard.try_lock() {
                        Ok(held) => held,
                        Err(_) => {
                            // Put it back and retry on the next pass.
                            self.lists.map(|lists| lists.work.push_head(d));
                            let _ = self.schedule_deferred();
                            return;
                        }
                    };
                    self.push_samples(d);
                    drop(bus);
                }
                Err(e) => {
                    debug!("adc_stream: transfer {} failed: {:?}", d.index(), e);
                }
            }

            if self.streaming.get() {
                if let Err(e) = self.submit(d) {
                    debug!("adc_stream: resubmit {} failed: {:?}, stopping", d.index(), e);
                    self.streaming.set(false);
                    d.set_state(DescriptorState::Idle);
                }
            } else {
                d.set_state(DescriptorState::Idle);
            }
        }
    }

    fn push_samples(&self, d: &Descriptor<'a, S>) {
        let expected = d.transfer_len();
        let pushed = d
            .map_received(|samples| {
                self.fifo
                    .map_or(0, |fifo| fifo.enqueue_slice(samples))
            })
            .unwrap_or(0);

        let faulty = pushed != expected;
        if faulty != self.fifo_faulted.get() {
            self.fifo_faulted.set(faulty);
            debug!(
                "adc_stream: fifo push returned {} of {} bytes",
                pushed, expected
            );
        }
    }
}

impl<'a, S: SpiMasterDevice<'a>, A: Alarm<'a>> DescriptorClient for AdcStream<'a, S, A> {
    fn transfer_done(&self, index: usize) {
        let Some(d) = self.descriptors.get(index) else {
            return;
        };
        if self.lists.map(|lists| lists.pending.push_tail(d)).is_none() {
            debug!(
                "adc_stream: completion of {} raced the drain, deferring",
                index
            );
        }
        if self.schedule_deferred().is_err() {
            debug!("adc_stream: no deferred call registered");
        }
    }
}

impl<'a, S: SpiMasterDevice<'a>, A: Alarm<'a>> DynamicDeferredCallClient for AdcStream<'a, S, A> {
    fn call(&self, _handle: DeferredCallHandle) {
        self.drain();
        if self.poll_now.take() {
            self.poll_read();
        }
    }
}

impl<'a, S: SpiMasterDevice<'a>, A: Alarm<'a>> AlarmClient for AdcStream<'a, S, A> {
    fn alarm(&self) {
        self.poll_read();
    }
}
