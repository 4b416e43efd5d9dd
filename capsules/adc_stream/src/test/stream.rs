// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Pipeline scenarios: attach, stream, drain, read and detach against the
//! mock bus, alarm and allocator.

use core::cell::RefCell;
use std::boxed::Box;
use std::string::String;
use std::vec;
use std::vec::Vec;

use kernel::debug::{self, DebugWriter};
use kernel::deferred_call::{DynamicDeferredCall, DynamicDeferredCallClientState};
use kernel::hil::spi::{ClockPhase, ClockPolarity, SpiMasterDevice};
use kernel::hil::time::Alarm;
use kernel::ErrorCode;

use crate::adc122s101;
use crate::adc_stream::{
    poll_interval_ms, AdcStream, ReadClient, DEFAULT_BUS_SPEED_HZ, FIFO_LEN, NUM_DESCRIPTORS,
    TRANSFER_LEN,
};
use crate::descriptor::{Descriptor, DescriptorState};
use crate::test::{MockAlarm, MockAllocator, MockSpiBus, MockSpiDevice};

type Stream = AdcStream<'static, MockSpiDevice, MockAlarm>;

fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

fn buffer(len: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; len].into_boxed_slice())
}

std::thread_local! {
    static LOG: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Collects `debug!` output per test thread.
struct ThreadLog;

impl DebugWriter for ThreadLog {
    fn write(&self, bytes: &[u8]) {
        LOG.with(|log| {
            log.borrow_mut()
                .push_str(core::str::from_utf8(bytes).unwrap_or("<invalid utf-8>"))
        });
    }
}

/// Start capturing this thread's log from scratch.
fn capture_log() {
    LOG.with(|log| log.borrow_mut().clear());
    debug::set_debug_writer(leak(&ThreadLog as &dyn DebugWriter));
}

fn log_lines(pattern: &str) -> Vec<String> {
    LOG.with(|log| {
        log.borrow()
            .split("\r\n")
            .filter(|line| line.contains(pattern))
            .map(String::from)
            .collect()
    })
}

struct ReadRecorder {
    done: RefCell<Vec<(Result<usize, ErrorCode>, Vec<u8>)>>,
}

impl ReadClient for ReadRecorder {
    fn read_done(&self, buffer: &'static mut [u8], result: Result<usize, ErrorCode>) {
        let data = match result {
            Ok(count) => buffer[..count].to_vec(),
            Err(_) => Vec::new(),
        };
        self.done.borrow_mut().push((result, data));
    }
}

struct Harness {
    bus: &'static MockSpiBus,
    devices: [&'static MockSpiDevice; NUM_DESCRIPTORS],
    alarm: &'static MockAlarm,
    allocator: &'static MockAllocator,
    ddc: &'static DynamicDeferredCall<'static>,
    stream: &'static Stream,
    reader: &'static ReadRecorder,
}

impl Harness {
    fn new() -> Harness {
        Harness::with(DEFAULT_BUS_SPEED_HZ, DEFAULT_BUS_SPEED_HZ, FIFO_LEN)
    }

    fn with(device_rate: u32, bus_speed_hz: u32, fifo_len: usize) -> Harness {
        let bus = leak(MockSpiBus::new());
        let devices = [
            leak(MockSpiDevice::new(bus, device_rate)),
            leak(MockSpiDevice::new(bus, device_rate)),
        ];
        let descriptors = leak([
            Descriptor::new(0, devices[0]),
            Descriptor::new(1, devices[1]),
        ]);
        let allocator = leak(MockAllocator::new());
        let alarm = leak(MockAlarm::new());
        let states = leak::<[DynamicDeferredCallClientState<'static>; 1]>(Default::default());
        let ddc = leak(DynamicDeferredCall::new(states));
        let stream: &'static Stream = leak(AdcStream::new(
            descriptors,
            buffer(fifo_len),
            allocator,
            alarm,
            ddc,
            bus_speed_hz,
        ));

        for d in descriptors.iter() {
            d.setup();
            d.set_client(stream);
        }
        alarm.set_alarm_client(stream);
        stream.initialize_callback_handle(ddc.register(stream).unwrap());
        let reader = leak(ReadRecorder {
            done: RefCell::new(Vec::new()),
        });
        stream.set_read_client(reader);

        Harness {
            bus,
            devices,
            alarm,
            allocator,
            ddc,
            stream,
            reader,
        }
    }

    /// Attach, open and start streaming.
    fn streaming() -> Harness {
        let h = Harness::new();
        h.stream.attach().unwrap();
        h.stream.open().unwrap();
        assert_eq!(h.stream.write(b"on"), Ok(2));
        h
    }

    /// Run the kernel loop's deferred calls until none are left.
    fn service(&self) {
        while self.ddc.has_pending() {
            self.ddc.call();
        }
    }

    /// Complete everything in flight, then let the drain run.
    fn round(&self) {
        self.bus.complete_all();
        self.service();
    }

    fn states(&self) -> Vec<DescriptorState> {
        self.stream.descriptors().iter().map(|d| d.state()).collect()
    }

    fn count(&self, state: DescriptorState) -> usize {
        self.states().into_iter().filter(|&s| s == state).count()
    }

    /// Every descriptor is in at most one place: in flight, on the pending
    /// list or on the work list.
    fn assert_membership(&self) {
        assert_eq!(self.count(DescriptorState::InFlight), self.bus.in_flight());
        assert_eq!(self.count(DescriptorState::Pending), self.stream.pending_len());
        assert_eq!(self.stream.work_len(), 0);
        assert!(
            self.bus.in_flight() + self.stream.pending_len() + self.stream.work_len()
                <= NUM_DESCRIPTORS
        );
    }

    fn results(&self) -> Vec<Result<usize, ErrorCode>> {
        self.reader.done.borrow().iter().map(|(r, _)| *r).collect()
    }
}

#[test]
fn attach_prepares_every_descriptor() {
    let h = Harness::new();
    assert!(!h.stream.is_attached());
    h.stream.attach().unwrap();

    assert!(h.stream.is_attached());
    assert_eq!(h.stream.bus_speed_hz(), DEFAULT_BUS_SPEED_HZ);
    assert_eq!(h.allocator.outstanding_coherent(), 2 * NUM_DESCRIPTORS);
    for d in h.stream.descriptors() {
        assert!(d.has_buffers());
        assert_eq!(d.transfer_len(), TRANSFER_LEN);
        assert_eq!(d.state(), DescriptorState::Idle);
        assert_eq!(d.rate_override(), None);
    }
    for device in h.devices {
        assert_eq!(device.get_polarity(), ClockPolarity::IdleHigh);
        assert_eq!(device.get_phase(), ClockPhase::SampleTrailing);
    }

    assert_eq!(h.stream.attach(), Err(ErrorCode::ALREADY));
}

#[test]
fn attach_failure_frees_partial_allocations() {
    let h = Harness::new();
    h.allocator.fail_after(3);
    assert_eq!(h.stream.attach(), Err(ErrorCode::NOMEM));
    assert!(!h.stream.is_attached());
    assert_eq!(h.allocator.outstanding_coherent(), 0);

    h.allocator.fail_after(usize::MAX);
    h.stream.attach().unwrap();
}

#[test]
fn rate_overridden_when_device_default_differs() {
    let h = Harness::with(12_000_000, DEFAULT_BUS_SPEED_HZ, FIFO_LEN);
    h.stream.attach().unwrap();
    for d in h.stream.descriptors() {
        assert_eq!(d.rate_override(), Some(DEFAULT_BUS_SPEED_HZ));
    }
    h.stream.open().unwrap();
    h.stream.write(b"on").unwrap();
    assert_eq!(h.bus.last_rate(), Some(DEFAULT_BUS_SPEED_HZ));
}

#[test]
fn open_allocates_scratch_once() {
    let h = Harness::new();
    assert_eq!(h.stream.write(b"on"), Err(ErrorCode::RESERVE));

    h.stream.open().unwrap();
    h.stream.open().unwrap();
    assert_eq!(h.allocator.outstanding(), 1);
}

#[test]
fn start_stop_cycle() {
    let h = Harness::streaming();
    assert!(h.stream.is_streaming());
    assert_eq!(h.bus.in_flight(), NUM_DESCRIPTORS);
    assert_eq!(h.count(DescriptorState::InFlight), NUM_DESCRIPTORS);

    // Already streaming: no duplicate submissions.
    assert_eq!(h.stream.write(b"on"), Ok(2));
    assert_eq!(h.bus.submissions(), NUM_DESCRIPTORS);

    assert_eq!(h.stream.write(b"off"), Ok(3));
    assert!(!h.stream.is_streaming());
    assert_eq!(h.stream.write(b"off"), Ok(3));
    assert!(!h.stream.is_streaming());
}

#[test]
fn commands_ignore_case_and_unknown_input() {
    let h = Harness::new();
    h.stream.attach().unwrap();
    h.stream.open().unwrap();

    assert_eq!(h.stream.write(b"xyz"), Ok(3));
    assert!(!h.stream.is_streaming());
    assert_eq!(h.bus.submissions(), 0);

    assert_eq!(h.stream.write(b"ON\n"), Ok(3));
    assert!(h.stream.is_streaming());

    assert_eq!(h.stream.write(b"hello"), Ok(5));
    assert!(h.stream.is_streaming());

    // Only the first bytes are looked at, but all are consumed.
    let long = b"OFF and then some more text";
    assert_eq!(h.stream.write(long), Ok(long.len()));
    assert!(!h.stream.is_streaming());
}

#[test]
fn write_on_without_device() {
    let h = Harness::new();
    h.stream.open().unwrap();
    assert_eq!(h.stream.write(b"on"), Err(ErrorCode::NODEVICE));
    assert!(!h.stream.is_streaming());
}

#[test]
fn completion_defers_to_drain() {
    let h = Harness::streaming();

    assert_eq!(h.bus.complete_all(), NUM_DESCRIPTORS);
    // The upcall only queued the descriptors.
    assert_eq!(h.count(DescriptorState::Pending), NUM_DESCRIPTORS);
    assert_eq!(h.stream.fifo_len(), 0);
    assert!(h.ddc.has_pending());
    for d in h.stream.descriptors() {
        assert!(d.is_complete());
    }
    h.assert_membership();

    h.service();
    assert_eq!(h.stream.fifo_len(), NUM_DESCRIPTORS * TRANSFER_LEN);
    assert_eq!(h.bus.in_flight(), NUM_DESCRIPTORS);
    assert_eq!(h.bus.submissions(), 2 * NUM_DESCRIPTORS);
    h.assert_membership();
}

#[test]
fn membership_stays_exclusive() {
    let h = Harness::streaming();
    for _ in 0..5 {
        h.assert_membership();
        assert!(h.bus.complete_next());
        h.assert_membership();
        h.service();
        h.assert_membership();
    }
}

#[test]
fn stop_lets_in_flight_transfers_drain() {
    let h = Harness::streaming();
    h.round();
    assert_eq!(h.bus.in_flight(), NUM_DESCRIPTORS);

    h.stream.write(b"off").unwrap();
    h.round();
    let settled = h.stream.fifo_len();
    assert_eq!(settled, 2 * NUM_DESCRIPTORS * TRANSFER_LEN);
    assert_eq!(h.bus.in_flight(), 0);
    assert_eq!(h.count(DescriptorState::Idle), NUM_DESCRIPTORS);

    h.round();
    assert_eq!(h.stream.fifo_len(), settled);
    assert_eq!(h.bus.submissions(), 2 * NUM_DESCRIPTORS);
}

#[test]
fn restart_skips_descriptors_in_flight() {
    let h = Harness::streaming();
    h.stream.write(b"off").unwrap();
    h.stream.write(b"on").unwrap();
    assert!(h.stream.is_streaming());
    assert_eq!(h.bus.submissions(), NUM_DESCRIPTORS);

    // The drain picks them up again.
    h.round();
    assert_eq!(h.bus.in_flight(), NUM_DESCRIPTORS);
    assert_eq!(h.bus.submissions(), 2 * NUM_DESCRIPTORS);
}

#[test]
fn failed_start_leaves_streaming_off() {
    let h = Harness::new();
    h.stream.attach().unwrap();
    h.stream.open().unwrap();

    h.bus.fail_next_submit(ErrorCode::FAIL);
    assert_eq!(h.stream.write(b"on"), Err(ErrorCode::FAIL));
    assert!(!h.stream.is_streaming());
    assert_eq!(h.bus.in_flight(), 0);
    assert!(h.stream.descriptors().iter().all(|d| d.has_buffers()));

    assert_eq!(h.stream.write(b"on"), Ok(2));
    assert!(h.stream.is_streaming());
    assert_eq!(h.bus.in_flight(), NUM_DESCRIPTORS);
}

#[test]
fn failed_resubmit_stops_streaming() {
    let h = Harness::streaming();
    h.bus.fail_next_submit(ErrorCode::FAIL);
    h.round();

    assert!(!h.stream.is_streaming());
    assert_eq!(h.bus.in_flight(), 0);
    assert_eq!(h.count(DescriptorState::Idle), NUM_DESCRIPTORS);
    // Both blocks still made it into the FIFO.
    assert_eq!(h.stream.fifo_len(), NUM_DESCRIPTORS * TRANSFER_LEN);
}

#[test]
fn transfer_error_drops_samples_and_requeues() {
    let h = Harness::streaming();
    h.bus.fail_next_transfer(ErrorCode::FAIL);
    h.round();

    assert_eq!(h.stream.fifo_len(), TRANSFER_LEN);
    assert_eq!(h.bus.in_flight(), NUM_DESCRIPTORS);
    assert!(h.stream.is_streaming());
}

#[test]
fn fifo_overflow_drops_whole_blocks() {
    let h = Harness::with(
        DEFAULT_BUS_SPEED_HZ,
        DEFAULT_BUS_SPEED_HZ,
        NUM_DESCRIPTORS * TRANSFER_LEN,
    );
    h.stream.attach().unwrap();
    h.stream.open().unwrap();
    h.stream.write(b"on").unwrap();
    let capacity = h.stream.fifo_capacity();
    capture_log();

    h.round();
    assert_eq!(h.stream.fifo_len(), TRANSFER_LEN);
    assert!(h.stream.is_fifo_faulted());
    assert!(h.stream.is_streaming());
    assert_eq!(
        log_lines("fifo push"),
        ["adc_stream: fifo push returned 0 of 8192 bytes"]
    );

    // Still overflowing: no new log line.
    h.round();
    assert_eq!(h.stream.fifo_len(), TRANSFER_LEN);
    assert!(h.stream.fifo_len() <= capacity);
    assert!(h.stream.is_fifo_faulted());
    assert_eq!(log_lines("fifo push").len(), 1);

    h.stream.read(buffer(TRANSFER_LEN), TRANSFER_LEN).unwrap();
    h.service();
    assert_eq!(h.results(), [Ok(TRANSFER_LEN)]);
    assert_eq!(h.stream.fifo_len(), 0);

    assert!(h.bus.complete_next());
    h.service();
    assert!(!h.stream.is_fifo_faulted());
    assert_eq!(h.stream.fifo_len(), TRANSFER_LEN);
    assert_eq!(
        log_lines("fifo push"),
        [
            "adc_stream: fifo push returned 0 of 8192 bytes",
            "adc_stream: fifo push returned 8192 of 8192 bytes",
        ]
    );

    // Healthy pushes stay quiet.
    h.stream.read(buffer(TRANSFER_LEN), TRANSFER_LEN).unwrap();
    h.service();
    assert!(h.bus.complete_next());
    h.service();
    assert!(!h.stream.is_fifo_faulted());
    assert_eq!(log_lines("fifo push").len(), 2);
}

#[test]
fn completion_while_lists_held_is_not_lost() {
    let h = Harness::streaming();

    assert!(h.stream.with_lists_taken(|| h.bus.complete_next()));
    assert_eq!(h.count(DescriptorState::Pending), 1);
    assert_eq!(h.stream.pending_len(), 0);
    assert!(h.ddc.has_pending());

    h.service();
    assert_eq!(h.stream.fifo_len(), TRANSFER_LEN);
    assert_eq!(h.count(DescriptorState::Pending), 0);
    assert_eq!(h.bus.in_flight(), NUM_DESCRIPTORS);
    h.assert_membership();

    h.stream.write(b"off").unwrap();
    h.round();
    assert_eq!(h.count(DescriptorState::Idle), NUM_DESCRIPTORS);
    h.stream.detach().unwrap();
    h.stream.attach().unwrap();
}

#[test]
fn read_256_bytes_of_alternating_channels() {
    let h = Harness::streaming();
    let count = 256;

    h.stream.read(buffer(count), count).unwrap();
    h.service();
    assert!(h.results().is_empty());
    assert!(h.alarm.is_armed());
    assert_eq!(
        h.alarm.last_dt(),
        poll_interval_ms(count, DEFAULT_BUS_SPEED_HZ)
    );

    h.round();
    assert!(h.results().is_empty());
    assert!(h.alarm.fire());

    assert_eq!(h.results(), [Ok(count)]);
    assert_eq!(h.stream.offset(), count as u64);
    assert_eq!(
        h.stream.fifo_len(),
        NUM_DESCRIPTORS * TRANSFER_LEN - count
    );

    let done = h.reader.done.borrow();
    let data = &done[0].1;
    assert_eq!(data.len(), count);
    for (i, sample) in adc122s101::samples(data).enumerate() {
        assert_eq!(usize::from(sample >> 11), i % 2, "channel of word {}", i);
        assert_eq!(usize::from(sample & 0x7ff), i);
    }
}

#[test]
fn read_with_data_ready_completes_without_polling() {
    let h = Harness::streaming();
    h.round();

    h.stream.read(buffer(512), 300).unwrap();
    assert!(h.results().is_empty());
    h.service();

    assert_eq!(h.results(), [Ok(300)]);
    assert_eq!(h.alarm.fired(), 0);
    assert!(!h.alarm.is_armed());

    h.stream.read(buffer(100), 100).unwrap();
    h.service();
    assert_eq!(h.results(), [Ok(300), Ok(100)]);
    assert_eq!(h.stream.offset(), 400);
}

#[test]
fn read_polls_in_proportion_to_shortfall() {
    let bus_speed_hz = 1_000_000;
    let h = Harness::with(bus_speed_hz, bus_speed_hz, FIFO_LEN);
    h.stream.attach().unwrap();
    h.stream.open().unwrap();
    h.stream.write(b"on").unwrap();

    let count = TRANSFER_LEN + 1808;
    h.stream.read(buffer(count), count).unwrap();
    h.service();
    assert_eq!(h.alarm.last_dt(), poll_interval_ms(count, bus_speed_hz));
    assert_eq!(h.alarm.last_dt(), 80);

    assert!(h.bus.complete_next());
    h.service();
    assert!(h.alarm.fire());
    assert!(h.results().is_empty());
    assert_eq!(h.alarm.last_dt(), 14);

    // Nothing new arrived: the same interval again.
    assert!(h.alarm.fire());
    assert!(h.results().is_empty());
    assert_eq!(h.alarm.last_dt(), 14);

    assert!(h.bus.complete_next());
    h.service();
    assert!(h.alarm.fire());
    assert_eq!(h.results(), [Ok(count)]);
    assert_eq!(h.stream.fifo_len(), 2 * TRANSFER_LEN - count);
    assert_eq!(h.alarm.fired(), 3);
}

#[test]
fn read_argument_checks() {
    let h = Harness::new();
    let (e, _) = h.stream.read(buffer(16), 16).unwrap_err();
    assert_eq!(e, ErrorCode::NODEVICE);

    h.stream.attach().unwrap();
    let (e, _) = h.stream.read(buffer(16), 0).unwrap_err();
    assert_eq!(e, ErrorCode::INVAL);
    let (e, _) = h.stream.read(buffer(16), 17).unwrap_err();
    assert_eq!(e, ErrorCode::SIZE);
    let too_big = h.stream.fifo_capacity() + 1;
    let (e, _) = h.stream.read(buffer(too_big), too_big).unwrap_err();
    assert_eq!(e, ErrorCode::SIZE);

    h.stream.read(buffer(16), 16).unwrap();
    let (e, returned) = h.stream.read(buffer(32), 32).unwrap_err();
    assert_eq!(e, ErrorCode::BUSY);
    assert_eq!(returned.len(), 32);
}

#[test]
fn read_limited_to_what_whole_transfers_can_fill() {
    let h = Harness::new();
    assert_eq!(h.stream.max_read_len(), FIFO_LEN - TRANSFER_LEN);

    let h = Harness::with(
        DEFAULT_BUS_SPEED_HZ,
        DEFAULT_BUS_SPEED_HZ,
        NUM_DESCRIPTORS * TRANSFER_LEN,
    );
    h.stream.attach().unwrap();
    h.stream.open().unwrap();
    h.stream.write(b"on").unwrap();
    assert_eq!(h.stream.max_read_len(), TRANSFER_LEN);

    // One block fits, the next is dropped whole: one byte more never fills.
    let over = TRANSFER_LEN + 1;
    let (e, _) = h.stream.read(buffer(over), over).unwrap_err();
    assert_eq!(e, ErrorCode::SIZE);

    h.stream.read(buffer(TRANSFER_LEN), TRANSFER_LEN).unwrap();
    h.service();
    assert!(h.alarm.is_armed());
    h.round();
    assert!(h.alarm.fire());
    assert_eq!(h.results(), [Ok(TRANSFER_LEN)]);
}

#[test]
fn abort_read_returns_buffer() {
    let h = Harness::streaming();
    assert_eq!(h.stream.abort_read(), Err(ErrorCode::OFF));

    h.stream.read(buffer(64), 64).unwrap();
    h.service();
    assert!(h.alarm.is_armed());

    h.stream.abort_read().unwrap();
    assert!(!h.alarm.is_armed());
    h.service();
    assert_eq!(h.results(), [Err(ErrorCode::CANCEL)]);
    assert_eq!(h.stream.offset(), 0);

    // The slot is free again.
    h.round();
    h.stream.read(buffer(64), 64).unwrap();
    h.service();
    assert_eq!(h.results(), [Err(ErrorCode::CANCEL), Ok(64)]);
}

#[test]
fn stop_does_not_block_on_pending_read() {
    let h = Harness::streaming();
    h.stream.read(buffer(64), 64).unwrap();
    h.service();

    assert_eq!(h.stream.write(b"off"), Ok(3));
    assert!(!h.stream.is_streaming());

    h.round();
    assert!(h.alarm.fire());
    assert_eq!(h.results(), [Ok(64)]);
}

#[test]
fn detach_releases_buffers() {
    let h = Harness::streaming();
    h.round();
    h.stream.write(b"off").unwrap();
    h.round();
    assert_eq!(h.count(DescriptorState::Idle), NUM_DESCRIPTORS);

    h.stream.detach().unwrap();
    assert!(!h.stream.is_attached());
    assert_eq!(h.allocator.outstanding_coherent(), 0);
    assert_eq!(h.allocator.outstanding(), 0);
    assert_eq!(h.stream.detach(), Err(ErrorCode::NODEVICE));
}

#[test]
fn detach_while_streaming_frees_late_completions() {
    let h = Harness::streaming();
    h.stream.detach().unwrap();
    assert!(!h.stream.is_streaming());
    // Still on the bus.
    assert_eq!(h.allocator.outstanding_coherent(), 2 * NUM_DESCRIPTORS);
    assert_eq!(h.stream.attach(), Err(ErrorCode::BUSY));

    h.round();
    assert_eq!(h.allocator.outstanding_coherent(), 0);
    assert_eq!(h.bus.in_flight(), 0);
    assert_eq!(h.bus.submissions(), NUM_DESCRIPTORS);
    assert_eq!(h.stream.fifo_len(), 0);
    assert_eq!(h.count(DescriptorState::Idle), NUM_DESCRIPTORS);

    h.stream.attach().unwrap();
    h.stream.open().unwrap();
    h.stream.write(b"on").unwrap();
    assert_eq!(h.bus.in_flight(), NUM_DESCRIPTORS);
}

#[test]
fn detach_ends_pending_read() {
    let h = Harness::streaming();
    h.stream.read(buffer(64), 64).unwrap();
    h.service();
    assert!(h.alarm.is_armed());

    h.stream.detach().unwrap();
    assert!(!h.alarm.is_armed());
    h.service();
    assert_eq!(h.results(), [Err(ErrorCode::NODEVICE)]);
}

#[test]
fn reattach_before_service_still_ends_read() {
    let h = Harness::new();
    h.stream.attach().unwrap();
    h.stream.read(buffer(64), 64).unwrap();
    h.service();
    assert!(h.alarm.is_armed());

    h.stream.detach().unwrap();
    h.stream.attach().unwrap();
    h.service();
    assert_eq!(h.results(), [Err(ErrorCode::NODEVICE)]);
    assert!(!h.alarm.is_armed());

    // The next read belongs to the new attachment.
    h.stream.read(buffer(64), 64).unwrap();
    h.service();
    assert_eq!(h.results().len(), 1);
    assert!(h.alarm.is_armed());
}

#[test]
fn abort_after_detach_keeps_first_reason() {
    let h = Harness::new();
    h.stream.attach().unwrap();
    h.stream.read(buffer(64), 64).unwrap();
    h.service();

    h.stream.detach().unwrap();
    h.stream.abort_read().unwrap();
    h.service();
    assert_eq!(h.results(), [Err(ErrorCode::NODEVICE)]);
    assert_eq!(h.stream.abort_read(), Err(ErrorCode::OFF));
}
