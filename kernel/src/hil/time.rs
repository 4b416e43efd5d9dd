// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Hardware agnostic interfaces for counter-like resources.

/// Trait to represent clock frequency in Hz
///
/// This trait is used as an associated type for `Alarm` so clients can portably
/// convert native cycles to real-time values.
pub trait Frequency {
    /// Returns frequency in Hz.
    fn frequency() -> u32;
}

/// 32KHz `Frequency`
#[derive(Debug)]
pub struct Freq32KHz;
impl Frequency for Freq32KHz {
    fn frequency() -> u32 {
        32768
    }
}

/// 1KHz `Frequency`
#[derive(Debug)]
pub struct Freq1KHz;
impl Frequency for Freq1KHz {
    fn frequency() -> u32 {
        1000
    }
}

pub trait Time {
    type Frequency: Frequency;

    /// Returns the current time in hardware clock units. The counter wraps
    /// at `u32::MAX`.
    fn now(&self) -> u32;
}

/// Conversion between wall-clock units and the ticks of a [`Time`].
pub trait ConvertTicks {
    /// Number of ticks in `ms` milliseconds, saturating at `u32::MAX`.
    fn ticks_from_ms(&self, ms: u32) -> u32;

    /// Number of whole milliseconds in `tick` ticks.
    fn ticks_to_ms(&self, tick: u32) -> u32;
}

impl<T: Time + ?Sized> ConvertTicks for T {
    fn ticks_from_ms(&self, ms: u32) -> u32 {
        let ticks = (ms as u64 * T::Frequency::frequency() as u64) / 1000;
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }

    fn ticks_to_ms(&self, tick: u32) -> u32 {
        ((tick as u64 * 1000) / T::Frequency::frequency() as u64) as u32
    }
}

/// The `Alarm` trait models a wrapping counter capable of notifying when the
/// counter reaches a certain value.
pub trait Alarm<'a>: Time {
    /// Specify the callback for when the counter reaches the alarm value.
    fn set_alarm_client(&self, client: &'a dyn AlarmClient);

    /// Specify when the callback should be called and enable it. The
    /// callback will be enqueued when `now() == reference + dt`.
    ///
    /// Passing `self.now()` as `reference` is the common case.
    fn set_alarm(&self, reference: u32, dt: u32);

    /// Return the current alarm value.
    fn get_alarm(&self) -> u32;

    /// Disable the alarm and stop it from firing in the future.
    fn disarm(&self);

    /// Returns whether the alarm is currently armed.
    fn is_armed(&self) -> bool;

    /// Return the minimum dt value that is supported.
    fn minimum_dt(&self) -> u32;
}

/// A client of an implementer of the [`Alarm`] trait.
pub trait AlarmClient {
    /// Callback signaled when the alarm's clock reaches the value set in
    /// [`Alarm::set_alarm`].
    fn alarm(&self);
}

#[cfg(test)]
mod test {
    use super::{ConvertTicks, Freq1KHz, Freq32KHz, Frequency, Time};
    use core::marker::PhantomData;

    struct Clock<F: Frequency>(PhantomData<F>);

    impl<F: Frequency> Time for Clock<F> {
        type Frequency = F;
        fn now(&self) -> u32 {
            0
        }
    }

    #[test]
    fn milliseconds_at_1khz_are_ticks() {
        let clock: Clock<Freq1KHz> = Clock(PhantomData);
        assert_eq!(clock.ticks_from_ms(25), 25);
        assert_eq!(clock.ticks_to_ms(25), 25);
    }

    #[test]
    fn conversion_at_32khz() {
        let clock: Clock<Freq32KHz> = Clock(PhantomData);
        assert_eq!(clock.ticks_from_ms(1000), 32768);
        assert_eq!(clock.ticks_to_ms(16384), 500);
        assert_eq!(clock.ticks_from_ms(u32::MAX), u32::MAX);
    }
}
