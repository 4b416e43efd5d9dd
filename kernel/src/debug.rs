// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Support for in-kernel debugging.
//!
//! For printing, this module provides the `debug!` and `debug_verbose!`
//! macros. Output goes to the [`DebugWriter`] the board registered with
//! [`set_debug_writer`]; until one is registered, messages are dropped.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! debug!("Yes the code gets here with value {}", i);
//! debug_verbose!("got here"); // includes message count, file, and line
//! ```
//!
//! The verbose form produces lines such as
//!
//! ```text
//! TOCK_DEBUG(0): capsules/adc_stream/src/adc_stream.rs:204: got here
//! ```

use core::fmt::{write, Arguments, Result, Write};
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// Sink for kernel debug output, typically a console UART.
pub trait DebugWriter {
    /// Emit `bytes`. Output that cannot be buffered may be dropped.
    fn write(&self, bytes: &[u8]);
}

static DEBUG_WRITER: AtomicPtr<&'static dyn DebugWriter> = AtomicPtr::new(ptr::null_mut());

static DEBUG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Register the board's debug output, replacing any earlier writer.
///
/// ```rust,ignore
/// let writer = static_init!(&'static dyn DebugWriter, console_uart);
/// kernel::debug::set_debug_writer(writer);
/// ```
pub fn set_debug_writer(writer: &'static &'static dyn DebugWriter) {
    let writer: *const &'static dyn DebugWriter = writer;
    DEBUG_WRITER.store(writer.cast_mut(), Ordering::Release);
}

fn debug_writer() -> Option<&'static dyn DebugWriter> {
    let writer = DEBUG_WRITER.load(Ordering::Acquire);
    // Only ever null or stored from a `&'static &'static dyn DebugWriter`,
    // and never written through.
    unsafe { writer.as_ref() }.copied()
}

struct LineWriter<'w> {
    out: &'w dyn DebugWriter,
}

impl Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> Result {
        self.out.write(s.as_bytes());
        Ok(())
    }
}

fn write_line(out: &dyn DebugWriter, prefix: Option<(usize, &str, u32)>, args: Arguments) {
    let mut writer = LineWriter { out };
    if let Some((count, file, line)) = prefix {
        let _ = writer.write_fmt(format_args!("TOCK_DEBUG({}): {}:{}: ", count, file, line));
    }
    let _ = write(&mut writer, args);
    let _ = writer.write_str("\r\n");
}

#[doc(hidden)]
pub fn debug_fmt(args: Arguments) {
    if let Some(out) = debug_writer() {
        write_line(out, None, args);
    }
}

#[doc(hidden)]
pub fn debug_verbose_fmt(args: Arguments, file_line: &(&'static str, u32)) {
    let count = DEBUG_COUNT.load(Ordering::Relaxed);
    DEBUG_COUNT.store(count.wrapping_add(1), Ordering::Relaxed);

    if let Some(out) = debug_writer() {
        let (file, line) = *file_line;
        write_line(out, Some((count, file, line)), args);
    }
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_fmt(format_args!("{}", $msg))
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_fmt(format_args!($fmt, $($arg)+))
    });
}

/// In-kernel `println()` debugging that includes a message count and the
/// file and line.
#[macro_export]
macro_rules! debug_verbose {
    () => ({
        // Allow an empty debug_verbose!() to print the location when hit
        $crate::debug_verbose!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_verbose_fmt(format_args!("{}", $msg), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_verbose_fmt(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}
