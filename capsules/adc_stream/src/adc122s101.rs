// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Frame encoding for the TI ADC122S101 and ADC128S052.
//!
//! Both chips exchange one 16-bit big-endian word per conversion. The word the
//! host shifts out selects, in its ADD field, the channel that is converted
//! during the following frame. The word shifted in carries the 12-bit result
//! in its low bits. The ADC122S101 has two inputs, the ADC128S052 eight.
//!
//! Streaming alternates channel 0 and channel 1, so a transmit buffer is the
//! four byte pattern `[0x00, 0x00, 0x08, 0x00]` repeated.

use tock_registers::{register_bitfields, LocalRegisterCopy};

register_bitfields![u16,
    /// Command word shifted out by the host
    pub Control [
        /// Input converted on the next frame
        ADD OFFSET(11) NUMBITS(3) []
    ],

    /// Conversion word shifted in from the chip
    pub Conversion [
        /// 12-bit straight binary result
        DATA OFFSET(0) NUMBITS(12) []
    ]
];

pub type ControlVal = LocalRegisterCopy<u16, Control::Register>;
pub type ConversionVal = LocalRegisterCopy<u16, Conversion::Register>;

/// Bytes per conversion frame.
pub const FRAME_LEN: usize = 2;

/// Channels visited by one repetition of the command template.
pub const TEMPLATE_CHANNELS: [u8; 2] = [0, 1];

/// Command word selecting `channel`.
pub fn command_word(channel: u8) -> u16 {
    let mut control = ControlVal::new(0);
    control.modify(Control::ADD.val(u16::from(channel)));
    control.get()
}

/// Fill `buf` with the channel-alternating command template.
///
/// A trailing partial frame, if any, is zeroed.
pub fn fill_command_template(buf: &mut [u8]) {
    let words = TEMPLATE_CHANNELS.iter().map(|&ch| command_word(ch)).cycle();
    let mut frames = buf.chunks_exact_mut(FRAME_LEN);
    for (frame, word) in frames.by_ref().zip(words) {
        frame.copy_from_slice(&word.to_be_bytes());
    }
    frames.into_remainder().fill(0);
}

/// Channel selected by a transmitted command word.
pub fn command_channel(word: u16) -> u8 {
    ControlVal::new(word).read(Control::ADD) as u8
}

/// 12-bit result carried by a received conversion word.
pub fn sample_value(word: u16) -> u16 {
    ConversionVal::new(word).read(Conversion::DATA)
}

/// Iterate the big-endian words of a received buffer, yielding conversion
/// results. Odd trailing bytes are ignored.
pub fn samples(buf: &[u8]) -> impl Iterator<Item = u16> + '_ {
    buf.chunks_exact(FRAME_LEN)
        .map(|frame| sample_value(u16::from_be_bytes([frame[0], frame[1]])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_alternates_channels() {
        let mut buf = [0xffu8; 10];
        fill_command_template(&mut buf);
        assert_eq!(buf, [0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00]);

        let channels: std::vec::Vec<u8> = buf
            .chunks_exact(FRAME_LEN)
            .map(|f| command_channel(u16::from_be_bytes([f[0], f[1]])))
            .collect();
        assert_eq!(channels, [0, 1, 0, 1, 0]);
    }

    #[test]
    fn odd_tail_is_cleared() {
        let mut buf = [0xffu8; 5];
        fill_command_template(&mut buf);
        assert_eq!(buf, [0x00, 0x00, 0x08, 0x00, 0x00]);
    }

    #[test]
    fn adc128s052_channels_fit_the_field() {
        assert_eq!(command_word(7), 0x3800);
        assert_eq!(command_channel(0x3800), 7);
        assert_eq!(command_channel(0xffff), 7);
    }

    #[test]
    fn decode_masks_leading_zeros() {
        assert_eq!(sample_value(0x0abc), 0x0abc);
        assert_eq!(sample_value(0xfabc), 0x0abc);
        let raw = [0x0f, 0xff, 0x00, 0x01, 0x07];
        let decoded: std::vec::Vec<u16> = samples(&raw).collect();
        assert_eq!(decoded, [0x0fff, 0x0001]);
    }
}
