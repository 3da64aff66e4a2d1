// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `radix` module packs non-power-of-two codewords into bytes by positional arithmetic.
//!
//! Three fixed layouts are implemented:
//!
//! - base 3: five digits per byte (3^5 = 243 ≤ 256);
//! - base 5: three digits per 7-bit group (5^3 = 125 ≤ 128), eight groups per superblock with
//!   the 8th group's bits spread one per byte over the other seven;
//! - base 8: two digits per 6-bit group, four groups per superblock with the 4th group's bits
//!   spread two per byte over the other three.
//!
//! Misaligned tails are padded with the base's maximum digit. Decoding emits those padding
//! digits too; callers discard them based on the declared block length. The spread-group
//! layouts are bijective only for whole superblocks: a trailing partial superblock decodes to
//! its stored groups only, the spread group being unrecoverable.

use ssdpcm_core::codec::Codeword;

/// Packs base-3 codewords, five per byte, most-significant digit first.
pub fn encode_ss1_6(words: &[Codeword], out: &mut [u8]) {
    debug_assert_eq!(out.len(), (words.len() + 4) / 5);
    for (group, byte) in words.chunks(5).zip(out.iter_mut()) {
        let mut packed = 0u8;
        for i in 0..5 {
            packed = packed * 3 + group.get(i).map_or(2, |&word| word % 3);
        }
        *byte = packed;
    }
}

/// Unpacks base-3 codewords, five per byte. `words` is cleared and refilled.
pub fn decode_ss1_6(bytes: &[u8], words: &mut Vec<Codeword>) {
    words.clear();
    for &byte in bytes {
        let mut byte = byte;
        let mut group = [0u8; 5];
        for digit in group.iter_mut().rev() {
            *digit = byte % 3;
            byte /= 3;
        }
        words.extend_from_slice(&group);
    }
}

/// Packs base-5 codewords, 24 per 7-byte superblock.
///
/// Eight groups of three digits pack into 7-bit values; bit k of the 8th group lands in the
/// least-significant bit of byte k, below the k-th group shifted up by one.
pub fn encode_ss2_3(words: &[Codeword], out: &mut [u8]) {
    debug_assert_eq!(out.len(), 7 * ((words.len() + 23) / 24));
    for (superblock, bytes) in words.chunks(24).zip(out.chunks_mut(7)) {
        let mut groups = [0u8; 8];
        for (num, group) in groups.iter_mut().enumerate() {
            for i in 0..3 {
                *group = *group * 5 + superblock.get(num * 3 + i).map_or(4, |&word| word % 5);
            }
        }

        let mut spread = groups[7];
        for (byte, &group) in bytes.iter_mut().zip(&groups[..7]) {
            *byte = (group << 1) | (spread & 0x01);
            spread >>= 1;
        }
    }
}

/// Unpacks base-5 codewords from 7-byte superblocks. `words` is cleared and refilled.
pub fn decode_ss2_3(bytes: &[u8], words: &mut Vec<Codeword>) {
    words.clear();
    for chunk in bytes.chunks(7) {
        let mut spread = 0u8;
        for &byte in chunk {
            spread >>= 1;
            spread |= (byte & 0x01) << 7;
            push_base5_group(byte >> 1, words);
        }
        if chunk.len() == 7 {
            push_base5_group(spread >> 1, words);
        }
    }
}

fn push_base5_group(mut group: u8, words: &mut Vec<Codeword>) {
    let mut digits = [0u8; 3];
    for digit in digits.iter_mut().rev() {
        *digit = group % 5;
        group /= 5;
    }
    words.extend_from_slice(&digits);
}

/// Packs base-8 codewords, 8 per 3-byte superblock.
///
/// Four groups of two digits pack into 6-bit values; bits 2k+1..2k of the 4th group land in
/// the two least-significant bits of byte k, below the k-th group shifted up by two.
pub fn encode_ss3(words: &[Codeword], out: &mut [u8]) {
    debug_assert_eq!(out.len(), 3 * ((words.len() + 7) / 8));
    for (superblock, bytes) in words.chunks(8).zip(out.chunks_mut(3)) {
        let mut groups = [0u8; 4];
        for (num, group) in groups.iter_mut().enumerate() {
            for i in 0..2 {
                *group = *group * 8 + superblock.get(num * 2 + i).map_or(7, |&word| word % 8);
            }
        }

        let mut spread = groups[3];
        for (byte, &group) in bytes.iter_mut().zip(&groups[..3]) {
            *byte = (group << 2) | (spread & 0x03);
            spread >>= 2;
        }
    }
}

/// Unpacks base-8 codewords from 3-byte superblocks. `words` is cleared and refilled.
pub fn decode_ss3(bytes: &[u8], words: &mut Vec<Codeword>) {
    words.clear();
    for chunk in bytes.chunks(3) {
        let mut spread = 0u8;
        for &byte in chunk {
            spread >>= 2;
            spread |= (byte & 0x03) << 6;
            let group = byte >> 2;
            words.push((group >> 3) & 0x07);
            words.push(group & 0x07);
        }
        if chunk.len() == 3 {
            let group = spread >> 2;
            words.push((group >> 3) & 0x07);
            words.push(group & 0x07);
        }
    }
}
