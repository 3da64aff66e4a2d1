// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pack` module maps a block's codewords to and from its packed on-disk form.
//!
//! The power-of-two modes pack codewords as 1- or 2-bit fields, MSB first; the fractional-bit
//! modes go through the mixed-radix packers. Either way the packed stream for one block is
//! exactly [`BlockMode::code_bytes`] long.

use ssdpcm_core::codec::{BlockMode, Codeword};
use ssdpcm_core::errors::Result;
use ssdpcm_core::io::{BitReaderMsb, BitWriterMsb};

use crate::radix;

/// Packs one block's codewords into `code`, which must be sized to the mode's packed stream
/// length for `deltas.len()` samples.
pub fn pack_codewords(mode: BlockMode, deltas: &[Codeword], code: &mut [u8]) -> Result<()> {
    match mode {
        BlockMode::Ss1 | BlockMode::Ss1c => write_bits(deltas, code, 1)?,
        BlockMode::Ss2 => write_bits(deltas, code, 2)?,
        BlockMode::Ss1_6 => radix::encode_ss1_6(deltas, code),
        BlockMode::Ss2_3 => radix::encode_ss2_3(deltas, code),
        BlockMode::Ss3 => radix::encode_ss3(deltas, code),
    }
    Ok(())
}

/// Unpacks a block's packed codeword stream into `deltas`, which is cleared and refilled.
///
/// `block_length` bounds the bit-packed modes; the mixed-radix modes emit whole decode groups,
/// so `deltas` may come back longer than `block_length` with trailing padding digits the
/// caller ignores.
pub fn unpack_codewords(
    mode: BlockMode,
    code: &[u8],
    block_length: usize,
    deltas: &mut Vec<Codeword>,
) -> Result<()> {
    match mode {
        BlockMode::Ss1 | BlockMode::Ss1c => read_bits(code, block_length, 1, deltas)?,
        BlockMode::Ss2 => read_bits(code, block_length, 2, deltas)?,
        BlockMode::Ss1_6 => radix::decode_ss1_6(code, deltas),
        BlockMode::Ss2_3 => radix::decode_ss2_3(code, deltas),
        BlockMode::Ss3 => radix::decode_ss3(code, deltas),
    }
    Ok(())
}

fn write_bits(deltas: &[Codeword], code: &mut [u8], width: u32) -> Result<()> {
    let mut writer = BitWriterMsb::new(code);
    for &delta in deltas {
        writer.write_bits_leq32(u32::from(delta), width)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_bits(code: &[u8], count: usize, width: u32, deltas: &mut Vec<Codeword>) -> Result<()> {
    deltas.clear();
    let mut reader = BitReaderMsb::new(code);
    for _ in 0..count {
        deltas.push(reader.read_bits_leq32(width)? as Codeword);
    }
    Ok(())
}
