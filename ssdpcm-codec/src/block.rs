// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ssdpcm_core::codec::Codeword;
use ssdpcm_core::sample::Sample;

/// One SSDPCM block: the unit of codec work for a single channel.
///
/// The slope palette is symmetric about zero: entries `0..N/2` hold non-negative magnitudes in
/// strictly descending order, entries `N/2..2*(N/2)` their negations. Modes with an odd slope
/// count carry one extra trailing entry that is always zero.
pub struct Block {
    /// The sample value immediately preceding the first sample of the block; the seed of the
    /// DPCM summation.
    pub initial_sample: Sample,
    /// The slope palette. The encoder overwrites this per block.
    pub slopes: Vec<Sample>,
    /// One codeword per sample, each selecting a slope index. Scratch the encoder overwrites.
    pub deltas: Vec<Codeword>,
}

impl Block {
    /// Creates a zeroed block for `length` samples and a palette of `num_slopes` entries.
    pub fn new(num_slopes: usize, length: usize) -> Block {
        Block { initial_sample: 0, slopes: vec![0; num_slopes], deltas: vec![0; length] }
    }

    /// Gets the number of slope-palette entries.
    pub fn num_slopes(&self) -> usize {
        self.slopes.len()
    }

    /// Gets the number of samples the block encodes.
    pub fn length(&self) -> usize {
        self.deltas.len()
    }

    /// Rewrites the negated half of the palette from the stored non-negative half.
    pub fn mirror_slopes(&mut self) {
        let half = self.slopes.len() / 2;
        for i in 0..half {
            self.slopes[i + half] = -self.slopes[i];
        }
    }

    /// Decodes the block into `out` by DPCM summation from `initial_sample`.
    ///
    /// Runs entirely in full-width signed arithmetic; nothing is clamped here. `out` must hold
    /// at least `length()` samples.
    pub fn decode(&self, out: &mut [Sample]) {
        debug_assert!(out.len() >= self.length());
        let mut state = self.initial_sample;
        for (out, &delta) in out.iter_mut().zip(&self.deltas) {
            state += self.slopes[delta as usize];
            *out = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Block;

    #[test]
    fn verify_decode() {
        let mut block = Block::new(4, 8);
        block.initial_sample = 100;
        block.slopes.copy_from_slice(&[10, 3, -10, -3]);
        block.deltas.copy_from_slice(&[0, 0, 1, 3, 2, 2, 3, 1]);

        let mut out = [0; 8];
        block.decode(&mut out);

        assert_eq!(out, [110, 120, 123, 120, 110, 100, 97, 100]);
    }

    #[test]
    fn verify_decode_is_deterministic() {
        let mut block = Block::new(2, 16);
        block.initial_sample = -5;
        block.slopes.copy_from_slice(&[7, -7]);
        for (i, delta) in block.deltas.iter_mut().enumerate() {
            *delta = (i % 2) as u8;
        }

        let mut first = [0; 16];
        let mut second = [0; 16];
        block.decode(&mut first);
        block.decode(&mut second);

        assert_eq!(first, second);
    }

    #[test]
    fn verify_mirror_slopes() {
        let mut block = Block::new(5, 4);
        block.slopes[0] = 9;
        block.slopes[1] = 2;
        block.mirror_slopes();

        // The trailing entry of an odd palette stays zero.
        assert_eq!(block.slopes, [9, 2, -9, -2, 0]);
    }
}
