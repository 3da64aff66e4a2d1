// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ssdpcm_core::codec::Codeword;
use ssdpcm_core::sample::Sample;

use crate::block::Block;
use crate::sigma::SigmaTracker;

#[inline]
fn find_best_delta(
    slopes: &[Sample],
    input: &[Sample],
    sigma: &SigmaTracker,
    num_slopes: usize,
) -> Codeword {
    let mut best = 0;
    let mut best_error = u64::MAX;
    for c in 0..num_slopes as Codeword {
        let error = sigma.calc_error(slopes, input, c);
        if error < best_error {
            best_error = error;
            best = c;
        }
    }
    best
}

/// Encodes one block against a fixed slope palette.
///
/// For each sample the best codeword under the tracker's metric is chosen (ties break on the
/// lowest index) and written into `block.deltas`. Returns the accumulated error metric.
pub fn block_encode(block: &mut Block, input: &[Sample], sigma: &mut SigmaTracker) -> u64 {
    debug_assert!(input.len() >= block.length());
    sigma.init(block);
    for i in 0..block.length() {
        let best = find_best_delta(&block.slopes, input, sigma, block.num_slopes());
        block.deltas[i] = best;
        sigma.advance(&block.slopes, input, best);
    }
    sigma.accumulated_error()
}
