// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `search` module finds the slope palette minimising a block's distortion.
//!
//! The search space is the set of legal palettes: first-half vectors of strictly descending
//! non-negative slopes, mirrored into the negative half. Palettes are enumerated odometer
//! style with a per-level step, the step halving from level to level while each slope's
//! search window shrinks around the best palette of the previous level. This is coordinate
//! descent with a geometric schedule; a one-unit-step exhaustive variant serves as ground
//! truth for small palettes.

use log::trace;

use ssdpcm_core::sample::Sample;

use crate::block::Block;
use crate::encode::block_encode;
use crate::sigma::SigmaTracker;

/// The coarse level starts `CHOP_PARAM` octaves below the largest inter-sample delta.
const CHOP_PARAM: i32 = 4;

fn max_abs_delta(input: &[Sample]) -> Sample {
    let mut max = 0;
    for pair in input.windows(2) {
        let delta = (pair[1] - pair[0]).abs();
        if delta > max {
            max = delta;
        }
    }
    max
}

/// Whether the stored palette half is strictly descending and non-negative. A refinement
/// level that recentres a zero slope can start from an inverted vector; such start points are
/// swept but never committed.
fn palette_is_ordered(slopes: &[Sample], half: usize) -> bool {
    slopes[half - 1] >= 0 && slopes[..half].windows(2).all(|pair| pair[1] < pair[0])
}

/// Sweeps every legal palette whose slopes lie on the `1 << chop_bits` grid inside the given
/// per-slope windows, leaving the best palette found in `block.slopes`.
fn search_level(
    block: &mut Block,
    input: &[Sample],
    sigma: &mut SigmaTracker,
    chop_bits: u32,
    ranges_low: &[Sample],
    ranges_high: &[Sample],
    max_abs_delta: Sample,
) -> u64 {
    let half = block.num_slopes() / 2;
    let step = 1 << chop_bits;

    let mut best_slopes = block.slopes.clone();
    let mut best_metric = u64::MAX;

    while block.slopes[0] <= max_abs_delta && block.slopes[0] <= ranges_high[0] {
        let sigma_metric = block_encode(block, input, sigma);

        if sigma_metric < best_metric && palette_is_ordered(&block.slopes, half) {
            best_metric = sigma_metric;
            best_slopes.copy_from_slice(&block.slopes);
        }

        // Odometer increment: on overflow past the window, or past the next-higher slope, a
        // digit resets to its window floor and the carry moves up.
        for i in (0..half).rev() {
            block.slopes[i] += step;
            if i > 0 && (block.slopes[i] >= block.slopes[i - 1] || block.slopes[i] > ranges_high[i])
            {
                block.slopes[i] = ranges_low[i];
                block.slopes[i + half] = -ranges_low[i];
            }
            else {
                block.slopes[i + half] = -block.slopes[i];
                break;
            }
        }
    }

    block.slopes.copy_from_slice(&best_slopes);
    best_metric
}

/// Searches for the best slope palette for `input` and encodes the block with it.
///
/// Runs one coarse sweep followed by step-halving refinement levels down to unit step, then
/// commits the winning palette with a final [`block_encode`]. Returns that encode's error.
pub fn encode_refined(block: &mut Block, input: &[Sample], sigma: &mut SigmaTracker) -> u64 {
    let half = block.num_slopes() / 2;
    let max_abs_delta = max_abs_delta(&input[..block.length()]);

    let mut chop_bits = if max_abs_delta > 0 {
        ((f64::from(max_abs_delta).log2().round() as i32) - CHOP_PARAM).max(0) as u32
    }
    else {
        0
    };

    let mut ranges_low = vec![0; half];
    let mut ranges_high = vec![Sample::MAX; half];

    for i in 0..half {
        block.slopes[i] = ((half - i - 1) as Sample) << chop_bits;
    }
    block.mirror_slopes();

    let metric =
        search_level(block, input, sigma, chop_bits, &ranges_low, &ranges_high, max_abs_delta);
    trace!("level {}: best metric {}", chop_bits, metric);

    while chop_bits > 0 {
        chop_bits -= 1;
        let step = 1 << chop_bits;

        // Recentre on the previous level's winner, nudged half a step down (back up if that
        // would go negative), and shrink each slope's window to one step either side.
        for i in 0..half {
            block.slopes[i] -= step;
            if block.slopes[i] < 0 {
                block.slopes[i] += 2 * step;
            }
            block.slopes[i + half] = -block.slopes[i];
            ranges_low[i] = (block.slopes[i] - step).max(0);
            ranges_high[i] = block.slopes[i] + step;
        }

        let metric =
            search_level(block, input, sigma, chop_bits, &ranges_low, &ranges_high, max_abs_delta);
        trace!("level {}: best metric {}", chop_bits, metric);
    }

    block_encode(block, input, sigma)
}

/// Exhaustive unit-step palette search; ground truth for `encode_refined`.
///
/// # Panics
///
/// Panics when the palette has more than 8 entries; the runtime is hopeless beyond that.
pub fn encode_bruteforce(block: &mut Block, input: &[Sample], sigma: &mut SigmaTracker) -> u64 {
    assert!(block.num_slopes() <= 8, "refusing to search through this many slopes");

    let half = block.num_slopes() / 2;
    let max_abs_delta = max_abs_delta(&input[..block.length()]);

    for i in 0..half {
        block.slopes[i] = (half - i - 1) as Sample;
    }
    block.mirror_slopes();

    let mut best_slopes = block.slopes.clone();
    let mut best_metric = u64::MAX;

    while block.slopes[0] <= max_abs_delta {
        let sigma_metric = block_encode(block, input, sigma);

        if sigma_metric < best_metric {
            best_metric = sigma_metric;
            best_slopes.copy_from_slice(&block.slopes);
        }

        for i in (0..half).rev() {
            block.slopes[i] += 1;
            if i > 0 && block.slopes[i] >= block.slopes[i - 1] {
                block.slopes[i] = 0;
                block.slopes[i + half] = 0;
            }
            else {
                block.slopes[i + half] = -block.slopes[i];
                break;
            }
        }
    }

    block.slopes.copy_from_slice(&best_slopes);
    block_encode(block, input, sigma)
}

#[cfg(test)]
mod tests {
    use super::{encode_bruteforce, encode_refined};
    use crate::block::Block;
    use crate::encode::block_encode;
    use crate::sigma::{Metric, SigmaTracker};

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use ssdpcm_core::sample::Sample;

    fn assert_palette_legal(slopes: &[Sample]) {
        let half = slopes.len() / 2;
        for i in 0..half {
            assert_eq!(slopes[i + half], -slopes[i], "palette not symmetric: {:?}", slopes);
        }
        for i in 1..half {
            assert!(slopes[i] >= 0, "negative magnitude in first half: {:?}", slopes);
            assert!(slopes[i] < slopes[i - 1], "palette not descending: {:?}", slopes);
        }
    }

    #[test]
    fn verify_constant_input_terminates() {
        // A flat block has a zero delta range; the search degenerates but must still finish
        // and reproduce the input exactly.
        let input = vec![128; 128];
        let mut block = Block::new(4, 128);
        block.initial_sample = 128;

        let mut sigma = SigmaTracker::new(Metric::U8Overflow);
        encode_refined(&mut block, &input, &mut sigma);

        let mut out = vec![0; 128];
        block.decode(&mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn verify_alternating_input_finds_half_swing() {
        // 1-bit coding of a square wave swinging 100..156: the best single magnitude is half
        // the swing, landing on every other sample exactly.
        let input: Vec<Sample> = (0..64).map(|i| if i % 2 == 0 { 100 } else { 156 }).collect();
        let mut block = Block::new(2, 64);
        block.initial_sample = 128;

        let mut sigma = SigmaTracker::new(Metric::U8Overflow);
        encode_refined(&mut block, &input, &mut sigma);

        assert_eq!(block.slopes[0], 28);
        assert_eq!(block.slopes[1], -28);

        let mut out = vec![0; 64];
        block.decode(&mut out);
        for (o, i) in out.iter().zip(&input) {
            assert!((o - i).abs() <= 28);
        }
    }

    #[test]
    fn verify_single_slope_error_is_unimodal() {
        // With a fixed {s, -s} palette and the generic metric, the error over the square wave
        // above is a parabola in s: strictly falling up to the half-swing, rising after.
        let input: Vec<Sample> = (0..64).map(|i| if i % 2 == 0 { 100 } else { 156 }).collect();
        let mut sigma = SigmaTracker::new(Metric::Generic);

        let mut errors = Vec::new();
        for s in 0..=56 {
            let mut block = Block::new(2, 64);
            block.initial_sample = 128;
            block.slopes.copy_from_slice(&[s, -s]);
            errors.push(block_encode(&mut block, &input, &mut sigma));
        }

        for s in 0..28 {
            assert!(errors[s + 1] < errors[s], "not falling at s={}", s);
        }
        for s in 28..56 {
            assert!(errors[s + 1] > errors[s], "not rising at s={}", s);
        }
    }

    #[test]
    fn verify_palette_invariants_after_search() {
        let mut rng = SmallRng::seed_from_u64(0xd0c5);

        for num_slopes in [2usize, 3, 4, 5, 8] {
            // Random walk input keeps the delta range (and thus the runtime) small.
            let mut sample: Sample = 128;
            let input: Vec<Sample> = (0..64)
                .map(|_| {
                    sample += rng.random_range(-24..=24);
                    sample
                })
                .collect();

            let mut block = Block::new(num_slopes, 64);
            block.initial_sample = input[0];

            let mut sigma = SigmaTracker::new(Metric::Generic);
            encode_refined(&mut block, &input, &mut sigma);

            assert_palette_legal(&block.slopes);
        }
    }

    #[test]
    fn verify_bruteforce_is_at_least_as_good() {
        let mut rng = SmallRng::seed_from_u64(0xbf0e);

        for _ in 0..4 {
            let mut sample: Sample = 0;
            let input: Vec<Sample> = (0..32)
                .map(|_| {
                    sample += rng.random_range(-10..=10);
                    sample
                })
                .collect();

            let mut refined_block = Block::new(4, 32);
            refined_block.initial_sample = input[0];
            let mut sigma = SigmaTracker::new(Metric::Generic);
            let refined = encode_refined(&mut refined_block, &input, &mut sigma);

            let mut brute_block = Block::new(4, 32);
            brute_block.initial_sample = input[0];
            let brute = encode_bruteforce(&mut brute_block, &input, &mut sigma);

            assert_palette_legal(&brute_block.slopes);
            assert!(brute <= refined);
        }
    }
}
