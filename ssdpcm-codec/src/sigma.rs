// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sigma` module implements the distortion metrics ("sigma trackers") driving the encoder.
//!
//! A [`SigmaTracker`] replays the decoder sample-by-sample in step with the encoder (the
//! "shadow decoder"), so that metrics referencing previously reconstructed output (the comb
//! variants) always see exactly what a real decoder would produce.

use ssdpcm_core::codec::Codeword;
use ssdpcm_core::sample::{Sample, SampleFormat};

use crate::block::Block;

/// The distortion metrics.
///
/// The overflow metrics treat the sample space as wrapping modulo 256 (or 128): the masked
/// difference tracks wraparound equality while the raw predicted value detects escapes from the
/// unsigned range, which are penalised by a fixed multiplier on the absolute difference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Metric {
    /// Plain squared error.
    Generic,
    /// Squared error after modelling the two-tap comb post-filter.
    GenericComb,
    /// Squared error on the 8-bit wrapped sample space, overflow penalised.
    U8Overflow,
    /// Squared error on the 7-bit wrapped sample space, overflow penalised.
    U7Overflow,
    /// Comb-filtered variant of the 8-bit wraparound metric, with a heavy overflow penalty.
    U8OverflowComb,
    /// Comb-filtered variant of the 7-bit wraparound metric, with a heavy overflow penalty.
    U7OverflowComb,
}

impl Metric {
    /// Selects the metric matching an output sample format, with or without comb filtering.
    pub fn for_format(format: SampleFormat, comb: bool) -> Metric {
        match (format, comb) {
            (SampleFormat::U8, false) => Metric::U8Overflow,
            (SampleFormat::U8, true) => Metric::U8OverflowComb,
            (SampleFormat::S16Le, false) => Metric::Generic,
            (SampleFormat::S16Le, true) => Metric::GenericComb,
        }
    }

    #[inline]
    fn sample_error(&self, predicted: Sample, input: &[Sample], decoded: &[Sample], index: usize) -> u64 {
        let expected = input[index];
        match *self {
            Metric::Generic => squared(predicted - expected),
            Metric::GenericComb => {
                let (predicted, expected) = comb(predicted, expected, input, decoded, index);
                squared(predicted - expected)
            }
            Metric::U8Overflow => overflow_error(predicted, expected, 0xff, 4),
            Metric::U7Overflow => overflow_error(predicted, expected, 0x7f, 4),
            Metric::U8OverflowComb => {
                let (predicted, expected) = comb(predicted, expected, input, decoded, index);
                overflow_error(predicted, expected, 0xff, 256)
            }
            Metric::U7OverflowComb => {
                let (predicted, expected) = comb(predicted, expected, input, decoded, index);
                overflow_error(predicted, expected, 0x7f, 256)
            }
        }
    }
}

/// Models the decode-side comb filter on the predicted sample. The expected sample gets a
/// half-strength (2:1) comb instead; full strength on both sides adds audible hiss.
#[inline]
fn comb(
    predicted: Sample,
    expected: Sample,
    input: &[Sample],
    decoded: &[Sample],
    index: usize,
) -> (Sample, Sample) {
    if index > 0 {
        ((predicted + decoded[index - 1]) / 2, (2 * expected + input[index - 1]) / 3)
    }
    else {
        (predicted, expected)
    }
}

#[inline]
fn overflow_error(predicted: Sample, expected: Sample, mask: Sample, penalty: Sample) -> u64 {
    let mut diff = (predicted & mask) - (expected & mask);
    if diff < 0 {
        diff = -diff;
    }
    if predicted != predicted & mask {
        diff *= penalty;
    }
    squared(diff)
}

#[inline]
fn squared(diff: Sample) -> u64 {
    let diff = u64::from(diff.unsigned_abs());
    diff * diff
}

/// A `SigmaTracker` accumulates the per-sample decode error of one block encode under a chosen
/// [`Metric`].
///
/// The tracker owns its shadow decode buffer; it never aliases the encoder's buffers. The
/// metric is bound once per block, keeping the per-sample inner loop free of indirect calls.
pub struct SigmaTracker {
    metric: Metric,
    decode_buf: Vec<Sample>,
    index: usize,
    sample_state: Sample,
    acc_error: u64,
}

impl SigmaTracker {
    /// Creates a tracker for the given metric.
    pub fn new(metric: Metric) -> SigmaTracker {
        SigmaTracker { metric, decode_buf: Vec::new(), index: 0, sample_state: 0, acc_error: 0 }
    }

    /// Gets the metric the tracker was created with.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Rebinds the tracker to the start of `block`, resetting the accumulator and sizing the
    /// shadow decode buffer.
    pub fn init(&mut self, block: &Block) {
        self.index = 0;
        self.sample_state = block.initial_sample;
        self.acc_error = 0;
        if self.decode_buf.len() < block.length() {
            self.decode_buf.resize(block.length(), 0);
        }
    }

    /// Returns the error at the current sample if codeword `c` were chosen. Pure; the cursor
    /// does not move.
    #[inline]
    pub fn calc_error(&self, slopes: &[Sample], input: &[Sample], c: Codeword) -> u64 {
        let predicted = self.sample_state + slopes[c as usize];
        self.metric.sample_error(predicted, input, &self.decode_buf, self.index)
    }

    /// Commits codeword `c`: decodes one sample into the shadow buffer, accumulates its error
    /// and advances the cursor.
    #[inline]
    pub fn advance(&mut self, slopes: &[Sample], input: &[Sample], c: Codeword) {
        let result = self.sample_state + slopes[c as usize];
        self.decode_buf[self.index] = result;
        self.sample_state = result;
        let sigma = self.metric.sample_error(result, input, &self.decode_buf, self.index);
        self.index += 1;
        self.acc_error += sigma;
    }

    /// Gets the accumulated error.
    pub fn accumulated_error(&self) -> u64 {
        self.acc_error
    }
}
