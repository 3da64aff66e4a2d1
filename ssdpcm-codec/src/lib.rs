// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SSDPCM codec engine.
//!
//! SSDPCM is a block-based lossy codec: every block of samples carries a small palette of
//! signed slope values and one codeword per sample selecting a slope. The decoder is a plain
//! DPCM summation from a block-initial reference sample; all of the work happens on the
//! encoder side, where a coarse-to-fine search looks for the slope palette minimising a
//! pluggable distortion metric.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all project crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

pub mod block;
pub mod encode;
pub mod filter;
pub mod pack;
pub mod radix;
pub mod search;
pub mod sigma;

pub use block::Block;
pub use sigma::{Metric, SigmaTracker};
