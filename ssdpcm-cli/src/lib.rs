// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stream drivers for the SSDPCM command-line tools.
//!
//! The drivers run the per-block loop tying the codec engine to the container: read PCM,
//! search-encode, pack, write block records; or read block records, unpack, decode, write
//! PCM. They are generic over the underlying streams so the whole pipeline is testable over
//! in-memory buffers.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all project crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

pub mod driver;
pub mod parallel;

use ssdpcm_core::codec::BlockMode;

/// What a front-end invocation should do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DriverMode {
    /// Encode PCM input in the given coding mode.
    Encode(BlockMode),
    /// Decode an SSDPCM input back to PCM.
    Decode,
}

impl DriverMode {
    /// Parses the MODE command-line argument.
    pub fn from_arg(arg: &str) -> Option<DriverMode> {
        if arg == "decode" {
            return Some(DriverMode::Decode);
        }
        BlockMode::from_cli_name(arg).map(DriverMode::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::DriverMode;
    use ssdpcm_core::codec::BlockMode;

    #[test]
    fn verify_mode_parsing() {
        assert_eq!(DriverMode::from_arg("ss1.6"), Some(DriverMode::Encode(BlockMode::Ss1_6)));
        assert_eq!(DriverMode::from_arg("decode"), Some(DriverMode::Decode));
        assert_eq!(DriverMode::from_arg("ss4"), None);
    }
}
