// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codec` module defines the SSDPCM coding modes and their per-mode parameters.

/// A codeword selects one entry of a block's slope palette.
pub type Codeword = u8;

/// The maximum number of slopes any mode or stream may declare.
pub const MAX_NUM_SLOPES: usize = 16;

/// The SSDPCM block coding modes, in increasing order of bitrate.
///
/// The fractional-bit modes (`Ss1_6`, `Ss2_3`) carry an odd slope count; the final palette entry
/// is an implicit zero slope that is never stored in the container.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockMode {
    /// 1-bit SSDPCM.
    Ss1,
    /// 1-bit SSDPCM with comb filtering.
    Ss1c,
    /// 1.6-bit SSDPCM (base-3 codewords).
    Ss1_6,
    /// 2-bit SSDPCM.
    Ss2,
    /// 2.3-bit SSDPCM (base-5 codewords).
    Ss2_3,
    /// 3-bit SSDPCM (base-8 codewords).
    Ss3,
}

impl BlockMode {
    /// All modes, in fourcc table order.
    pub const ALL: [BlockMode; 6] = [
        BlockMode::Ss1,
        BlockMode::Ss1c,
        BlockMode::Ss1_6,
        BlockMode::Ss2,
        BlockMode::Ss2_3,
        BlockMode::Ss3,
    ];

    /// Gets the four-character code identifying this mode in the container.
    pub fn fourcc(&self) -> [u8; 4] {
        match *self {
            BlockMode::Ss1 => *b"ss1 ",
            BlockMode::Ss1c => *b"ss1c",
            BlockMode::Ss1_6 => *b"s1.6",
            BlockMode::Ss2 => *b"ss2 ",
            BlockMode::Ss2_3 => *b"s2.3",
            BlockMode::Ss3 => *b"ss3 ",
        }
    }

    /// Looks a mode up by its container four-character code.
    pub fn from_fourcc(fourcc: [u8; 4]) -> Option<BlockMode> {
        BlockMode::ALL.iter().copied().find(|mode| mode.fourcc() == fourcc)
    }

    /// Gets the mode name as spelled on the command line.
    pub fn cli_name(&self) -> &'static str {
        match *self {
            BlockMode::Ss1 => "ss1",
            BlockMode::Ss1c => "ss1c",
            BlockMode::Ss1_6 => "ss1.6",
            BlockMode::Ss2 => "ss2",
            BlockMode::Ss2_3 => "ss2.3",
            BlockMode::Ss3 => "ss3",
        }
    }

    /// Looks a mode up by its command-line spelling.
    pub fn from_cli_name(name: &str) -> Option<BlockMode> {
        BlockMode::ALL.iter().copied().find(|mode| mode.cli_name() == name)
    }

    /// Gets the number of slope-palette entries, and therefore the number of distinct codeword
    /// values, of this mode.
    pub fn num_slopes(&self) -> usize {
        match *self {
            BlockMode::Ss1 | BlockMode::Ss1c => 2,
            BlockMode::Ss1_6 => 3,
            BlockMode::Ss2 => 4,
            BlockMode::Ss2_3 => 5,
            BlockMode::Ss3 => 8,
        }
    }

    /// Gets the default number of samples per block.
    pub fn default_block_length(&self) -> u16 {
        match *self {
            BlockMode::Ss1 | BlockMode::Ss1c => 64,
            BlockMode::Ss1_6 => 65,
            BlockMode::Ss2 => 128,
            BlockMode::Ss2_3 => 120,
            BlockMode::Ss3 => 120,
        }
    }

    /// Gets the read alignment of the packed codeword stream in bytes. Streams of this mode may
    /// only be split at multiples of this many code bytes.
    pub fn read_alignment(&self) -> u8 {
        match *self {
            BlockMode::Ss2_3 => 7,
            BlockMode::Ss3 => 3,
            _ => 1,
        }
    }

    /// Whether decoded output of this mode is passed through the two-tap comb post-filter.
    pub fn is_comb(&self) -> bool {
        matches!(*self, BlockMode::Ss1c)
    }

    /// Gets the size in bytes of the packed codeword stream for one block of `block_length`
    /// samples, including any final partially filled byte or superblock.
    pub fn code_bytes(&self, block_length: u16) -> u16 {
        let len = u32::from(block_length);
        let bytes = match *self {
            BlockMode::Ss1 | BlockMode::Ss1c => (len + 7) / 8,
            BlockMode::Ss1_6 => (len + 4) / 5,
            BlockMode::Ss2 => (len + 3) / 4,
            BlockMode::Ss2_3 => (len * 7 + 23) / 24,
            BlockMode::Ss3 => (len * 3 + 7) / 8,
        };
        bytes as u16
    }

    /// Gets the size in bytes of one on-disk per-channel block record: the stored (non-negative)
    /// half of the slope palette followed by the packed codeword stream. The block reference
    /// sample, when present, is accounted for in the frame stride, not here.
    pub fn bytes_per_block(&self, block_length: u16, bytes_per_sample: u16) -> u16 {
        let slope_bytes = (self.num_slopes() / 2) as u16 * bytes_per_sample;
        slope_bytes + self.code_bytes(block_length)
    }
}

#[cfg(test)]
mod tests {
    use super::BlockMode;

    #[test]
    fn verify_fourcc_round_trip() {
        for mode in BlockMode::ALL {
            assert_eq!(BlockMode::from_fourcc(mode.fourcc()), Some(mode));
            assert_eq!(BlockMode::from_cli_name(mode.cli_name()), Some(mode));
        }
        assert_eq!(BlockMode::from_fourcc(*b"bogu"), None);
    }

    #[test]
    fn verify_default_code_bytes() {
        // Packed stream sizes at each mode's default block length.
        assert_eq!(BlockMode::Ss1.code_bytes(64), 8);
        assert_eq!(BlockMode::Ss1c.code_bytes(64), 8);
        assert_eq!(BlockMode::Ss1_6.code_bytes(65), 13);
        assert_eq!(BlockMode::Ss2.code_bytes(128), 32);
        assert_eq!(BlockMode::Ss2_3.code_bytes(120), 35);
        assert_eq!(BlockMode::Ss3.code_bytes(120), 45);
    }

    #[test]
    fn verify_bytes_per_block() {
        // One byte per stored slope at 8 bits per sample, two bytes at 16.
        assert_eq!(BlockMode::Ss2.bytes_per_block(128, 1), 34);
        assert_eq!(BlockMode::Ss2.bytes_per_block(128, 2), 36);
        assert_eq!(BlockMode::Ss2_3.bytes_per_block(120, 1), 37);
    }
}
