// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module defines the channel layout descriptors used by the container layer.

use bitflags::bitflags;

bitflags! {
    /// A bitmask representing positional audio channels.
    ///
    /// The channel positions are identical to those specified by the channel mask in Microsoft's
    /// `WAVEFORMATEXTENSIBLE` structure. Only the positions a one- or two-channel SSDPCM stream
    /// can occupy are defined.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Channels: u32 {
        /// Front-left (left) channel.
        const FRONT_LEFT   = 1 << 0;
        /// Front-right (right) channel.
        const FRONT_RIGHT  = 1 << 1;
        /// Front-center (center) or the Mono channel.
        const FRONT_CENTER = 1 << 2;
    }
}

impl Channels {
    /// Gets the number of channels in the bitmask.
    pub fn count(&self) -> usize {
        self.bits().count_ones() as usize
    }

    /// Gets the canonical channel layout for the given channel count: front-center for mono,
    /// front-left plus front-right for stereo.
    pub fn from_count(count: usize) -> Option<Channels> {
        match count {
            1 => Some(Channels::FRONT_CENTER),
            2 => Some(Channels::FRONT_LEFT | Channels::FRONT_RIGHT),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Channels;

    #[test]
    fn verify_channel_masks() {
        assert_eq!(Channels::from_count(1).unwrap().bits(), 0x4);
        assert_eq!(Channels::from_count(2).unwrap().bits(), 0x3);
        assert_eq!(Channels::from_count(2).unwrap().count(), 2);
        assert!(Channels::from_count(3).is_none());
    }
}
