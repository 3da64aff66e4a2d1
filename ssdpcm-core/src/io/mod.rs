// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements bit-level I/O over byte buffers.
//!
//! Codeword streams for the power-of-two codec modes are sequences of 1- or
//! 2-bit fields packed most-significant-bit first within each byte. The
//! [`BitReaderMsb`] and [`BitWriterMsb`] types read and write such streams
//! over a `&[u8]` / `&mut [u8]`.

mod bit;

pub use bit::{BitReaderMsb, BitWriterMsb};
