// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RIFF/WAVE container support for SSDPCM streams.
//!
//! [`WavFile`] reads and writes classic 8/16-bit PCM WAVE files as well as the extended layout
//! SSDPCM uses: a `WAVE_FORMAT_EXTENSIBLE` fmt chunk carrying the SSDPCM sub-format GUID and
//! an `SsDP` sub-chunk with the block geometry, followed by a data chunk of per-block records
//! (reference samples, slope palette halves, packed codewords).
//!
//! The type is generic over the underlying stream so the same code serves files on disk and
//! in-memory buffers in tests.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all project crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use ssdpcm_core::codec::BlockMode;
use ssdpcm_core::errors::{
    decode_error, end_of_stream_error, invalid_argument_error, premature_end_of_file_error,
    seek_error, unsupported_error, Error, Result, SeekErrorKind,
};
use ssdpcm_core::sample::SampleFormat;

mod chunks;

pub use chunks::{
    FormatExtensible, SsdpcmFormat, WaveFormatChunk, KSDATAFORMAT_SUBTYPE_PCM, SSDPCM_CHUNK_ID,
    SSDPCM_SUBTYPE_GUID, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_PCM,
};

/// WAVE is a RIFF stream, with a "RIFF" ASCII stream marker.
const RIFF_STREAM_MARKER: [u8; 4] = *b"RIFF";
/// The RIFF form of a WAVE stream.
const WAVE_RIFF_FORM: [u8; 4] = *b"WAVE";
/// The fmt chunk id.
const FMT_CHUNK_ID: [u8; 4] = *b"fmt ";
/// The data chunk id.
const DATA_CHUNK_ID: [u8; 4] = *b"data";

/// What kind of audio a WAVE stream carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// Uncompressed PCM in the given sample format.
    Pcm(SampleFormat),
    /// SSDPCM block records.
    Ssdpcm,
}

/// A WAVE file opened for reading or writing.
///
/// Writable handles track whether the on-disk header matches the in-memory one and rewrite it
/// (with sizes recomputed) on [`WavFile::finalize`] or an explicit [`WavFile::write_header`].
pub struct WavFile<S> {
    stream: S,
    format: WaveFormatChunk,
    fmt_length: u32,
    data_length: u32,
    data_offset: u64,
    no_extra_chunks: bool,
    write_mode: bool,
    header_synced: bool,
}

fn read_fourcc<S: Read>(stream: &mut S) -> Result<[u8; 4]> {
    let mut fourcc = [0u8; 4];
    stream.read_exact(&mut fourcc)?;
    Ok(fourcc)
}

fn fresh_data_offset(format: &WaveFormatChunk) -> u64 {
    // RIFF id + length + form, fmt id + length + payload, data id + length.
    u64::from(12 + 8 + format.len() + 8)
}

impl<S: Read + Seek> WavFile<S> {
    /// Opens a stream for reading and parses its header.
    pub fn read(stream: S) -> Result<WavFile<S>> {
        let mut wav = WavFile {
            stream,
            format: WaveFormatChunk::default_pcm(),
            fmt_length: 16,
            data_length: 0,
            data_offset: 0,
            no_extra_chunks: true,
            write_mode: false,
            header_synced: true,
        };
        wav.read_header()?;
        Ok(wav)
    }

    fn read_header(&mut self) -> Result<()> {
        self.stream.seek(SeekFrom::Start(0))?;

        if read_fourcc(&mut self.stream)? != RIFF_STREAM_MARKER {
            return unsupported_error("wav: missing riff stream marker");
        }

        let _riff_len = self.stream.read_u32::<LittleEndian>()?;

        if read_fourcc(&mut self.stream)? != WAVE_RIFF_FORM {
            return unsupported_error("wav: riff form is not wave");
        }

        self.no_extra_chunks = true;

        // Scan for the fmt chunk, tolerating foreign chunks on the way; a data chunk first is
        // unrecoverable.
        self.fmt_length = loop {
            let fourcc = read_fourcc(&mut self.stream)?;
            match fourcc {
                FMT_CHUNK_ID => break self.stream.read_u32::<LittleEndian>()?,
                DATA_CHUNK_ID => return decode_error("wav: missing fmt chunk"),
                _ => self.skip_foreign_chunk(fourcc)?,
            }
        };

        self.format = WaveFormatChunk::parse(&mut self.stream, self.fmt_length)?;

        // Scan onwards for the data chunk.
        self.data_length = loop {
            let fourcc = read_fourcc(&mut self.stream)?;
            match fourcc {
                DATA_CHUNK_ID => break self.stream.read_u32::<LittleEndian>()?,
                _ => self.skip_foreign_chunk(fourcc)?,
            }
        };

        self.data_offset = self.stream.stream_position()?;
        Ok(())
    }

    fn skip_foreign_chunk(&mut self, fourcc: [u8; 4]) -> Result<()> {
        let len = self.stream.read_u32::<LittleEndian>()?;
        debug!("skipping foreign chunk '{}' of {} bytes", String::from_utf8_lossy(&fourcc), len);
        self.no_extra_chunks = false;
        self.stream.seek(SeekFrom::Current(i64::from(len)))?;
        Ok(())
    }

    /// Reads up to `buf.len() / bytes_per_frame` PCM frames into `buf`, returning the number
    /// of whole frames read. A short count means the data chunk ran out.
    pub fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame_size = usize::from(self.bytes_per_frame());
        debug_assert!(frame_size > 0 && buf.len() % frame_size == 0);

        let position = self.position_in_data()?;
        let available = u64::from(self.data_length).saturating_sub(position) as usize;

        let wanted = buf.len().min(available - available % frame_size);
        self.stream.read_exact(&mut buf[..wanted])?;

        Ok(wanted / frame_size)
    }

    /// Reads one per-channel SSDPCM block record.
    ///
    /// `reference` must hold one sample per channel, and is only filled on the first record of
    /// the stream or, when the stream flags it, at the start of every block; the return value
    /// tells whether it was. `slopes` receives the stored palette half and `code` the packed
    /// codeword stream. `Error::EndOfStream` marks the normal end of the data chunk.
    pub fn read_block(
        &mut self,
        channel_idx: u16,
        reference: &mut [u8],
        slopes: &mut [u8],
        code: &mut [u8],
    ) -> Result<bool> {
        let ssdpcm = self.format.ssdpcm()?;
        let sample_size = usize::from(ssdpcm.bytes_per_sample());
        let num_channels = self.format.num_channels;
        let has_reference_flag = ssdpcm.has_reference_sample_on_every_block;

        debug_assert!(reference.len() == sample_size * usize::from(num_channels));
        debug_assert!(slopes.len() == sample_size * usize::from(ssdpcm.num_slopes / 2));
        debug_assert!(code.len() == usize::from(ssdpcm.code_bytes_per_block()));

        let position = self.position_in_data()?;
        if position >= u64::from(self.data_length) {
            return end_of_stream_error();
        }

        let has_reference =
            (has_reference_flag && channel_idx % num_channels == 0) || position == 0;

        let result = (|| -> Result<()> {
            if has_reference {
                self.stream.read_exact(reference)?;
            }
            self.stream.read_exact(slopes)?;
            self.stream.read_exact(code)?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(has_reference),
            // The file ended in the middle of a block record.
            Err(Error::PrematureEndOfFile) => premature_end_of_file_error(),
            Err(err) => Err(err),
        }
    }

    /// Seeks to the given frame within the data chunk.
    pub fn seek_to_frame(&mut self, frame: u64) -> Result<()> {
        let offset = self.data_offset + frame * u64::from(self.bytes_per_frame());
        if self.stream.seek(SeekFrom::Start(offset)).is_err() {
            return seek_error(SeekErrorKind::Unseekable);
        }
        Ok(())
    }

    fn position_in_data(&mut self) -> Result<u64> {
        let position = self.stream.stream_position()?;
        if position < self.data_offset {
            return seek_error(SeekErrorKind::OutOfRange);
        }
        Ok(position - self.data_offset)
    }
}

impl<S> WavFile<S> {
    /// Gets the parsed fmt chunk.
    pub fn format(&self) -> &WaveFormatChunk {
        &self.format
    }

    /// Gets what kind of audio the stream carries.
    pub fn stream_kind(&self) -> Result<StreamKind> {
        if self.format.ssdpcm().is_ok() {
            return Ok(StreamKind::Ssdpcm);
        }
        match self.format.bits_per_sample {
            8 => Ok(StreamKind::Pcm(SampleFormat::U8)),
            16 => Ok(StreamKind::Pcm(SampleFormat::S16Le)),
            _ => unsupported_error("wav: bits per sample must be 8 or 16"),
        }
    }

    /// Gets the SSDPCM fields, or an error for plain PCM streams.
    pub fn ssdpcm(&self) -> Result<&SsdpcmFormat> {
        self.format.ssdpcm()
    }

    /// Gets the number of channels.
    pub fn num_channels(&self) -> u16 {
        self.format.num_channels
    }

    /// Gets the sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Gets the size in bytes of one frame: a PCM sample per channel, or, for SSDPCM streams,
    /// one whole block's records across all channels. Block k of the stream starts at byte
    /// `k * bytes_per_frame()` of the data chunk.
    pub fn bytes_per_frame(&self) -> u16 {
        self.format.block_align
    }

    /// Gets the length of the data chunk in bytes.
    pub fn data_length(&self) -> u32 {
        self.data_length
    }

    /// Consumes the handle and returns the underlying stream.
    ///
    /// The header is not rewritten; writers call [`WavFile::finalize`] first.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write + Seek> WavFile<S> {
    /// Opens a fresh stream for writing with a default header (mono unsigned 8-bit PCM at
    /// 8 kHz). Nothing is written until [`WavFile::write_header`] or [`WavFile::finalize`].
    pub fn create(stream: S) -> Result<WavFile<S>> {
        let format = WaveFormatChunk::default_pcm();
        let data_offset = fresh_data_offset(&format);
        Ok(WavFile {
            stream,
            format,
            fmt_length: 16,
            data_length: 0,
            data_offset,
            no_extra_chunks: true,
            write_mode: true,
            header_synced: false,
        })
    }

    /// Opens an existing stream for update. If its header does not parse, the handle falls
    /// back to a fresh default header, as for [`WavFile::create`].
    pub fn update(stream: S) -> Result<WavFile<S>> {
        let mut wav = WavFile {
            stream,
            format: WaveFormatChunk::default_pcm(),
            fmt_length: 16,
            data_length: 0,
            data_offset: 0,
            no_extra_chunks: true,
            write_mode: true,
            header_synced: false,
        };
        match wav.read_header() {
            Ok(()) => wav.header_synced = true,
            Err(Error::IoError(err)) => return Err(Error::IoError(err)),
            Err(_) => {
                wav.format = WaveFormatChunk::default_pcm();
                wav.fmt_length = 16;
                wav.data_length = 0;
                wav.data_offset = fresh_data_offset(&wav.format);
                wav.no_extra_chunks = true;
                wav.header_synced = false;
            }
        }
        Ok(wav)
    }

    /// Sets the sample rate, rederiving the byte rate.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.format.sample_rate = sample_rate;
        self.header_synced = false;

        let block_geometry =
            self.format.ssdpcm().ok().map(|ssdpcm| (ssdpcm.bytes_per_block, ssdpcm.block_length));

        self.format.avg_bytes_per_sec = match block_geometry {
            Some((bytes_per_block, block_length)) => {
                sample_rate * u32::from(bytes_per_block) * u32::from(self.format.num_channels)
                    / u32::from(block_length)
            }
            None => u32::from(self.format.block_align) * sample_rate,
        };
    }

    /// Sets the channel count, rederiving the frame geometry for PCM headers. Call before
    /// [`WavFile::init_ssdpcm`] when writing SSDPCM.
    pub fn set_num_channels(&mut self, num_channels: u16) -> Result<()> {
        let kind = self.stream_kind()?;
        self.format.num_channels = num_channels;
        self.header_synced = false;
        if let StreamKind::Pcm(format) = kind {
            self.format.set_pcm_format(format);
        }
        Ok(())
    }

    /// Reconfigures the header for classic PCM output in the given sample format.
    pub fn set_pcm_format(&mut self, format: SampleFormat) {
        self.format.set_pcm_format(format);
        self.header_synced = false;
        if self.no_extra_chunks {
            self.fmt_length = self.format.len().max(self.fmt_length);
        }
    }

    /// Reconfigures the header for SSDPCM output.
    pub fn init_ssdpcm(
        &mut self,
        format: SampleFormat,
        mode: BlockMode,
        block_length: u16,
        has_reference_sample: bool,
    ) -> Result<()> {
        self.format.init_ssdpcm(format, mode, block_length, has_reference_sample)?;
        self.header_synced = false;
        self.fmt_length = self.format.len();
        if self.no_extra_chunks {
            self.data_offset = fresh_data_offset(&self.format);
        }
        Ok(())
    }

    /// Declares the length of the data chunk in frames.
    pub fn set_data_frames(&mut self, num_frames: u32) {
        self.data_length = num_frames * u32::from(self.format.block_align);
        self.header_synced = false;
    }

    /// Writes (or rewrites) the header with recomputed sizes, preserving the current stream
    /// position. Foreign chunks in an updated file are left in place; only the RIFF, fmt and
    /// data headers are rewritten then.
    pub fn write_header(&mut self) -> Result<()> {
        if !self.write_mode {
            return invalid_argument_error("wav: stream is opened read-only");
        }

        let riff_payload_length = if self.no_extra_chunks {
            12 + self.fmt_length + 8 + self.data_length
        }
        else {
            self.data_length + self.data_offset as u32 - 8
        };

        let old_position = self.stream.stream_position()?;

        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.write_all(&RIFF_STREAM_MARKER)?;
        self.stream.write_u32::<LittleEndian>(riff_payload_length)?;
        self.stream.write_all(&WAVE_RIFF_FORM)?;

        if self.no_extra_chunks {
            self.format.write_to(&mut self.stream, self.fmt_length)?;
            self.stream.write_all(&DATA_CHUNK_ID)?;
            self.stream.write_u32::<LittleEndian>(self.data_length)?;
        }
        else {
            self.write_header_in_place()?;
        }

        self.header_synced = true;
        self.stream.seek(SeekFrom::Start(old_position))?;
        Ok(())
    }

    /// Rewrites only the known chunks of a file carrying foreign ones: the base fmt fields in
    /// place, and the data chunk header at its recorded offset.
    fn write_header_in_place(&mut self) -> Result<()> {
        loop {
            let fourcc = read_fourcc(&mut self.stream)?;
            let len = self.stream.read_u32::<LittleEndian>()?;
            match fourcc {
                FMT_CHUNK_ID => break,
                DATA_CHUNK_ID => return decode_error("wav: missing fmt chunk"),
                _ => {
                    self.stream.seek(SeekFrom::Current(i64::from(len)))?;
                }
            }
        }

        self.format.write_base_fields(&mut self.stream)?;

        self.stream.seek(SeekFrom::Start(self.data_offset - 8))?;
        self.stream.write_all(&DATA_CHUNK_ID)?;
        self.stream.write_u32::<LittleEndian>(self.data_length)?;
        Ok(())
    }

    /// Writes PCM frames at the current position, or at `frame_offset` when given, growing
    /// the data chunk as needed.
    pub fn write_frames(&mut self, buf: &[u8], frame_offset: Option<u64>) -> Result<()> {
        let frame_size = u64::from(self.bytes_per_frame());
        debug_assert!(frame_size > 0 && buf.len() as u64 % frame_size == 0);

        if let Some(frame) = frame_offset {
            self.stream.seek(SeekFrom::Start(self.data_offset + frame * frame_size))?;
        }

        let position = self.position_in_data_or_rewind()?;
        self.stream.write_all(buf)?;

        self.grow_data(position + buf.len() as u64);
        Ok(())
    }

    /// Writes one per-channel SSDPCM block record.
    ///
    /// With `index` given, the record lands at that block's absolute offset (channel records
    /// after the first skip forward within the block); otherwise it is appended at the
    /// current position. Reference samples for all channels go ahead of channel 0's record on
    /// the first block of the stream and, when the stream flags it, on every block.
    pub fn write_block(
        &mut self,
        index: Option<u64>,
        channel_idx: u16,
        reference: &[u8],
        slopes: &[u8],
        code: &[u8],
    ) -> Result<()> {
        let ssdpcm = self.format.ssdpcm()?;
        let sample_size = u64::from(ssdpcm.bytes_per_sample());
        let bytes_per_block = u64::from(ssdpcm.bytes_per_block);
        let has_reference_flag = ssdpcm.has_reference_sample_on_every_block;
        let num_channels = self.format.num_channels;

        debug_assert!(reference.len() as u64 == sample_size * u64::from(num_channels));
        debug_assert!(
            slopes.len() as u64 == sample_size * u64::from(ssdpcm.num_slopes / 2)
        );
        debug_assert!(code.len() == usize::from(ssdpcm.code_bytes_per_block()));

        if let Some(index) = index {
            let mut offset = self.data_offset + index * u64::from(self.bytes_per_frame());
            if channel_idx > 0 {
                offset += bytes_per_block * u64::from(channel_idx);
                if has_reference_flag {
                    offset += sample_size * u64::from(num_channels);
                }
            }
            self.stream.seek(SeekFrom::Start(offset))?;
        }

        let position = self.position_in_data_or_rewind()?;

        let mut written = 0u64;
        if (has_reference_flag && channel_idx % num_channels == 0) || position == 0 {
            self.stream.write_all(reference)?;
            written += reference.len() as u64;
        }
        self.stream.write_all(slopes)?;
        self.stream.write_all(code)?;
        written += slopes.len() as u64 + code.len() as u64;

        self.grow_data(position + written);
        Ok(())
    }

    /// Rewrites the header if it is out of date. Call before dropping a writable handle.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.header_synced {
            self.write_header()?;
        }
        Ok(())
    }

    fn grow_data(&mut self, end: u64) {
        if end > u64::from(self.data_length) {
            self.data_length = end as u32;
            self.header_synced = false;
        }
    }

    /// Like `position_in_data`, but a cursor still parked in the header rewinds to the start
    /// of the data chunk instead of failing.
    fn position_in_data_or_rewind(&mut self) -> Result<u64> {
        let position = self.stream.stream_position()?;
        if position < self.data_offset {
            self.stream.seek(SeekFrom::Start(self.data_offset))?;
            return Ok(0);
        }
        Ok(position - self.data_offset)
    }
}
