// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use ssdpcm_core::audio::Channels;
use ssdpcm_core::codec::{BlockMode, MAX_NUM_SLOPES};
use ssdpcm_core::errors::{decode_error, limit_error, unsupported_error, Result};
use ssdpcm_core::sample::SampleFormat;

/// The classic integer PCM format tag.
pub const WAVE_FORMAT_PCM: u16 = 0x0001;
/// The Extensible Wave Format tag.
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// The PCM sub-format GUID of an extensible fmt chunk. The definition can be found in
/// ksmedia.h of the Microsoft Windows Platform SDK; high-sample-rate PCM WAV files are
/// sometimes written this way.
#[rustfmt::skip]
pub const KSDATAFORMAT_SUBTYPE_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00,
    0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];

/// The SSDPCM sub-format GUID: the ASCII string "SSDPCM:Kagamiin~". Slightly off-spec as GUIDs
/// go, but well-formed enough to pass as a version 4 UUID once the mixed field endianness is
/// taken into account.
#[rustfmt::skip]
pub const SSDPCM_SUBTYPE_GUID: [u8; 16] = [
    0x53, 0x53, 0x44, 0x50, 0x43, 0x4d, 0x3a, 0x4b,
    0x61, 0x67, 0x61, 0x6d, 0x69, 0x69, 0x6e, 0x7e,
];

/// The sub-chunk id introducing the SSDPCM-specific fields inside an extensible fmt chunk.
pub const SSDPCM_CHUNK_ID: [u8; 4] = *b"SsDP";

/// The SSDPCM-specific fields carried behind the `SsDP` id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsdpcmFormat {
    /// The coding mode.
    pub mode: BlockMode,
    /// The number of slope-palette entries per block.
    pub num_slopes: u8,
    /// The decoded output width: 8 or 16 bits.
    pub bits_per_output_sample: u8,
    /// The packed codeword stream may only be split at multiples of this many bytes.
    pub bytes_per_read_alignment: u8,
    /// Whether every block record is preceded by per-channel reference samples. When unset,
    /// only the very first block carries them and the decoder threads the reference across
    /// blocks itself.
    pub has_reference_sample_on_every_block: bool,
    /// Samples per block.
    pub block_length: u16,
    /// Size of one per-channel block record on disk: the stored slope half plus the packed
    /// codeword stream. Reference samples are not included here.
    pub bytes_per_block: u16,
}

impl SsdpcmFormat {
    /// On-disk size of these fields, including the `SsDP` id.
    pub const SIZE: u16 = 16;

    /// Builds the sub-chunk for an encode of the given mode and output format.
    pub fn new(
        mode: BlockMode,
        format: SampleFormat,
        block_length: u16,
        has_reference_sample: bool,
    ) -> SsdpcmFormat {
        SsdpcmFormat {
            mode,
            num_slopes: mode.num_slopes() as u8,
            bits_per_output_sample: format.bits_per_sample() as u8,
            bytes_per_read_alignment: mode.read_alignment(),
            has_reference_sample_on_every_block: has_reference_sample,
            block_length,
            bytes_per_block: mode.bytes_per_block(block_length, format.bytes_per_sample()),
        }
    }

    /// Gets the decoded output sample format.
    pub fn sample_format(&self) -> Result<SampleFormat> {
        match self.bits_per_output_sample {
            8 => Ok(SampleFormat::U8),
            16 => Ok(SampleFormat::S16Le),
            _ => unsupported_error("wav: ssdpcm bits per output sample must be 8 or 16"),
        }
    }

    /// Gets the width of one reference or slope sample in bytes.
    pub fn bytes_per_sample(&self) -> u16 {
        u16::from(self.bits_per_output_sample) / 8
    }

    /// Gets the size of the packed codeword stream of one block record.
    pub fn code_bytes_per_block(&self) -> u16 {
        self.bytes_per_block - u16::from(self.num_slopes / 2) * self.bytes_per_sample()
    }

    fn parse<B: Read>(reader: &mut B) -> Result<SsdpcmFormat> {
        let mut fourcc = [0u8; 4];
        reader.read_exact(&mut fourcc)?;

        let mode = match BlockMode::from_fourcc(fourcc) {
            Some(mode) => mode,
            None => return unsupported_error("wav: unrecognized ssdpcm mode"),
        };

        let num_slopes = reader.read_u8()?;
        let bits_per_output_sample = reader.read_u8()?;
        let bytes_per_read_alignment = reader.read_u8()?;
        let has_reference_sample_on_every_block = reader.read_u8()? != 0;
        let block_length = reader.read_u16::<LittleEndian>()?;
        let bytes_per_block = reader.read_u16::<LittleEndian>()?;

        if usize::from(num_slopes) > MAX_NUM_SLOPES {
            return limit_error("wav: too many slopes");
        }
        if bits_per_output_sample != 8 && bits_per_output_sample != 16 {
            return unsupported_error("wav: ssdpcm bits per output sample must be 8 or 16");
        }

        Ok(SsdpcmFormat {
            mode,
            num_slopes,
            bits_per_output_sample,
            bytes_per_read_alignment,
            has_reference_sample_on_every_block,
            block_length,
            bytes_per_block,
        })
    }

    fn write_to<B: Write>(&self, writer: &mut B) -> Result<()> {
        writer.write_all(&SSDPCM_CHUNK_ID)?;
        writer.write_all(&self.mode.fourcc())?;
        writer.write_u8(self.num_slopes)?;
        writer.write_u8(self.bits_per_output_sample)?;
        writer.write_u8(self.bytes_per_read_alignment)?;
        writer.write_u8(u8::from(self.has_reference_sample_on_every_block))?;
        writer.write_u16::<LittleEndian>(self.block_length)?;
        writer.write_u16::<LittleEndian>(self.bytes_per_block)?;
        Ok(())
    }
}

/// The extensible payload of a fmt chunk: the 22 standard bytes plus, for SSDPCM streams, the
/// `SsDP` sub-chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatExtensible {
    /// The valid-bits-per-sample / samples-per-block union field.
    pub samples_per_block: u16,
    /// The channel mask.
    pub channel_mask: u32,
    /// The sub-format GUID.
    pub sub_format_guid: [u8; 16],
    /// The SSDPCM fields; present exactly when the GUID is the SSDPCM sub-format.
    pub ssdpcm: Option<SsdpcmFormat>,
}

impl FormatExtensible {
    fn extra_length(&self) -> u16 {
        match self.ssdpcm {
            Some(_) => 22 + SsdpcmFormat::SIZE,
            None => 22,
        }
    }
}

/// The parsed `fmt ` chunk of a WAVE stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaveFormatChunk {
    /// The format tag.
    pub fmt_tag: u16,
    /// The number of channels.
    pub num_channels: u16,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The average data rate in bytes/second. For SSDPCM this is derived from the block
    /// geometry rather than the sample width.
    pub avg_bytes_per_sec: u32,
    /// The byte alignment of one audio frame.
    pub block_align: u16,
    /// The encoded sample width. Zero for SSDPCM streams, whose effective width lives in the
    /// `SsDP` fields instead.
    pub bits_per_sample: u16,
    /// The extensible payload, when the format tag is `WAVE_FORMAT_EXTENSIBLE`.
    pub extensible: Option<FormatExtensible>,
}

impl WaveFormatChunk {
    /// A fresh header's fmt chunk: mono unsigned 8-bit PCM at 8 kHz.
    pub fn default_pcm() -> WaveFormatChunk {
        WaveFormatChunk {
            fmt_tag: WAVE_FORMAT_PCM,
            num_channels: 1,
            sample_rate: 8000,
            avg_bytes_per_sec: 8000,
            block_align: 1,
            bits_per_sample: 8,
            extensible: None,
        }
    }

    /// Gets the length in bytes of the chunk payload.
    pub fn len(&self) -> u32 {
        match self.extensible {
            Some(ref ext) => 16 + 2 + u32::from(ext.extra_length()),
            None => 16,
        }
    }

    /// Gets the SSDPCM fields, or an error for plain PCM streams.
    pub fn ssdpcm(&self) -> Result<&SsdpcmFormat> {
        match self.extensible.as_ref().and_then(|ext| ext.ssdpcm.as_ref()) {
            Some(ssdpcm) => Ok(ssdpcm),
            None => decode_error("wav: not an ssdpcm stream"),
        }
    }

    /// Parses a fmt chunk payload of `len` bytes.
    ///
    /// The payload is buffered first so foreign trailing bytes inside an oversized chunk are
    /// skipped without any seeking.
    pub fn parse<B: Read>(reader: &mut B, len: u32) -> Result<WaveFormatChunk> {
        if len < 16 {
            return decode_error("wav: fmt chunk too small");
        }

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload)?;
        let mut reader = &payload[..];

        let fmt_tag = reader.read_u16::<LittleEndian>()?;
        let num_channels = reader.read_u16::<LittleEndian>()?;
        let sample_rate = reader.read_u32::<LittleEndian>()?;
        let avg_bytes_per_sec = reader.read_u32::<LittleEndian>()?;
        let block_align = reader.read_u16::<LittleEndian>()?;
        let bits_per_sample = reader.read_u16::<LittleEndian>()?;

        let extensible = match fmt_tag {
            WAVE_FORMAT_PCM => None,
            WAVE_FORMAT_EXTENSIBLE => Some(Self::parse_extensible(&mut reader)?),
            _ => return unsupported_error("wav: unsupported wave format"),
        };

        let chunk = WaveFormatChunk {
            fmt_tag,
            num_channels,
            sample_rate,
            avg_bytes_per_sec,
            block_align,
            bits_per_sample,
            extensible,
        };

        // The rate and alignment fields of a classic PCM header are redundant; refuse streams
        // where they disagree with the sample geometry.
        if fmt_tag == WAVE_FORMAT_PCM {
            if bits_per_sample != 8 && bits_per_sample != 16 {
                return unsupported_error("wav: bits per sample must be 8 or 16");
            }
            let frame_size = u32::from(num_channels) * u32::from(bits_per_sample) / 8;
            if sample_rate * frame_size != avg_bytes_per_sec {
                return decode_error("wav: mismatched byte rate");
            }
            if frame_size != u32::from(block_align) {
                return decode_error("wav: mismatched block alignment");
            }
        }

        Ok(chunk)
    }

    fn parse_extensible<B: Read>(reader: &mut B) -> Result<FormatExtensible> {
        let extra_length = reader.read_u16::<LittleEndian>()?;

        // The standard extension is exactly 22 bytes; the SSDPCM sub-chunk rides behind it.
        if extra_length < 22 {
            return decode_error("wav: extra data size too small for fmt_ext chunk");
        }

        let samples_per_block = reader.read_u16::<LittleEndian>()?;
        let channel_mask = reader.read_u32::<LittleEndian>()?;

        let mut sub_format_guid = [0u8; 16];
        reader.read_exact(&mut sub_format_guid)?;

        let ssdpcm = match sub_format_guid {
            SSDPCM_SUBTYPE_GUID => {
                let mut chunk_id = [0u8; 4];
                reader.read_exact(&mut chunk_id)?;
                if chunk_id != SSDPCM_CHUNK_ID {
                    return decode_error("wav: invalid ssdpcm sub-header");
                }
                Some(SsdpcmFormat::parse(reader)?)
            }
            KSDATAFORMAT_SUBTYPE_PCM => None,
            _ => return unsupported_error("wav: unrecognized sub-format guid"),
        };

        Ok(FormatExtensible { samples_per_block, channel_mask, sub_format_guid, ssdpcm })
    }

    /// Writes the 16 base fields of the chunk.
    pub fn write_base_fields<B: Write>(&self, writer: &mut B) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.fmt_tag)?;
        writer.write_u16::<LittleEndian>(self.num_channels)?;
        writer.write_u32::<LittleEndian>(self.sample_rate)?;
        writer.write_u32::<LittleEndian>(self.avg_bytes_per_sec)?;
        writer.write_u16::<LittleEndian>(self.block_align)?;
        writer.write_u16::<LittleEndian>(self.bits_per_sample)?;
        Ok(())
    }

    /// Writes the whole chunk, including its `fmt ` id and a length prefix of `fmt_length`
    /// bytes. A declared length beyond what the fields occupy is padded with zeros, keeping
    /// oversized headers of updated files byte-stable.
    pub fn write_to<B: Write>(&self, writer: &mut B, fmt_length: u32) -> Result<()> {
        debug_assert!(fmt_length >= self.len());

        writer.write_all(b"fmt ")?;
        writer.write_u32::<LittleEndian>(fmt_length)?;
        self.write_base_fields(writer)?;

        let mut written = 16;
        if let Some(ref ext) = self.extensible {
            writer.write_u16::<LittleEndian>(ext.extra_length())?;
            writer.write_u16::<LittleEndian>(ext.samples_per_block)?;
            writer.write_u32::<LittleEndian>(ext.channel_mask)?;
            writer.write_all(&ext.sub_format_guid)?;
            if let Some(ref ssdpcm) = ext.ssdpcm {
                ssdpcm.write_to(writer)?;
            }
            written = self.len();
        }

        for _ in written..fmt_length {
            writer.write_u8(0)?;
        }

        Ok(())
    }

    /// Reconfigures the chunk for classic PCM in the given sample format, keeping the sample
    /// rate and channel count.
    pub fn set_pcm_format(&mut self, format: SampleFormat) {
        self.fmt_tag = WAVE_FORMAT_PCM;
        self.bits_per_sample = format.bits_per_sample();
        self.block_align = format.bytes_per_sample() * self.num_channels;
        self.avg_bytes_per_sec = u32::from(self.block_align) * self.sample_rate;
        self.extensible = None;
    }

    /// Reconfigures the chunk as an SSDPCM stream of the given mode and output format.
    pub fn init_ssdpcm(
        &mut self,
        format: SampleFormat,
        mode: BlockMode,
        block_length: u16,
        has_reference_sample: bool,
    ) -> Result<()> {
        let ssdpcm = SsdpcmFormat::new(mode, format, block_length, has_reference_sample);
        let channels = match Channels::from_count(usize::from(self.num_channels)) {
            Some(channels) => channels,
            None => return unsupported_error("wav: only mono and stereo are supported"),
        };

        self.fmt_tag = WAVE_FORMAT_EXTENSIBLE;
        self.bits_per_sample = 0;
        self.avg_bytes_per_sec = self.sample_rate * u32::from(ssdpcm.bytes_per_block)
            * u32::from(self.num_channels)
            / u32::from(block_length);
        self.block_align = (ssdpcm.bytes_per_block
            + if has_reference_sample { ssdpcm.bytes_per_sample() } else { 0 })
            * self.num_channels;

        self.extensible = Some(FormatExtensible {
            samples_per_block: block_length,
            channel_mask: channels.bits(),
            sub_format_guid: SSDPCM_SUBTYPE_GUID,
            ssdpcm: Some(ssdpcm),
        });

        Ok(())
    }
}
