// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{Read, Seek, Write};

use log::info;

use ssdpcm_codec::filter::comb_filter;
use ssdpcm_codec::pack::{pack_codewords, unpack_codewords};
use ssdpcm_codec::search::encode_refined;
use ssdpcm_codec::{Block, Metric, SigmaTracker};
use ssdpcm_core::codec::{BlockMode, Codeword};
use ssdpcm_core::errors::{decode_error, invalid_argument_error, unsupported_error, Result};
use ssdpcm_core::sample::{self, Sample, SampleFormat};
use ssdpcm_format_wav::{StreamKind, WavFile};

pub(crate) fn encode_reference(format: SampleFormat, dest: &mut [u8], src: &[Sample]) {
    match format {
        SampleFormat::U8 => sample::encode_u8_overflow(dest, src),
        SampleFormat::S16Le => sample::encode_s16le(dest, src),
    }
}

pub(crate) fn decode_reference(format: SampleFormat, dest: &mut [Sample], src: &[u8]) {
    match format {
        SampleFormat::U8 => sample::decode_u8(dest, src),
        SampleFormat::S16Le => sample::decode_s16le(dest, src),
    }
}

// Stored slopes are the non-negative palette half, so 16-bit streams keep them unsigned;
// magnitudes up to the full 16-bit delta range stay intact that way.
pub(crate) fn encode_slopes(format: SampleFormat, dest: &mut [u8], src: &[Sample]) {
    match format {
        SampleFormat::U8 => sample::encode_u8_overflow(dest, src),
        SampleFormat::S16Le => sample::encode_u16le(dest, src),
    }
}

pub(crate) fn decode_slopes(format: SampleFormat, dest: &mut [Sample], src: &[u8]) {
    match format {
        SampleFormat::U8 => sample::decode_u8(dest, src),
        SampleFormat::S16Le => sample::decode_u16le(dest, src),
    }
}

pub(crate) fn decode_pcm_input(format: SampleFormat, dest: &mut [Vec<Sample>], src: &[u8]) {
    match format {
        SampleFormat::U8 => sample::decode_u8_multichannel(dest, src),
        SampleFormat::S16Le => sample::decode_s16le_multichannel(dest, src),
    }
}

pub(crate) fn encode_pcm_output(format: SampleFormat, dest: &mut [u8], src: &[Vec<Sample>]) {
    match format {
        SampleFormat::U8 => sample::encode_u8_overflow_multichannel(dest, src),
        SampleFormat::S16Le => sample::encode_s16le_multichannel(dest, src),
    }
}

pub(crate) fn pcm_input_format<S>(infile: &WavFile<S>) -> Result<SampleFormat> {
    match infile.stream_kind()? {
        StreamKind::Pcm(format) => Ok(format),
        StreamKind::Ssdpcm => {
            invalid_argument_error("input is already ssdpcm; use the decode mode")
        }
    }
}

pub(crate) fn check_channel_count(num_channels: u16) -> Result<()> {
    if num_channels == 0 || num_channels > 2 {
        return unsupported_error("only mono and stereo streams are supported");
    }
    Ok(())
}

/// Encodes a PCM input stream into an SSDPCM output stream, block by block.
///
/// The first block's reference sample is the first input sample; every later block is seeded
/// with the last *reconstructed* sample of its predecessor, so a decoder threading the
/// reference the same way reproduces the encoder's reconstruction exactly. With
/// `every_block_reference` set, each block's records are instead preceded by its own
/// reference samples (the layout the parallel encoder requires).
pub fn encode_stream<R, W>(
    infile: &mut WavFile<R>,
    outfile: &mut WavFile<W>,
    mode: BlockMode,
    every_block_reference: bool,
) -> Result<()>
where
    R: Read + Seek,
    W: Read + Write + Seek,
{
    let format = pcm_input_format(infile)?;
    let num_channels = infile.num_channels();
    check_channel_count(num_channels)?;
    let channels = usize::from(num_channels);
    let block_length = usize::from(mode.default_block_length());

    outfile.set_sample_rate(infile.sample_rate());
    outfile.set_num_channels(num_channels)?;
    outfile.init_ssdpcm(format, mode, block_length as u16, every_block_reference)?;
    outfile.write_header()?;
    infile.seek_to_frame(0)?;
    outfile.seek_to_frame(0)?;

    let sample_size = usize::from(format.bytes_per_sample());
    let code_size = usize::from(outfile.ssdpcm()?.code_bytes_per_block());
    let half = mode.num_slopes() / 2;

    let mut sigma = SigmaTracker::new(Metric::for_format(format, mode.is_comb()));
    let mut blocks: Vec<Block> =
        (0..channels).map(|_| Block::new(mode.num_slopes(), block_length)).collect();

    let mut conv_buf = vec![0u8; block_length * sample_size * channels];
    let mut sample_bufs: Vec<Vec<Sample>> = vec![vec![0; block_length]; channels];
    let mut decoded = vec![0; block_length];
    let mut reference_buf = vec![0u8; sample_size * channels];
    let mut slope_buf = vec![0u8; sample_size * half];
    let mut code_buf = vec![0u8; code_size];
    let mut initials = vec![0; channels];

    let mut block_count: u64 = 0;
    loop {
        let frames = infile.read_frames(&mut conv_buf)?;
        if frames < block_length {
            break;
        }

        decode_pcm_input(format, &mut sample_bufs, &conv_buf);

        // The very first reference is the stream's first input sample; afterwards the
        // references thread through the reconstruction. With per-block references, every
        // block re-seeds from its own first input sample instead.
        if block_count == 0 || every_block_reference {
            for (block, samples) in blocks.iter_mut().zip(&sample_bufs) {
                block.initial_sample = samples[0];
            }
        }
        for (initial, block) in initials.iter_mut().zip(&blocks) {
            *initial = block.initial_sample;
        }
        encode_reference(format, &mut reference_buf, &initials);

        eprint!("\rEncoding block {}...", block_count);

        for (n, block) in blocks.iter_mut().enumerate() {
            encode_refined(block, &sample_bufs[n], &mut sigma);

            // Decode our own block to obtain the exact reconstruction the decoder will see,
            // and carry its last sample into the next block.
            block.decode(&mut decoded);
            let last = decoded[block_length - 1];

            pack_codewords(mode, &block.deltas, &mut code_buf)?;
            encode_slopes(format, &mut slope_buf, &block.slopes[..half]);

            outfile.write_block(None, n as u16, &reference_buf, &slope_buf, &code_buf)?;

            block.initial_sample = last;
        }

        block_count += 1;
    }

    outfile.finalize()?;
    eprintln!();
    info!("encoded {} blocks of {} samples", block_count, block_length);
    Ok(())
}

/// Decodes an SSDPCM input stream into a PCM output stream.
///
/// When the stream carries a reference sample on every block, each block re-seeds from it;
/// otherwise the reference threads across blocks exactly as on the encode side.
pub fn decode_stream<R, W>(infile: &mut WavFile<R>, outfile: &mut WavFile<W>) -> Result<()>
where
    R: Read + Seek,
    W: Read + Write + Seek,
{
    let ssdpcm = infile.ssdpcm()?.clone();
    let mode = ssdpcm.mode;
    let format = ssdpcm.sample_format()?;
    let num_channels = infile.num_channels();
    check_channel_count(num_channels)?;
    let channels = usize::from(num_channels);
    let block_length = usize::from(ssdpcm.block_length);
    let num_slopes = usize::from(ssdpcm.num_slopes);
    let half = num_slopes / 2;

    if num_slopes != mode.num_slopes() {
        return decode_error("wav: slope count does not match the declared mode");
    }

    outfile.set_sample_rate(infile.sample_rate());
    outfile.set_num_channels(num_channels)?;
    outfile.set_pcm_format(format);
    outfile.write_header()?;
    infile.seek_to_frame(0)?;
    outfile.seek_to_frame(0)?;

    let sample_size = usize::from(ssdpcm.bytes_per_sample());
    let code_size = usize::from(ssdpcm.code_bytes_per_block());

    let mut blocks: Vec<Block> =
        (0..channels).map(|_| Block::new(num_slopes, block_length)).collect();

    let mut reference_buf = vec![0u8; sample_size * channels];
    let mut references = vec![0; channels];
    let mut slope_buf = vec![0u8; sample_size * half];
    let mut slopes_half = vec![0; half];
    let mut code_buf = vec![0u8; code_size];
    let mut deltas: Vec<Codeword> = Vec::new();
    let mut sample_bufs: Vec<Vec<Sample>> = vec![vec![0; block_length]; channels];
    let mut conv_buf = vec![0u8; block_length * sample_size * channels];

    let mut block_count: u64 = 0;
    'stream: loop {
        for n in 0..channels {
            let has_reference = match infile.read_block(
                n as u16,
                &mut reference_buf,
                &mut slope_buf,
                &mut code_buf,
            ) {
                Ok(has_reference) => has_reference,
                Err(ssdpcm_core::errors::Error::EndOfStream) => break 'stream,
                Err(err) => return Err(err),
            };

            if has_reference {
                decode_reference(format, &mut references, &reference_buf);
                for (block, &reference) in blocks.iter_mut().zip(&references) {
                    block.initial_sample = reference;
                }
            }

            let block = &mut blocks[n];
            decode_slopes(format, &mut slopes_half, &slope_buf);
            block.slopes[..half].copy_from_slice(&slopes_half);
            block.mirror_slopes();

            unpack_codewords(mode, &code_buf, block_length, &mut deltas)?;
            block.deltas.copy_from_slice(&deltas[..block_length]);
        }

        eprint!("\rDecoding block {}...", block_count);

        for (block, samples) in blocks.iter_mut().zip(sample_bufs.iter_mut()) {
            block.decode(samples);
            let last = samples[block_length - 1];
            if mode.is_comb() {
                comb_filter(samples, block.initial_sample);
            }
            block.initial_sample = last;
        }

        encode_pcm_output(format, &mut conv_buf, &sample_bufs);
        outfile.write_frames(&conv_buf, None)?;

        block_count += 1;
    }

    outfile.finalize()?;
    eprintln!();
    info!("decoded {} blocks of {} samples", block_count, block_length);
    Ok(())
}
