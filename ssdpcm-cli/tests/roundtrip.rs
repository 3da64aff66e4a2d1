// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-pipeline tests: PCM in, SSDPCM container in the middle, PCM out.
//!
//! The inputs are random walks whose steps are drawn from a small symmetric set, so a
//! zero-error slope palette exists for every block and the encode→decode cycle must
//! reproduce the input byte-exactly. That exercises the search, the codeword packers, the
//! container block records and the reference-sample threading in one go.

use std::io::Cursor;

use ssdpcm_cli::driver::{decode_stream, encode_stream};
use ssdpcm_cli::parallel::encode_stream_parallel;
use ssdpcm_core::codec::BlockMode;
use ssdpcm_core::sample::{self, Sample, SampleFormat};
use ssdpcm_format_wav::WavFile;

/// A walk from `start` whose i-th step is `steps[i % steps.len()]`.
fn walk(start: Sample, steps: &[Sample], len: usize) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(len);
    let mut state = start;
    for i in 0..len {
        state += steps[i % steps.len()];
        samples.push(state);
    }
    samples
}

fn make_pcm_wav(format: SampleFormat, channels: &[Vec<Sample>], sample_rate: u32) -> Vec<u8> {
    let frames = channels[0].len();
    let frame_size = usize::from(format.bytes_per_sample()) * channels.len();

    let mut bytes = vec![0u8; frames * frame_size];
    match format {
        SampleFormat::U8 => sample::encode_u8_overflow_multichannel(&mut bytes, channels),
        SampleFormat::S16Le => sample::encode_s16le_multichannel(&mut bytes, channels),
    }

    let mut wav = WavFile::create(Cursor::new(Vec::new())).unwrap();
    wav.set_sample_rate(sample_rate);
    wav.set_num_channels(channels.len() as u16).unwrap();
    wav.set_pcm_format(format);
    wav.write_frames(&bytes, None).unwrap();
    wav.finalize().unwrap();
    wav.into_inner().into_inner()
}

fn read_pcm_wav(bytes: Vec<u8>, format: SampleFormat, num_channels: usize) -> Vec<Vec<Sample>> {
    let mut wav = WavFile::read(Cursor::new(bytes)).unwrap();
    assert_eq!(usize::from(wav.num_channels()), num_channels);

    let frame_size = usize::from(wav.bytes_per_frame());
    let frames = wav.data_length() as usize / frame_size;
    let mut buf = vec![0u8; frames * frame_size];
    wav.seek_to_frame(0).unwrap();
    assert_eq!(wav.read_frames(&mut buf).unwrap(), frames);

    let mut channels = vec![vec![0; frames]; num_channels];
    match format {
        SampleFormat::U8 => sample::decode_u8_multichannel(&mut channels, &buf),
        SampleFormat::S16Le => sample::decode_s16le_multichannel(&mut channels, &buf),
    }
    channels
}

fn roundtrip(
    mode: BlockMode,
    format: SampleFormat,
    input: &[Vec<Sample>],
    parallel: bool,
) -> Vec<Vec<Sample>> {
    let pcm = make_pcm_wav(format, input, 16000);

    let mut infile = WavFile::read(Cursor::new(pcm)).unwrap();
    let mut encoded = WavFile::create(Cursor::new(Vec::new())).unwrap();
    if parallel {
        encode_stream_parallel(&mut infile, &mut encoded, mode, 2).unwrap();
    }
    else {
        encode_stream(&mut infile, &mut encoded, mode, false).unwrap();
    }
    let encoded_bytes = encoded.into_inner().into_inner();

    let mut infile = WavFile::read(Cursor::new(encoded_bytes)).unwrap();
    let mut decoded = WavFile::create(Cursor::new(Vec::new())).unwrap();
    decode_stream(&mut infile, &mut decoded).unwrap();

    read_pcm_wav(decoded.into_inner().into_inner(), format, input.len())
}

#[test]
fn verify_ss1_constant_round_trip() {
    let input = vec![vec![128; 128]];
    let output = roundtrip(BlockMode::Ss1, SampleFormat::U8, &input, false);
    assert_eq!(output, input);
}

#[test]
fn verify_ss1c_constant_round_trip() {
    // The comb filter averages a constant stream onto itself, so this must stay exact.
    let input = vec![vec![128; 128]];
    let output = roundtrip(BlockMode::Ss1c, SampleFormat::U8, &input, false);
    assert_eq!(output, input);
}

#[test]
fn verify_ss1_6_walk_round_trip() {
    // Steps drawn from {+3, 0, -3}: representable with a ±3 palette plus its implicit zero.
    let input = vec![walk(128, &[0, 3, 0, -3, 3, -3], 65 * 3)];
    let output = roundtrip(BlockMode::Ss1_6, SampleFormat::U8, &input, false);
    assert_eq!(output, input);
}

#[test]
fn verify_ss2_walk_round_trip() {
    let input = vec![walk(128, &[5, 0, -5, 0], 128 * 2)];
    let output = roundtrip(BlockMode::Ss2, SampleFormat::U8, &input, false);
    assert_eq!(output, input);
}

#[test]
fn verify_ss2_stereo_s16_round_trip() {
    // 16-bit stereo; the slope magnitude exceeds 255 to exercise the wide slope storage.
    let left = walk(0, &[300, 0, -300, 0], 128 * 2);
    let right = walk(-1000, &[0, 300, 0, -300], 128 * 2);
    let input = vec![left, right];
    let output = roundtrip(BlockMode::Ss2, SampleFormat::S16Le, &input, false);
    assert_eq!(output, input);
}

#[test]
fn verify_ss2_3_walk_round_trip() {
    let input = vec![walk(128, &[6, 1, 0, -1, -6], 120 * 2)];
    let output = roundtrip(BlockMode::Ss2_3, SampleFormat::U8, &input, false);
    assert_eq!(output, input);
}

#[test]
fn verify_ss3_walk_round_trip() {
    let input = vec![walk(128, &[9, 5, 2, 0, -2, -5, -9, 0], 120)];
    let output = roundtrip(BlockMode::Ss3, SampleFormat::U8, &input, false);
    assert_eq!(output, input);
}

#[test]
fn verify_parallel_encode_matches_input() {
    let input = vec![walk(128, &[5, 0, -5, 0], 128 * 4)];
    let output = roundtrip(BlockMode::Ss2, SampleFormat::U8, &input, true);
    assert_eq!(output, input);
}

#[test]
fn verify_parallel_stereo_s16_round_trip() {
    let left = walk(0, &[300, 0, -300, 0], 128 * 4);
    let right = walk(512, &[0, -300, 0, 300], 128 * 4);
    let input = vec![left, right];
    let output = roundtrip(BlockMode::Ss2, SampleFormat::S16Le, &input, true);
    assert_eq!(output, input);
}

#[test]
fn verify_trailing_partial_block_is_dropped() {
    let input = vec![vec![128; 64 + 64 + 17]];
    let output = roundtrip(BlockMode::Ss1, SampleFormat::U8, &input, false);
    assert_eq!(output[0].len(), 128);
    assert!(output[0].iter().all(|&s| s == 128));
}
