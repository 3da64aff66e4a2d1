// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Cursor;

use ssdpcm_core::codec::BlockMode;
use ssdpcm_core::errors::Error;
use ssdpcm_core::sample::SampleFormat;
use ssdpcm_format_wav::{StreamKind, WavFile};

#[test]
fn verify_pcm_header_round_trip() {
    let mut wav = WavFile::create(Cursor::new(Vec::new())).unwrap();
    wav.set_sample_rate(44100);
    wav.set_num_channels(2).unwrap();
    wav.set_pcm_format(SampleFormat::S16Le);

    wav.write_frames(&[0u8; 4 * 16], None).unwrap();
    wav.finalize().unwrap();
    let bytes = wav.into_inner().into_inner();

    let mut reread = WavFile::read(Cursor::new(bytes.clone())).unwrap();
    assert_eq!(reread.stream_kind().unwrap(), StreamKind::Pcm(SampleFormat::S16Le));
    assert_eq!(reread.sample_rate(), 44100);
    assert_eq!(reread.num_channels(), 2);
    assert_eq!(reread.bytes_per_frame(), 4);
    assert_eq!(reread.data_length(), 64);

    let mut buf = [1u8; 4 * 16];
    let frames = reread.read_frames(&mut buf).unwrap();
    assert_eq!(frames, 16);
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn verify_rewritten_header_is_byte_identical() {
    // Parse a header, write it out to a fresh stream with recomputed sizes, and compare.
    let mut wav = WavFile::create(Cursor::new(Vec::new())).unwrap();
    wav.set_sample_rate(16000);
    wav.init_ssdpcm(SampleFormat::U8, BlockMode::Ss1_6, 65, false).unwrap();
    wav.write_header().unwrap();
    let original = wav.into_inner().into_inner();

    let source = WavFile::read(Cursor::new(original.clone())).unwrap();
    let mut copy = WavFile::create(Cursor::new(Vec::new())).unwrap();
    copy.set_sample_rate(source.sample_rate());
    copy.set_num_channels(source.num_channels()).unwrap();
    let ssdpcm = source.ssdpcm().unwrap();
    copy.init_ssdpcm(
        SampleFormat::U8,
        ssdpcm.mode,
        ssdpcm.block_length,
        ssdpcm.has_reference_sample_on_every_block,
    )
    .unwrap();
    copy.write_header().unwrap();
    let rewritten = copy.into_inner().into_inner();

    assert_eq!(original, rewritten);
}

#[test]
fn verify_ssdpcm_header_reports_declared_values() {
    let mut wav = WavFile::create(Cursor::new(Vec::new())).unwrap();
    wav.set_sample_rate(22050);
    wav.init_ssdpcm(SampleFormat::U8, BlockMode::Ss2, 128, true).unwrap();
    wav.write_header().unwrap();
    let bytes = wav.into_inner().into_inner();

    let wav = WavFile::read(Cursor::new(bytes)).unwrap();
    assert_eq!(wav.stream_kind().unwrap(), StreamKind::Ssdpcm);

    let ssdpcm = wav.ssdpcm().unwrap();
    assert_eq!(ssdpcm.mode, BlockMode::Ss2);
    assert_eq!(ssdpcm.num_slopes, 4);
    assert_eq!(ssdpcm.block_length, 128);
    assert_eq!(ssdpcm.bits_per_output_sample, 8);
    assert!(ssdpcm.has_reference_sample_on_every_block);
    assert_eq!(ssdpcm.bytes_per_block, 34);
    assert_eq!(wav.bytes_per_frame(), 35);
}

#[test]
fn verify_block_record_round_trip() {
    let mut wav = WavFile::create(Cursor::new(Vec::new())).unwrap();
    wav.init_ssdpcm(SampleFormat::U8, BlockMode::Ss1, 64, false).unwrap();
    wav.write_header().unwrap();
    wav.seek_to_frame(0).unwrap();

    // Two sequential blocks; only the first carries its reference sample.
    wav.write_block(None, 0, &[128], &[28], &[0xaa; 8]).unwrap();
    wav.write_block(None, 0, &[0], &[25], &[0x55; 8]).unwrap();
    wav.finalize().unwrap();
    let bytes = wav.into_inner().into_inner();

    let mut wav = WavFile::read(Cursor::new(bytes)).unwrap();
    wav.seek_to_frame(0).unwrap();

    let mut reference = [0u8; 1];
    let mut slopes = [0u8; 1];
    let mut code = [0u8; 8];

    assert!(wav.read_block(0, &mut reference, &mut slopes, &mut code).unwrap());
    assert_eq!(reference, [128]);
    assert_eq!(slopes, [28]);
    assert_eq!(code, [0xaa; 8]);

    assert!(!wav.read_block(0, &mut reference, &mut slopes, &mut code).unwrap());
    assert_eq!(slopes, [25]);
    assert_eq!(code, [0x55; 8]);

    match wav.read_block(0, &mut reference, &mut slopes, &mut code) {
        Err(Error::EndOfStream) => (),
        other => panic!("expected end of stream, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn verify_indexed_block_records_land_in_order() {
    // Records written out of order through the indexed path must land at their block offsets.
    let mut wav = WavFile::create(Cursor::new(Vec::new())).unwrap();
    wav.init_ssdpcm(SampleFormat::U8, BlockMode::Ss1, 64, true).unwrap();
    wav.write_header().unwrap();

    wav.write_block(Some(1), 0, &[11], &[1], &[0x11; 8]).unwrap();
    wav.write_block(Some(0), 0, &[10], &[0], &[0x00; 8]).unwrap();
    wav.write_block(Some(2), 0, &[12], &[2], &[0x22; 8]).unwrap();
    wav.finalize().unwrap();
    let bytes = wav.into_inner().into_inner();

    let mut wav = WavFile::read(Cursor::new(bytes)).unwrap();
    wav.seek_to_frame(0).unwrap();

    let mut reference = [0u8; 1];
    let mut slopes = [0u8; 1];
    let mut code = [0u8; 8];
    for k in 0..3u8 {
        assert!(wav.read_block(0, &mut reference, &mut slopes, &mut code).unwrap());
        assert_eq!(reference, [10 + k]);
        assert_eq!(slopes, [k]);
        assert_eq!(code, [k * 0x11; 8]);
    }
}

#[test]
fn verify_foreign_chunks_are_tolerated_and_preserved() {
    // Hand-build a file with a junk chunk between the fmt and data chunks.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&0u32.to_le_bytes()); // patched below
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // pcm
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&8000u32.to_le_bytes());
    bytes.extend_from_slice(&8000u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&8u16.to_le_bytes());
    bytes.extend_from_slice(b"JUNK");
    bytes.extend_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(b"abcd");
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&[0x7f, 0x80]);
    let riff_len = (bytes.len() - 8) as u32;
    bytes[4..8].copy_from_slice(&riff_len.to_le_bytes());

    let mut wav = WavFile::update(Cursor::new(bytes)).unwrap();
    assert_eq!(wav.stream_kind().unwrap(), StreamKind::Pcm(SampleFormat::U8));
    assert_eq!(wav.data_length(), 2);

    // Extend the data chunk and rewrite the header; the junk chunk must survive.
    wav.seek_to_frame(2).unwrap();
    wav.write_frames(&[0x81, 0x82], None).unwrap();
    wav.finalize().unwrap();
    let bytes = wav.into_inner().into_inner();

    let junk_at = bytes.windows(4).position(|w| w == b"JUNK").unwrap();
    assert_eq!(&bytes[junk_at + 8..junk_at + 12], b"abcd");

    let mut wav = WavFile::read(Cursor::new(bytes)).unwrap();
    assert_eq!(wav.data_length(), 4);
    let mut buf = [0u8; 4];
    assert_eq!(wav.read_frames(&mut buf).unwrap(), 4);
    assert_eq!(buf, [0x7f, 0x80, 0x81, 0x82]);
}

#[test]
fn verify_rejects_non_wave_streams() {
    assert!(WavFile::read(Cursor::new(b"OggS junk that is not a wave file".to_vec())).is_err());
    assert!(WavFile::read(Cursor::new(b"RIFF\x04\x00\x00\x00AVI ".to_vec())).is_err());
}
