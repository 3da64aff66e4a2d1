// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The multithreaded encode driver.
//!
//! Encoding parallelises cleanly once every block carries its own reference samples: blocks
//! become independent, so a pool of workers can claim block indices with a fetch-add counter
//! and write finished records at their absolute offsets in any completion order. The input
//! reader is the one ordered resource; a worker claims the next block index and reads that
//! block's PCM under the same lock so indices and data stay in step. Decoding stays serial,
//! since without per-block references the reconstruction chains across block boundaries.

use std::io::{Read, Seek, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;

use log::info;

use ssdpcm_codec::pack::pack_codewords;
use ssdpcm_codec::search::encode_refined;
use ssdpcm_codec::{Block, Metric, SigmaTracker};
use ssdpcm_core::codec::BlockMode;
use ssdpcm_core::errors::{Error, Result};
use ssdpcm_core::sample::Sample;
use ssdpcm_format_wav::WavFile;

use crate::driver::{
    check_channel_count, decode_pcm_input, encode_reference, encode_slopes, pcm_input_format,
};

/// Encodes a PCM input stream into an SSDPCM output stream on `num_threads` worker threads.
///
/// The output always carries a reference sample on every block; see the module docs.
pub fn encode_stream_parallel<R, W>(
    infile: &mut WavFile<R>,
    outfile: &mut WavFile<W>,
    mode: BlockMode,
    num_threads: usize,
) -> Result<()>
where
    R: Read + Seek + Send,
    W: Read + Write + Seek + Send,
{
    let format = pcm_input_format(infile)?;
    let num_channels = infile.num_channels();
    check_channel_count(num_channels)?;
    let channels = usize::from(num_channels);
    let block_length = usize::from(mode.default_block_length());

    outfile.set_sample_rate(infile.sample_rate());
    outfile.set_num_channels(num_channels)?;
    outfile.init_ssdpcm(format, mode, block_length as u16, true)?;
    outfile.write_header()?;
    infile.seek_to_frame(0)?;
    outfile.seek_to_frame(0)?;

    let sample_size = usize::from(format.bytes_per_sample());
    let code_size = usize::from(outfile.ssdpcm()?.code_bytes_per_block());
    let half = mode.num_slopes() / 2;

    info!("encoding in parallel with {} threads", num_threads);

    let block_counter = AtomicU64::new(0);
    let reader = Mutex::new(infile);
    let writer = Mutex::new(outfile);
    let failure: Mutex<Option<Error>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..num_threads.max(1) {
            scope.spawn(|| {
                let mut sigma = SigmaTracker::new(Metric::for_format(format, mode.is_comb()));
                let mut blocks: Vec<Block> =
                    (0..channels).map(|_| Block::new(mode.num_slopes(), block_length)).collect();

                let mut conv_buf = vec![0u8; block_length * sample_size * channels];
                let mut sample_bufs: Vec<Vec<Sample>> = vec![vec![0; block_length]; channels];
                let mut reference_buf = vec![0u8; sample_size * channels];
                let mut slope_buf = vec![0u8; sample_size * half];
                let mut code_buf = vec![0u8; code_size];
                let mut initials = vec![0; channels];

                loop {
                    if failure.lock().unwrap().is_some() {
                        return;
                    }

                    // Claim the next block index and read its input under one lock so the
                    // index always matches the data.
                    let (index, frames) = {
                        let mut reader = reader.lock().unwrap();
                        let index = block_counter.fetch_add(1, Ordering::SeqCst);
                        match reader.read_frames(&mut conv_buf) {
                            Ok(frames) => (index, frames),
                            Err(err) => {
                                failure.lock().unwrap().get_or_insert(err);
                                return;
                            }
                        }
                    };

                    if frames < block_length {
                        return;
                    }

                    decode_pcm_input(format, &mut sample_bufs, &conv_buf);

                    // Every block is seeded from its own first input sample; that sample is
                    // also its on-disk reference, which is what makes the blocks independent.
                    for (n, block) in blocks.iter_mut().enumerate() {
                        block.initial_sample = sample_bufs[n][0];
                        initials[n] = block.initial_sample;
                    }
                    encode_reference(format, &mut reference_buf, &initials);

                    for (n, block) in blocks.iter_mut().enumerate() {
                        encode_refined(block, &sample_bufs[n], &mut sigma);

                        if let Err(err) = pack_codewords(mode, &block.deltas, &mut code_buf) {
                            failure.lock().unwrap().get_or_insert(err);
                            return;
                        }
                        encode_slopes(format, &mut slope_buf, &block.slopes[..half]);

                        let mut writer = writer.lock().unwrap();
                        if n == 0 {
                            eprint!("\rEncoding block {}...", index);
                        }
                        if let Err(err) = writer.write_block(
                            Some(index),
                            n as u16,
                            &reference_buf,
                            &slope_buf,
                            &code_buf,
                        ) {
                            failure.lock().unwrap().get_or_insert(err);
                            return;
                        }
                    }
                }
            });
        }
    });

    if let Some(err) = failure.into_inner().unwrap() {
        return Err(err);
    }

    let outfile = writer.into_inner().unwrap();
    outfile.finalize()?;
    eprintln!();

    let blocks_written = outfile.data_length() / u32::from(outfile.bytes_per_frame());
    info!("encoded {} blocks of {} samples", blocks_written, block_length);
    Ok(())
}
