// SSDPCM
// Copyright (c) 2022-2025 The Project SSDPCM Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::{File, OpenOptions};
use std::process::exit;
use std::thread;

use clap::{App, Arg};
use log::error;

use ssdpcm_cli::driver::decode_stream;
use ssdpcm_cli::parallel::encode_stream_parallel;
use ssdpcm_cli::DriverMode;
use ssdpcm_core::errors::Result;
use ssdpcm_format_wav::WavFile;

fn main() {
    pretty_env_logger::init();

    let args = App::new("encoder_parallel")
        .about(
            "SSDPCM encoder/decoder, multithreaded. The speedup matters most for the higher \
             quality modes such as ss2, ss2.3 and ss3; for the lower ones the plain encoder \
             is just as quick. Decoding always runs on one thread.",
        )
        .arg(
            Arg::with_name("MODE")
                .help(
                    "Encoding mode, in increasing order of bitrate: ss1, ss1c (comb filtered), \
                     ss1.6, ss2, ss2.3, ss3; or 'decode' to decode an encoded input file",
                )
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("INPUT")
                .help(
                    "An 8-bit unsigned or 16-bit signed PCM WAV file for the encoding modes, \
                     or an encoded SSDPCM file for the decode mode",
                )
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Path for the encoded output file, or the decoded WAV file")
                .required(true)
                .index(3),
        )
        .try_get_matches();

    let args = match args {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    let mode = match DriverMode::from_arg(args.value_of("MODE").unwrap()) {
        Some(mode) => mode,
        None => {
            error!("unrecognized mode '{}'", args.value_of("MODE").unwrap());
            exit(1);
        }
    };

    let infile_name = args.value_of("INPUT").unwrap();
    let outfile_name = args.value_of("OUTPUT").unwrap();

    if let Err(err) = run(mode, infile_name, outfile_name) {
        error!("{}", err);
        exit(1);
    }
}

fn run(mode: DriverMode, infile_name: &str, outfile_name: &str) -> Result<()> {
    let mut infile = WavFile::read(File::open(infile_name)?)?;
    let outfile =
        OpenOptions::new().read(true).write(true).create(true).truncate(true).open(outfile_name)?;
    let mut outfile = WavFile::create(outfile)?;

    match mode {
        DriverMode::Encode(mode) => {
            let num_threads = thread::available_parallelism().map_or(1, |n| n.get());
            encode_stream_parallel(&mut infile, &mut outfile, mode, num_threads)
        }
        DriverMode::Decode => decode_stream(&mut infile, &mut outfile),
    }
}
