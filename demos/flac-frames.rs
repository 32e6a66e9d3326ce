// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use flac_frames::{
    Error,
    decode::FrameReader,
    residual::{Partition, Residual},
    stream::Frame,
    subframe::{Subframe, SubframeKind},
};
use std::path::Path;

/// Prints a structural dump of every frame in a FLAC file,
/// in the spirit of "flac -a <file.flac>",
/// and optionally copies the file's metadata and frames
/// byte-for-byte to a second file.
///
/// Setting `RUST_LOG=debug` shows skipped junk and failed frames.

fn main() {
    env_logger::init();

    let mut args = std::env::args_os().skip(1);
    match (args.next(), args.next()) {
        (Some(input), output) => {
            if let Err(err) = display_analysis(&input, output.as_ref()) {
                eprintln!("* {}, {} : {err}", input.display(), err.stage());
            }
        }
        (None, _) => eprintln!("* Usage: flac-frames <file.flac> [copy.flac]"),
    }
}

fn display_analysis<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Option<Q>,
) -> Result<(), Error> {
    use std::fs::File;
    use std::io::{BufReader, BufWriter, Read, Write};

    let frames = FrameReader::new(BufReader::new(File::open(input.as_ref())?))?;

    let mut output = match output {
        Some(output) => {
            let mut w = BufWriter::new(File::create(output)?);
            // the metadata blocks are carried over untouched
            std::io::copy(
                &mut File::open(input.as_ref())?.take(frames.offset()),
                &mut w,
            )?;
            Some(w)
        }
        None => None,
    };

    let streaminfo = frames.streaminfo();
    println!(
        "sample_rate={}\tchannels={}\tbits_per_sample={}\ttotal_samples={}",
        streaminfo.sample_rate,
        streaminfo.channels,
        streaminfo.bits_per_sample,
        streaminfo.total_samples.map(|s| s.get()).unwrap_or(0),
    );

    for frame in frames {
        let (frame, offset) = frame?;
        display_frame(offset, &frame);
        if let Some(w) = output.as_mut() {
            frame.write_to(w)?;
        }
    }

    if let Some(mut w) = output {
        w.flush()?;
    }

    Ok(())
}

fn display_frame(offset: u64, frame: &Frame) {
    println!(
        "frame={}\toffset={offset}\tbits={}\tblocksize={}\tsample_rate={}\tchannels={}\tchannel_assignment={}",
        frame.header.coded_number,
        frame.len() * 8,
        frame.header.block_size,
        frame.header.sample_rate,
        frame.header.channel_assignment.count(),
        frame.header.channel_assignment,
    );

    for subframe in &frame.subframes {
        display_subframe(subframe);
    }
}

fn display_subframe(subframe: &Subframe) {
    let Subframe {
        channel: num,
        wasted_bits,
        sample_width,
        kind,
    } = subframe;
    let subframe_type = kind.subframe_type();

    match kind {
        SubframeKind::Constant { sample } => println!(
            "\tsubframe={num}\twasted_bits={wasted_bits}\ttype={subframe_type}\tvalue={sample}"
        ),
        SubframeKind::Verbatim { .. } => {
            println!("\tsubframe={num}\twasted_bits={wasted_bits}\ttype={subframe_type}")
        }
        SubframeKind::Reserved { type_code } => println!(
            "\tsubframe={num}\twasted_bits={wasted_bits}\ttype={subframe_type}\tcode={type_code}"
        ),
        SubframeKind::Fixed {
            order,
            warm_up,
            residual,
        } => {
            println!(
                "\tsubframe={num}\twasted_bits={wasted_bits}\ttype={subframe_type}\torder={order}\tresidual_type={}\tpartition_order={}",
                residual.method, residual.partition_order
            );
            for (num, warm_up) in warm_up.iter().enumerate() {
                println!("\t\twarmup[{num}]={warm_up}");
            }
            display_residual(residual);
        }
        SubframeKind::Lpc {
            order,
            warm_up,
            precision,
            shift,
            coefficients,
            residual,
        } => {
            println!(
                "\tsubframe={num}\twasted_bits={wasted_bits}\ttype={subframe_type}\torder={order}\tqlp_coeff_precision={precision}\tquantization_level={shift}\tresidual_type={}\tpartition_order={}",
                residual.method, residual.partition_order
            );
            for (num, coeff) in coefficients.iter().enumerate() {
                println!("\t\tqlp_coeff[{num}]={coeff}");
            }
            for (num, warm_up) in warm_up.iter().enumerate() {
                println!("\t\twarmup[{num}]={warm_up}");
            }
            display_residual(residual);
        }
    }

    log::trace!("subframe {num} samples are {sample_width} bits wide");
}

fn display_residual(residual: &Residual) {
    for (num, partition) in residual.partitions.iter().enumerate() {
        match partition {
            Partition::Rice { parameter, .. } => println!("\t\tparameter[{num}]={parameter}"),
            Partition::Escaped { bits, .. } => {
                println!("\t\tparameter[{num}]=ESCAPE, raw_bits={bits}")
            }
        }
    }
}
