// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use flac_frames::{
    Error,
    decode::{DecodeOptions, FrameReader, read_packet},
    metadata::Streaminfo,
    residual::{CodingMethod, Partition},
    stream::{ChannelAssignment, CodedNumber, Frame},
    subframe::SubframeKind,
    sync::SyncWord,
};

// 44100Hz, 2 channels, 16 bps, 192 samples
const METADATA: [u8; 42] = [
    0x66, 0x4C, 0x61, 0x43, // fLaC
    0x80, 0x00, 0x00, 0x22, // last block, STREAMINFO, 34 bytes
    0x10, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0A, 0xC4, 0x42, 0xF0, 0x00, 0x00,
    0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00,
];

// two CONSTANT subframes in a fixed block size frame
const CONSTANT_FRAME: [u8; 14] = [
    0xFF, 0xF8, 0x10, 0x10, 0x00, 0x4E, 0x00, 0x12, 0x34, 0x00, 0x00, 0x42, 0xC0, 0xDE,
];

// a variable block size frame with FIXED and LPC subframes,
// a side channel, wasted bits, an escaped residual partition
// and deferred block size and sample rate
fn predicted_frame() -> Vec<u8> {
    use bitstream_io::{BigEndian, BitWrite, BitWriter};

    fn build(w: &mut BitWriter<Vec<u8>, BigEndian>) -> std::io::Result<()> {
        // frame header
        w.write::<16, u16>(0xFFF9)?;
        w.write::<4, u8>(0b0110)?;
        w.write::<4, u8>(0b1100)?;
        w.write::<4, u8>(0b1001)?;
        w.write::<3, u8>(0b100)?;
        w.write::<1, u8>(0)?;
        w.write::<8, u8>(0b110_00010)?;
        w.write::<8, u8>(0b10_000000)?;
        w.write::<8, u8>(15)?;
        w.write::<8, u8>(48)?;
        w.write::<8, u8>(0xAB)?;

        // side channel, FIXED order 2
        w.write::<8, u8>(0b0_001010_0)?;
        w.write::<17, u32>((1 << 17) - 70000)?;
        w.write::<17, u32>(65000)?;
        w.write::<2, u8>(0)?;
        w.write::<4, u8>(0)?;
        w.write::<4, u8>(1)?;
        // the first Rice partition ignores the predictor order
        for _ in 0..16 {
            w.write::<2, u8>(0b10)?;
        }

        // right channel, LPC order 2, 2 wasted bits
        w.write::<8, u8>(0b0_100001_1)?;
        w.write::<2, u8>(0b01)?;
        w.write::<14, u16>(0x3FFF)?;
        w.write::<14, u16>(100)?;
        w.write::<4, u8>(11)?;
        w.write::<5, u8>(0b11110)?;
        w.write::<12, u16>(0x800)?;
        w.write::<12, u16>(2047)?;
        w.write::<2, u8>(1)?;
        w.write::<4, u8>(1)?;
        w.write::<5, u8>(31)?;
        w.write::<5, u8>(5)?;
        w.write::<30, u32>(0x1555_5555)?;
        w.write::<5, u8>(3)?;
        for _ in 0..8 {
            w.write::<4, u8>(0b1_101)?;
        }

        w.byte_align()?;
        w.write::<16, u16>(0x1234)
    }

    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    build(&mut w).unwrap();
    w.into_writer()
}

fn streaminfo() -> Streaminfo {
    Streaminfo::new(44100, 16, 2)
}

fn assert_constant_frame(frame: &Frame) {
    assert_eq!(frame.header.sync, SyncWord::FIXED);
    assert_eq!(frame.header.coded_number, CodedNumber::FrameNumber(0));
    assert_eq!(frame.header.block_size, 192);
    assert_eq!(frame.header.sample_rate, 44100);
    assert_eq!(
        frame.header.channel_assignment,
        ChannelAssignment::Independent(2)
    );
    assert_eq!(frame.header.bits_per_sample, 16);
    assert_eq!(frame.header.crc8, 0x4E);
    assert_eq!(frame.subframes.len(), 2);
    assert_eq!(
        frame.subframes[0].kind,
        SubframeKind::Constant { sample: 0x1234 }
    );
    assert_eq!(frame.subframes[1].kind, SubframeKind::Constant { sample: 0x42 });
    assert_eq!(frame.crc16, 0xC0DE);
    assert_eq!(frame.len(), CONSTANT_FRAME.len());
}

#[test]
fn test_constant_frame() {
    let frame = read_packet(&CONSTANT_FRAME, &streaminfo(), &DecodeOptions::default()).unwrap();
    assert_constant_frame(&frame);
    assert_eq!(frame.to_bytes(), CONSTANT_FRAME);
    assert_eq!(frame.captured(), &CONSTANT_FRAME[2..]);

    let mut copy = Vec::new();
    frame.write_to(&mut copy).unwrap();
    assert_eq!(copy, CONSTANT_FRAME);
}

#[test]
fn test_predicted_frame() {
    let bytes = predicted_frame();
    let frame = read_packet(&bytes, &streaminfo(), &DecodeOptions::default()).unwrap();

    assert_eq!(frame.header.sync, SyncWord::VARIABLE);
    assert_eq!(frame.header.coded_number, CodedNumber::SampleNumber(128));
    assert_eq!(frame.header.block_size, 16);
    assert_eq!(frame.header.sample_rate, 48);
    assert_eq!(frame.header.channel_assignment, ChannelAssignment::SideRight);
    assert_eq!(frame.header.bits_per_sample, 16);
    assert_eq!(frame.header.crc8, 0xAB);

    let side = &frame.subframes[0];
    assert_eq!(side.sample_width, 17);
    assert_eq!(side.wasted_bits, 0);
    match &side.kind {
        SubframeKind::Fixed {
            order,
            warm_up,
            residual,
        } => {
            assert_eq!(*order, 2);
            assert_eq!(warm_up.as_slice(), &[-70000, 65000]);
            assert_eq!(residual.method, CodingMethod::Rice);
            assert_eq!(residual.partition_order, 0);
            assert_eq!(
                residual.partitions,
                vec![Partition::Rice {
                    parameter: 1,
                    samples: 16
                }]
            );
        }
        other => panic!("unexpected subframe {other:?}"),
    }

    let right = &frame.subframes[1];
    assert_eq!(right.sample_width, 16);
    assert_eq!(right.wasted_bits, 2);
    match &right.kind {
        SubframeKind::Lpc {
            order,
            warm_up,
            precision,
            shift,
            coefficients,
            residual,
        } => {
            assert_eq!(*order, 2);
            assert_eq!(warm_up.as_slice(), &[-1, 100]);
            assert_eq!(*precision, 12);
            assert_eq!(*shift, -2);
            assert_eq!(coefficients.as_slice(), &[-2048, 2047]);
            assert_eq!(residual.method, CodingMethod::Rice2);
            assert_eq!(residual.partition_order, 1);
            assert_eq!(
                residual.partitions,
                vec![
                    Partition::Escaped {
                        bits: 5,
                        samples: 6
                    },
                    Partition::Rice {
                        parameter: 3,
                        samples: 8
                    },
                ]
            );
            assert_eq!(residual.samples(), 14);
        }
        other => panic!("unexpected subframe {other:?}"),
    }

    assert_eq!(frame.crc16, 0x1234);
    assert_eq!(frame.to_bytes(), bytes);
}

#[test]
fn test_frame_reader() {
    let predicted = predicted_frame();

    let mut file = METADATA.to_vec();
    file.extend_from_slice(&CONSTANT_FRAME);
    file.extend_from_slice(&[0x00, 0x12]);
    file.extend_from_slice(&predicted);
    file.push(0xFF);

    let mut reader = FrameReader::new(file.as_slice()).unwrap();
    assert_eq!(reader.streaminfo().sample_rate, 44100);
    assert_eq!(reader.streaminfo().channels, 2);
    assert_eq!(reader.streaminfo().bits_per_sample, 16);
    assert_eq!(reader.offset(), 42);

    let (frame, offset) = reader.read_frame().unwrap().unwrap();
    assert_constant_frame(&frame);
    assert_eq!(offset, 42);

    let (frame, offset) = reader.read_frame().unwrap().unwrap();
    assert_eq!(frame.to_bytes(), predicted);
    assert_eq!(offset, 42 + 14 + 2);

    assert!(reader.read_frame().unwrap().is_none());
}

#[test]
fn test_reemit_frames() {
    let predicted = predicted_frame();

    let mut file = METADATA.to_vec();
    let mut frames = Vec::new();
    for frame in [&CONSTANT_FRAME[..], predicted.as_slice(), &CONSTANT_FRAME[..]] {
        // junk bytes never include the first byte of a sync word
        for _ in 0..fastrand::usize(0..16) {
            file.push(fastrand::u8(0..0xFF));
        }
        file.extend_from_slice(frame);
        frames.extend_from_slice(frame);
    }

    let mut copy = Vec::new();
    for frame in FrameReader::new(file.as_slice()).unwrap() {
        let (frame, offset) = frame.unwrap();
        assert_eq!(
            &file[offset as usize..offset as usize + frame.len()],
            frame.to_bytes().as_slice()
        );
        frame.write_to(&mut copy).unwrap();
    }
    assert_eq!(copy, frames);
}

#[test]
fn test_strict_sync() {
    let mut file = METADATA.to_vec();
    file.extend_from_slice(&CONSTANT_FRAME);
    file.extend_from_slice(&[0x00, 0x12]);
    file.extend_from_slice(&CONSTANT_FRAME);

    let mut frames =
        FrameReader::with_options(file.as_slice(), DecodeOptions::default().resync(false))
            .unwrap();
    assert!(matches!(frames.next(), Some(Ok((_, 42)))));
    assert!(matches!(frames.next(), Some(Err(Error::SyncNotFound))));
    // iteration ends after the first error
    assert!(frames.next().is_none());

    // back-to-back frames need no resync
    let mut file = METADATA.to_vec();
    file.extend_from_slice(&CONSTANT_FRAME);
    file.extend_from_slice(&CONSTANT_FRAME);
    let frames =
        FrameReader::with_options(file.as_slice(), DecodeOptions::default().resync(false))
            .unwrap();
    assert_eq!(
        frames
            .map(|f| f.map(|(_, offset)| offset))
            .collect::<Result<Vec<_>, _>>()
            .unwrap(),
        vec![42, 56]
    );
}

#[test]
fn test_reserved_codes() {
    let options = DecodeOptions::default();

    // a reserved subframe type consumes only its header
    let frame = read_packet(
        &[
            0xFF, 0xF8, 0x10, 0x10, 0x00, 0x4E, 0x04, 0x00, 0x00, 0x42, 0xC0, 0xDE,
        ],
        &streaminfo(),
        &options,
    )
    .unwrap();
    assert_eq!(
        frame.subframes[0].kind,
        SubframeKind::Reserved { type_code: 2 }
    );
    assert_eq!(frame.subframes[1].kind, SubframeKind::Constant { sample: 0x42 });

    // a reserved channel assignment has no subframes
    let frame = read_packet(
        &[0xFF, 0xF8, 0x10, 0xB0, 0x00, 0x4E, 0xC0, 0xDE],
        &streaminfo(),
        &options,
    )
    .unwrap();
    assert_eq!(
        frame.header.channel_assignment,
        ChannelAssignment::Reserved(0b1011)
    );
    assert!(frame.subframes.is_empty());
    assert_eq!(frame.crc16, 0xC0DE);

    // reserved sample size and invalid sample rate resolve to 0
    let frame = read_packet(
        &[0xFF, 0xF8, 0x1F, 0x06, 0x00, 0x4E, 0x00, 0xC0, 0xDE],
        &streaminfo(),
        &options,
    )
    .unwrap();
    assert_eq!(frame.header.sample_rate, 0);
    assert_eq!(frame.header.bits_per_sample, 0);
    assert_eq!(frame.subframes[0].kind, SubframeKind::Constant { sample: 0 });

    // wasted bits on a reserved sample size still leave a valid frame
    let packet = [0xFF, 0xF8, 0x10, 0x06, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00];
    let frame = read_packet(&packet, &streaminfo(), &options).unwrap();
    assert_eq!(frame.header.bits_per_sample, 0);
    assert_eq!(frame.subframes[0].wasted_bits, 1);
    assert_eq!(frame.subframes[0].kind, SubframeKind::Constant { sample: 0 });
    assert_eq!(frame.to_bytes(), packet);
}

#[test]
fn test_frame_errors() {
    let options = DecodeOptions::default();

    // truncated ahead of each subframe
    assert!(matches!(
        read_packet(&CONSTANT_FRAME[..6], &streaminfo(), &options),
        Err(Error::MalformedSubframe(0))
    ));
    assert!(matches!(
        read_packet(&CONSTANT_FRAME[..9], &streaminfo(), &options),
        Err(Error::MalformedSubframe(1))
    ));

    // truncated within a subframe or the footer
    assert!(matches!(
        read_packet(&CONSTANT_FRAME[..8], &streaminfo(), &options),
        Err(Error::Io(_))
    ));
    assert!(matches!(
        read_packet(&CONSTANT_FRAME[..13], &streaminfo(), &options),
        Err(Error::Io(_))
    ));

    // invalid frame number prefixes
    assert!(matches!(
        read_packet(
            &[0xFF, 0xF8, 0x10, 0x10, 0x80, 0x4E],
            &streaminfo(),
            &options
        ),
        Err(Error::InvalidCodedNumber)
    ));
    assert!(matches!(
        read_packet(
            &[0xFF, 0xF8, 0x10, 0x10, 0xFF, 0x4E],
            &streaminfo(),
            &options
        ),
        Err(Error::InvalidCodedNumber)
    ));

    // a bad continuation byte
    assert!(matches!(
        read_packet(
            &[0xFF, 0xF9, 0x10, 0x10, 0xC2, 0x00, 0x4E],
            &streaminfo(),
            &options
        ),
        Err(Error::InvalidCodedNumber)
    ));

    // FIXED subframe with a reserved residual coding method
    let err = read_packet(
        &[0xFF, 0xF8, 0x10, 0x00, 0x00, 0x4E, 0b0_001000_0, 0b10_000000],
        &streaminfo(),
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedResidualCoding(2)));
    assert_eq!(err.stage(), "residual");
}

#[test]
fn test_failed_frame_offsets() {
    let mut file = METADATA.to_vec();
    file.extend_from_slice(&CONSTANT_FRAME);
    file.extend_from_slice(&CONSTANT_FRAME[..9]);

    let mut reader = FrameReader::new(file.as_slice()).unwrap();
    assert!(matches!(reader.read_frame(), Ok(Some((_, 42)))));

    // the truncated frame's bytes are still accounted for
    assert!(matches!(
        reader.read_frame(),
        Err(Error::MalformedSubframe(1))
    ));
    assert_eq!(reader.offset(), 42 + 14 + 9);
    assert!(reader.read_frame().unwrap().is_none());

    // iteration stops at the failed frame
    let results = FrameReader::new(file.as_slice())
        .unwrap()
        .map(|r| r.is_ok())
        .collect::<Vec<_>>();
    assert_eq!(results, vec![true, false]);
}

#[test]
fn test_metadata_errors() {
    assert!(matches!(
        FrameReader::new(&CONSTANT_FRAME[..]),
        Err(Error::MissingFlacTag)
    ));

    let mut file = METADATA.to_vec();
    file[4] = 0x81; // PADDING instead of STREAMINFO
    assert!(matches!(
        FrameReader::new(file.as_slice()),
        Err(Error::MissingStreaminfo)
    ));
}
