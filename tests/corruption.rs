// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use flac_frames::{decode::FrameReader, decode::read_packet, metadata::Streaminfo};

// fLaC tag and STREAMINFO for 44100Hz, 2 channels, 16 bps
const METADATA: [u8; 42] = [
    0x66, 0x4C, 0x61, 0x43, 0x80, 0x00, 0x00, 0x22, 0x10, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x0A, 0xC4, 0x42, 0xF0, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// a stereo frame with a VERBATIM and a FIXED subframe
const FRAME: [u8; 23] = [
    0xFF, 0xF8, 0x69, 0x18, 0x00, 0x03, 0x0C, // 4 samples, 44.1kHz, stereo, 16 bps
    0x02, // VERBATIM
    0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, // 4 samples
    0x12, // FIXED, order 1
    0xFF, 0xFF, // warm-up
    0x00, 0x3C, // Rice, order 0, parameter 0, 4 codes in the first partition
    0xAB, 0xCD, // CRC-16
];

#[test]
fn test_valid_file() {
    let mut file = METADATA.to_vec();
    for _ in 0..4 {
        file.extend_from_slice(&FRAME);
    }

    let frames = FrameReader::new(file.as_slice())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(frames.len(), 4);
    for (frame, offset) in frames {
        assert_eq!(frame.to_bytes(), FRAME);
        assert_eq!((offset - 42) % FRAME.len() as u64, 0);
    }
}

#[test]
fn test_file_corruption() {
    let mut valid = METADATA.to_vec();
    for _ in 0..4 {
        valid.extend_from_slice(&FRAME);
    }

    // flip random bits outside the metadata blocks,
    // and any frames that come back must still re-emit
    // exactly the bytes they were read from
    let valid_range = METADATA.len()..valid.len();

    for _ in 0..1000 {
        let mut file = valid.clone();
        for _ in 0..fastrand::usize(1..4) {
            file[fastrand::usize(valid_range.clone())] ^= 1 << fastrand::u32(0..8);
        }

        for result in FrameReader::new(file.as_slice()).unwrap() {
            match result {
                Ok((frame, offset)) => {
                    let offset = offset as usize;
                    assert_eq!(frame.to_bytes(), &file[offset..offset + frame.len()]);
                }
                Err(_) => break,
            }
        }
    }
}

#[test]
fn test_random_packets() {
    let streaminfo = Streaminfo::new(44100, 16, 2);

    for _ in 0..1000 {
        // random garbage following a valid sync word
        let mut packet = vec![0xFF, 0xF8];
        packet.extend(std::iter::repeat_with(|| fastrand::u8(..)).take(fastrand::usize(0..64)));

        if let Ok(frame) = read_packet(&packet, &streaminfo, &Default::default()) {
            assert_eq!(frame.to_bytes(), &packet[0..frame.len()]);
        }
    }
}

#[test]
fn test_truncated_frames() {
    let streaminfo = Streaminfo::new(44100, 16, 2);

    assert!(read_packet(&FRAME, &streaminfo, &Default::default()).is_ok());

    for len in 0..FRAME.len() {
        assert!(read_packet(&FRAME[0..len], &streaminfo, &Default::default()).is_err());
    }
}
