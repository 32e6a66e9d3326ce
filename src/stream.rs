// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling common FLAC stream items

use crate::Error;
use crate::capture::CaptureReader;
use crate::cursor::BitCursor;
use crate::decode::DecodeOptions;
use crate::metadata::Streaminfo;
use crate::subframe::Subframe;
use crate::sync::SyncWord;
use arrayvec::ArrayVec;
use std::io;

/// A FLAC frame header
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 15   | sync code | `0b111111111111100` |
/// | 1    | `blocking_strategy` | fixed or variable block size |
/// | 4    | `block_size` | block size code |
/// | 4    | `sample_rate` | sample rate code |
/// | 4    | `channel_assignment` | channel assignment |
/// | 3    | `bits_per_sample` | bits-per-sample code |
/// | 1    | padding | unused |
/// | 8-56 | `coded_number` | frame or sample number |
/// | (8 or 16) | uncommon block size | block size - 1 |
/// | (8 or 16) | uncommon sample rate | sample rate |
/// | 8    | `crc8` | header checksum |
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FrameHeader {
    /// The sync word the frame began with
    pub sync: SyncWord,
    /// Frame number or sample number, depending on the sync word
    pub coded_number: CodedNumber,
    /// Samples per channel, 0 for the reserved code
    pub block_size: u32,
    /// Sample rate in Hz, 0 for the invalid code
    pub sample_rate: u32,
    /// How channels are stored
    pub channel_assignment: ChannelAssignment,
    /// Bits-per-sample, 0 for reserved codes
    pub bits_per_sample: u32,
    /// Header checksum, as read but never verified
    pub crc8: u8,
}

impl FrameHeader {
    /// Reads frame header following an already-read sync word
    ///
    /// Reserved and invalid codes resolve to 0
    /// rather than raising an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the coded number is invalid
    /// or an I/O error occurs.
    pub fn read<R: io::Read>(
        r: &mut BitCursor<R>,
        sync: SyncWord,
        streaminfo: &Streaminfo,
    ) -> Result<Self, Error> {
        let block_size = BlockSize::from_code(r.read(4)? as u8);
        let sample_rate = SampleRate::from_code(r.read(4)? as u8, streaminfo);
        let channel_assignment = ChannelAssignment::from_code(r.read(4)? as u8);
        let bits_per_sample = match r.read(3)? {
            0b000 => streaminfo.bits_per_sample,
            0b001 => 8,
            0b010 => 12,
            0b100 => 16,
            0b101 => 20,
            0b110 => 24,
            _ => 0, // 0b011 and 0b111 are reserved
        };
        r.skip(1)?;
        let coded_number = CodedNumber::read(r, sync.variable_blocksize())?;

        Ok(Self {
            sync,
            coded_number,
            block_size: block_size.finalize(r)?,
            sample_rate: sample_rate.finalize(r)?,
            channel_assignment,
            bits_per_sample,
            crc8: r.read(8)? as u8,
        })
    }
}

/// A block size which may need an extension from the end of the header
///
/// # Example
/// ```
/// use flac_frames::stream::BlockSize;
///
/// assert_eq!(BlockSize::from_code(0b0001), BlockSize::Resolved(192));
/// assert_eq!(BlockSize::from_code(0b0110), BlockSize::Pending8);
///
/// let extension: &[u8] = &[0xFF];
/// let mut r = flac_frames::cursor::BitCursor::new(extension);
/// assert_eq!(BlockSize::Pending8.finalize(&mut r).unwrap(), 256);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockSize {
    /// A block size known from its code alone
    Resolved(u32),
    /// An 8-bit block size - 1 follows the coded number
    Pending8,
    /// A 16-bit block size - 1 follows the coded number
    Pending16,
}

impl BlockSize {
    /// Provisional block size from 4-bit code
    pub fn from_code(code: u8) -> Self {
        match code & 0b1111 {
            0b0000 => Self::Resolved(0),
            0b0001 => Self::Resolved(192),
            v @ 0b0010..=0b0101 => Self::Resolved(576u32 << (v - 2)),
            0b0110 => Self::Pending8,
            0b0111 => Self::Pending16,
            v => Self::Resolved(256u32 << (v - 8)),
        }
    }

    /// Reads any pending extension and returns final block size
    ///
    /// # Errors
    ///
    /// Passes along any I/O error.
    pub fn finalize<R: io::Read>(self, r: &mut BitCursor<R>) -> io::Result<u32> {
        match self {
            Self::Resolved(size) => Ok(size),
            Self::Pending8 => Ok(r.read(8)? + 1),
            Self::Pending16 => Ok(r.read(16)? + 1),
        }
    }
}

/// A sample rate which may need an extension from the end of the header
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SampleRate {
    /// A sample rate known from its code alone
    Resolved(u32),
    /// An 8-bit sample rate in Hz follows the coded number
    Pending8Hz,
    /// A 16-bit sample rate in Hz follows the coded number
    Pending16Hz,
    /// A 16-bit sample rate in tens of Hz follows the coded number
    PendingTensHz,
}

impl SampleRate {
    /// Provisional sample rate from 4-bit code
    ///
    /// Code 0 takes the rate from STREAMINFO.
    pub fn from_code(code: u8, streaminfo: &Streaminfo) -> Self {
        match code & 0b1111 {
            0b0000 => Self::Resolved(streaminfo.sample_rate),
            0b0001 => Self::Resolved(88200),
            0b0010 => Self::Resolved(176400),
            0b0011 => Self::Resolved(192000),
            0b0100 => Self::Resolved(8000),
            0b0101 => Self::Resolved(16000),
            0b0110 => Self::Resolved(22050),
            0b0111 => Self::Resolved(24000),
            0b1000 => Self::Resolved(32000),
            0b1001 => Self::Resolved(44100),
            0b1010 => Self::Resolved(48000),
            0b1011 => Self::Resolved(96000),
            0b1100 => Self::Pending8Hz,
            0b1101 => Self::Pending16Hz,
            0b1110 => Self::PendingTensHz,
            _ => Self::Resolved(0), // 0b1111 is invalid
        }
    }

    /// Reads any pending extension and returns final sample rate
    ///
    /// # Errors
    ///
    /// Passes along any I/O error.
    pub fn finalize<R: io::Read>(self, r: &mut BitCursor<R>) -> io::Result<u32> {
        match self {
            Self::Resolved(rate) => Ok(rate),
            Self::Pending8Hz => r.read(8),
            Self::Pending16Hz => r.read(16),
            Self::PendingTensHz => Ok(r.read(16)? * 10),
        }
    }
}

/// How a frame's channels are stored
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelAssignment {
    /// Channels stored as-is, with the given channel count
    Independent(u8),
    /// Left channel, then side channel
    LeftSide,
    /// Side channel, then right channel
    SideRight,
    /// Mid channel, then side channel
    MidSide,
    /// A reserved code, with no channels
    Reserved(u8),
}

impl ChannelAssignment {
    /// Channel assignment from 4-bit code
    pub fn from_code(code: u8) -> Self {
        match code & 0b1111 {
            c @ 0b0000..=0b0111 => Self::Independent(c + 1),
            0b1000 => Self::LeftSide,
            0b1001 => Self::SideRight,
            0b1010 => Self::MidSide,
            c => Self::Reserved(c),
        }
    }

    /// The 4-bit code as stored in the frame header
    pub fn code(&self) -> u8 {
        match self {
            Self::Independent(c) => c - 1,
            Self::LeftSide => 0b1000,
            Self::SideRight => 0b1001,
            Self::MidSide => 0b1010,
            Self::Reserved(c) => *c,
        }
    }

    /// Number of subframes in the frame
    pub fn count(&self) -> u8 {
        match self {
            Self::Independent(c) => *c,
            Self::LeftSide | Self::SideRight | Self::MidSide => 2,
            Self::Reserved(_) => 0,
        }
    }

    /// Which channel, if any, holds the side channel
    ///
    /// The side channel needs one more bit per sample
    /// than the frame's bits-per-sample.
    pub fn side_channel(&self) -> Option<u8> {
        match self {
            Self::LeftSide | Self::MidSide => Some(1),
            Self::SideRight => Some(0),
            Self::Independent(_) | Self::Reserved(_) => None,
        }
    }
}

impl std::fmt::Display for ChannelAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Independent(_) => "INDEPENDENT".fmt(f),
            Self::LeftSide => "LEFT_SIDE".fmt(f),
            Self::SideRight => "SIDE_RIGHT".fmt(f),
            Self::MidSide => "MID_SIDE".fmt(f),
            Self::Reserved(_) => "RESERVED".fmt(f),
        }
    }
}

/// A frame's position in the stream
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CodedNumber {
    /// Frame number, in a fixed block size stream
    FrameNumber(u64),
    /// Number of the first sample, in a variable block size stream
    SampleNumber(u64),
}

impl CodedNumber {
    /// Reads UTF-8 style coded number
    ///
    /// Its interpretation is set by the sync word's
    /// blocking strategy bit before any of it is read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCodedNumber`] for
    /// invalid length prefixes or continuation bytes.
    pub fn read<R: io::Read>(r: &mut BitCursor<R>, variable: bool) -> Result<Self, Error> {
        let value = match r.leading_ones()? {
            0 => u64::from(r.read(7)?),
            bytes @ 2..=7 => {
                let mut value = u64::from(r.read(7 - bytes)?);
                for _ in 1..bytes {
                    match r.read(2)? {
                        0b10 => {
                            value = value << 6 | u64::from(r.read(6)?);
                        }
                        _ => return Err(Error::InvalidCodedNumber),
                    }
                }
                value
            }
            _ => return Err(Error::InvalidCodedNumber),
        };

        Ok(match variable {
            true => Self::SampleNumber(value),
            false => Self::FrameNumber(value),
        })
    }
}

impl std::fmt::Display for CodedNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::FrameNumber(n) | Self::SampleNumber(n) => n.fmt(f),
        }
    }
}

/// A fully parsed FLAC frame
///
/// Alongside its structure, the frame keeps every byte
/// it was parsed from, so it can be written back out
/// exactly as it was read.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The frame's header
    pub header: FrameHeader,
    /// One subframe per channel
    pub subframes: ArrayVec<Subframe, 8>,
    /// Footer checksum, as read but never verified
    pub crc16: u16,
    captured: Vec<u8>,
}

impl Frame {
    /// Reads frame following an already-read sync word
    ///
    /// Bytes are captured from the first byte after the sync word
    /// through the footer's CRC-16.
    /// Should the frame fail to parse, the bytes captured up to the
    /// point of failure remain in `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is malformed
    /// or an I/O error occurs.
    pub fn read<R: io::Read>(
        reader: &mut CaptureReader<R>,
        sync: SyncWord,
        streaminfo: &Streaminfo,
        options: &DecodeOptions,
    ) -> Result<Self, Error> {
        use std::io::Read;

        let mut r = BitCursor::new(reader.by_ref());
        let header = FrameHeader::read(&mut r, sync, streaminfo)?;

        let subframes = (0..header.channel_assignment.count())
            .map(|channel| Subframe::read(&mut r, &header, channel, options))
            .collect::<Result<ArrayVec<_, 8>, _>>()?;

        r.read_to_byte_boundary();
        let crc16 = r.read(16)? as u16;
        drop(r);

        let frame = Self {
            header,
            subframes,
            crc16,
            captured: reader.take_captured(),
        };

        log::debug!(
            "frame {} : {} bytes, block size {}, {} channels ({})",
            frame.header.coded_number,
            frame.len(),
            frame.header.block_size,
            frame.header.channel_assignment.count(),
            frame.header.channel_assignment,
        );

        Ok(frame)
    }

    /// The bytes captured after the sync word
    #[inline]
    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    /// Total length of the frame in bytes, including sync word
    #[inline]
    pub fn len(&self) -> usize {
        2 + self.captured.len()
    }

    /// Always false, since a frame includes at least its sync word
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the frame's bytes exactly as they were read
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.header.sync.to_bytes());
        bytes.extend_from_slice(&self.captured);
        bytes
    }

    /// Writes the frame's bytes exactly as they were read
    ///
    /// # Errors
    ///
    /// Passes along any I/O error.
    pub fn write_to<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(&self.header.sync.to_bytes())?;
        w.write_all(&self.captured)
    }
}

#[test]
fn test_block_size_codes() {
    assert_eq!(BlockSize::from_code(0), BlockSize::Resolved(0));
    assert_eq!(BlockSize::from_code(1), BlockSize::Resolved(192));
    assert_eq!(BlockSize::from_code(2), BlockSize::Resolved(576));
    assert_eq!(BlockSize::from_code(3), BlockSize::Resolved(1152));
    assert_eq!(BlockSize::from_code(5), BlockSize::Resolved(4608));
    assert_eq!(BlockSize::from_code(6), BlockSize::Pending8);
    assert_eq!(BlockSize::from_code(7), BlockSize::Pending16);
    assert_eq!(BlockSize::from_code(8), BlockSize::Resolved(256));
    assert_eq!(BlockSize::from_code(12), BlockSize::Resolved(4096));
    assert_eq!(BlockSize::from_code(15), BlockSize::Resolved(32768));
}

#[test]
fn test_deferred_extensions() {
    let data: &[u8] = &[0x00, 0xFF, 0xFF, 0x11, 0x22, 0x60, 0xAC, 0x44];
    let mut r = BitCursor::new(data);

    assert_eq!(BlockSize::Pending8.finalize(&mut r).unwrap(), 1);
    assert_eq!(BlockSize::Pending16.finalize(&mut r).unwrap(), 65536);
    assert_eq!(BlockSize::Resolved(4096).finalize(&mut r).unwrap(), 4096);
    assert_eq!(SampleRate::Pending8Hz.finalize(&mut r).unwrap(), 0x11);
    assert_eq!(SampleRate::PendingTensHz.finalize(&mut r).unwrap(), 88_000);
    assert_eq!(SampleRate::Resolved(8000).finalize(&mut r).unwrap(), 8000);
    assert_eq!(SampleRate::Pending16Hz.finalize(&mut r).unwrap(), 44100);
    assert!(r.read(1).is_err());
}

#[test]
fn test_sample_rate_codes() {
    let streaminfo = Streaminfo::new(12345, 16, 2);

    assert_eq!(
        SampleRate::from_code(0, &streaminfo),
        SampleRate::Resolved(12345)
    );
    assert_eq!(
        SampleRate::from_code(4, &streaminfo),
        SampleRate::Resolved(8000)
    );
    assert_eq!(
        SampleRate::from_code(9, &streaminfo),
        SampleRate::Resolved(44100)
    );
    assert_eq!(
        SampleRate::from_code(11, &streaminfo),
        SampleRate::Resolved(96000)
    );
    assert_eq!(SampleRate::from_code(12, &streaminfo), SampleRate::Pending8Hz);
    assert_eq!(SampleRate::from_code(13, &streaminfo), SampleRate::Pending16Hz);
    assert_eq!(
        SampleRate::from_code(14, &streaminfo),
        SampleRate::PendingTensHz
    );
    assert_eq!(
        SampleRate::from_code(15, &streaminfo),
        SampleRate::Resolved(0)
    );
}

#[test]
fn test_channel_assignment() {
    for code in 0..16 {
        let assignment = ChannelAssignment::from_code(code);
        assert_eq!(assignment.code(), code);
        match code {
            0..=7 => assert_eq!(assignment.count(), code + 1),
            8..=10 => assert_eq!(assignment.count(), 2),
            _ => assert_eq!(assignment.count(), 0),
        }
        // the side channel is always one of the assignment's channels
        if let Some(side) = assignment.side_channel() {
            assert!(side < assignment.count());
        }
    }

    assert_eq!(ChannelAssignment::from_code(8).side_channel(), Some(1));
    assert_eq!(ChannelAssignment::from_code(9).side_channel(), Some(0));
    assert_eq!(ChannelAssignment::from_code(10).side_channel(), Some(1));
    assert_eq!(ChannelAssignment::from_code(1).side_channel(), None);
}

#[test]
fn test_coded_numbers() {
    fn read(bytes: &[u8], variable: bool) -> Result<CodedNumber, Error> {
        CodedNumber::read(&mut BitCursor::new(bytes), variable)
    }

    assert!(matches!(read(&[0x24], false), Ok(CodedNumber::FrameNumber(0x24))));
    assert!(matches!(
        read(&[0xC2, 0xA2], false),
        Ok(CodedNumber::FrameNumber(0xA2))
    ));
    assert!(matches!(
        read(&[0xE2, 0x82, 0xAC], true),
        Ok(CodedNumber::SampleNumber(0x20AC))
    ));
    assert!(matches!(
        read(&[0xF0, 0x90, 0x8D, 0x88], false),
        Ok(CodedNumber::FrameNumber(0x010348))
    ));
    // largest 36-bit sample number
    assert!(matches!(
        read(&[0xFE, 0xBF, 0xBF, 0xBF, 0xBF, 0xBF, 0xBF], true),
        Ok(CodedNumber::SampleNumber(0xF_FFFF_FFFF))
    ));
    // frame numbers may take all 36 bits as well
    assert!(matches!(
        read(&[0xFE, 0xBF, 0xBF, 0xBF, 0xBF, 0xBF, 0xBF], false),
        Ok(CodedNumber::FrameNumber(0xF_FFFF_FFFF))
    ));
    // invalid continuation byte
    assert!(matches!(
        read(&[0xC2, 0x00], false),
        Err(Error::InvalidCodedNumber)
    ));
    // a continuation byte can't come first
    assert!(matches!(read(&[0x80], false), Err(Error::InvalidCodedNumber)));
    assert!(matches!(
        read(&[0xFF, 0x00], false),
        Err(Error::InvalidCodedNumber)
    ));
}

#[test]
fn test_frame_header() {
    let streaminfo = Streaminfo::new(44100, 16, 2);

    // variable block size, 16-bit block size extension,
    // 16-bit Hz sample rate extension, mid-side, 24 bps
    let data: &[u8] = &[0x7D, 0xAC, 0xE2, 0x82, 0xAC, 0x0F, 0xFF, 0x5D, 0xC0, 0x99];
    let mut r = BitCursor::new(data);
    let header = FrameHeader::read(&mut r, SyncWord::VARIABLE, &streaminfo).unwrap();
    assert_eq!(
        header,
        FrameHeader {
            sync: SyncWord::VARIABLE,
            coded_number: CodedNumber::SampleNumber(0x20AC),
            block_size: 4096,
            sample_rate: 24000,
            channel_assignment: ChannelAssignment::MidSide,
            bits_per_sample: 24,
            crc8: 0x99,
        }
    );
    assert!(r.byte_aligned());

    // reserved codes become 0 without an error
    let data: &[u8] = &[0x0F, 0xB6, 0x00, 0x00];
    let mut r = BitCursor::new(data);
    let header = FrameHeader::read(&mut r, SyncWord::FIXED, &streaminfo).unwrap();
    assert_eq!(header.block_size, 0);
    assert_eq!(header.sample_rate, 0);
    assert_eq!(header.channel_assignment, ChannelAssignment::Reserved(0b1011));
    assert_eq!(header.channel_assignment.count(), 0);
    assert_eq!(header.bits_per_sample, 0);
    assert_eq!(header.coded_number, CodedNumber::FrameNumber(0));

    // fixed block size with a 36-bit frame number,
    // and an 8-bit sample rate taken as-is in Hz
    let data: &[u8] = &[
        0x1C, 0x08, 0xFE, 0xBF, 0xBF, 0xBF, 0xBF, 0xBF, 0xBF, 0x2C, 0x77,
    ];
    let mut r = BitCursor::new(data);
    let header = FrameHeader::read(&mut r, SyncWord::FIXED, &streaminfo).unwrap();
    assert_eq!(header.coded_number, CodedNumber::FrameNumber(0xF_FFFF_FFFF));
    assert_eq!(header.block_size, 192);
    assert_eq!(header.sample_rate, 44);
    assert_eq!(header.channel_assignment, ChannelAssignment::Independent(1));
    assert_eq!(header.bits_per_sample, 16);
    assert_eq!(header.crc8, 0x77);
    assert!(r.byte_aligned());
}
