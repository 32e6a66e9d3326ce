// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A bit-exact structural parser for FLAC frames
//!
//! This crate walks FLAC frames field by field,
//! decoding frame headers, subframe headers and
//! residual coding parameters without reconstructing
//! any PCM samples.
//! Every byte consumed by a frame is captured along the way,
//! so frames can be re-emitted verbatim without an encoder.
//!
//! For native FLAC files, [`decode::FrameReader`] reads
//! the metadata blocks and then each frame in turn.
//! For frames delivered one per packet (as in Ogg FLAC),
//! use [`decode::read_packet`].
//!
//! # Example
//! ```
//! use flac_frames::{decode::read_packet, metadata::Streaminfo};
//! use flac_frames::subframe::SubframeKind;
//!
//! let streaminfo = Streaminfo::new(44100, 16, 2);
//!
//! let frame_bytes: &[u8] = &[
//!     0xFF, 0xF8,             // sync word, fixed block size
//!     0x10,                   // 192 samples, STREAMINFO sample rate
//!     0x10,                   // 2 independent channels, STREAMINFO bits-per-sample
//!     0x00,                   // frame number 0
//!     0x4E,                   // header CRC-8
//!     0x00, 0x12, 0x34,       // CONSTANT subframe
//!     0x00, 0x00, 0x42,       // CONSTANT subframe
//!     0xC0, 0xDE,             // footer CRC-16
//! ];
//!
//! let frame = read_packet(frame_bytes, &streaminfo, &Default::default()).unwrap();
//! assert_eq!(frame.header.block_size, 192);
//! assert_eq!(frame.header.sample_rate, 44100);
//! assert_eq!(frame.subframes.len(), 2);
//! assert!(matches!(frame.subframes[0].kind, SubframeKind::Constant { sample: 0x1234 }));
//! assert_eq!(frame.to_bytes(), frame_bytes);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod capture;
pub mod cursor;
pub mod decode;
pub mod metadata;
pub mod residual;
pub mod stream;
pub mod subframe;
pub mod sync;

/// A FLAC parsing error
#[derive(Debug)]
pub enum Error {
    /// A general I/O error from the underlying stream
    Io(std::io::Error),
    /// A missing `fLaC` tag at the start of the stream
    MissingFlacTag,
    /// A STREAMINFO block not first in the stream
    MissingStreaminfo,
    /// More than one STREAMINFO block in the stream
    MultipleStreaminfo,
    /// A metadata block's contents don't match its size
    InvalidMetadataBlockSize,
    /// Bytes expected to be a frame sync word were not
    SyncNotFound,
    /// A frame or sample number with an invalid encoding
    InvalidCodedNumber,
    /// The stream ended ahead of the given channel's subframe
    MalformedSubframe(u8),
    /// A subframe type code outside the 6-bit range
    InvalidSubframeType(u8),
    /// A residual coding method other than the two Rice methods
    UnsupportedResidualCoding(u8),
    /// A partition order too large for the block size and predictor order
    InvalidPartitionOrder,
}

impl Error {
    /// The parsing stage which raised the error
    ///
    /// # Example
    /// ```
    /// use flac_frames::Error;
    ///
    /// assert_eq!(Error::MalformedSubframe(1).stage(), "subframe");
    /// assert_eq!(Error::InvalidPartitionOrder.stage(), "residual");
    /// ```
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Io(_) => "I/O",
            Self::MissingFlacTag
            | Self::MissingStreaminfo
            | Self::MultipleStreaminfo
            | Self::InvalidMetadataBlockSize => "metadata",
            Self::SyncNotFound => "sync",
            Self::InvalidCodedNumber => "frame header",
            Self::MalformedSubframe(_) | Self::InvalidSubframeType(_) => "subframe",
            Self::UnsupportedResidualCoding(_) | Self::InvalidPartitionOrder => "residual",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::MissingFlacTag => "missing FLAC tag".fmt(f),
            Self::MissingStreaminfo => "STREAMINFO block not first in file".fmt(f),
            Self::MultipleStreaminfo => "multiple STREAMINFO blocks found in file".fmt(f),
            Self::InvalidMetadataBlockSize => "invalid metadata block size".fmt(f),
            Self::SyncNotFound => "frame sync code not found".fmt(f),
            Self::InvalidCodedNumber => "invalid frame or sample number".fmt(f),
            Self::MalformedSubframe(channel) => {
                write!(f, "stream ended before subframe of channel {channel}")
            }
            Self::InvalidSubframeType(code) => write!(f, "invalid subframe type {code}"),
            Self::UnsupportedResidualCoding(method) => {
                write!(f, "unsupported residual coding method {method}")
            }
            Self::InvalidPartitionOrder => "residual partition order too large".fmt(f),
        }
    }
}

#[test]
fn test_error_display() {
    assert_eq!(Error::MissingFlacTag.to_string(), "missing FLAC tag");
    assert_eq!(
        Error::MalformedSubframe(1).to_string(),
        "stream ended before subframe of channel 1"
    );
    assert_eq!(
        Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)).to_string(),
        std::io::Error::from(std::io::ErrorKind::UnexpectedEof).to_string()
    );
    assert_eq!(crate::residual::CodingMethod::Rice2.to_string(), "RICE2");
    assert_eq!(
        crate::stream::ChannelAssignment::SideRight.to_string(),
        "SIDE_RIGHT"
    );
    assert_eq!(crate::stream::CodedNumber::FrameNumber(7).to_string(), "7");
}
