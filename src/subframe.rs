// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling a FLAC frame's subframes

use crate::Error;
use crate::cursor::BitCursor;
use crate::decode::DecodeOptions;
use crate::residual::Residual;
use crate::stream::FrameHeader;
use arrayvec::ArrayVec;
use std::io;

/// The largest predictor order of any subframe
pub const MAX_ORDER: usize = 32;

/// A FLAC subframe header
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 1    | padding | unused |
/// | 6    | `type_code` | subframe type and order |
/// | 1    | has wasted bits | |
/// | (0+) | `wasted_bits` | unary-coded wasted bits - 1 |
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SubframeHeader {
    /// The 6-bit type code
    pub type_code: u8,
    /// Number of wasted bits-per-sample
    pub wasted_bits: u32,
}

impl SubframeHeader {
    /// Reads subframe header
    ///
    /// The padding bit is not checked.
    ///
    /// # Errors
    ///
    /// Passes along any I/O error.
    pub fn read<R: io::Read>(r: &mut BitCursor<R>) -> io::Result<Self> {
        r.skip(1)?;
        let type_code = r.read(6)? as u8;
        let wasted_bits = match r.read_bit()? {
            true => r.bits_to_next_one()? + 1,
            false => 0,
        };
        Ok(Self {
            type_code,
            wasted_bits,
        })
    }
}

/// A FLAC subframe, minus any reconstructed samples
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Subframe {
    /// The subframe's channel index in its frame
    pub channel: u8,
    /// Bits-per-sample before wasted bits are removed
    ///
    /// This is one more than the frame's bits-per-sample
    /// for the side channel of stereo decorrelated frames.
    pub sample_width: u32,
    /// Number of wasted bits-per-sample
    pub wasted_bits: u32,
    /// What type of subframe this is
    pub kind: SubframeKind,
}

/// The contents of a subframe
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SubframeKind {
    /// All samples are the same value
    Constant {
        /// The single sample
        sample: i64,
    },
    /// All samples stored as-is
    Verbatim {
        /// Number of samples stored
        samples: u32,
    },
    /// Samples predicted by one of the fixed predictors
    Fixed {
        /// Predictor order
        order: u8,
        /// Initial samples, stored as-is
        warm_up: ArrayVec<i64, MAX_ORDER>,
        /// Prediction residuals
        residual: Residual,
    },
    /// Samples predicted by linear predictive coding
    Lpc {
        /// Predictor order
        order: u8,
        /// Initial samples, stored as-is
        warm_up: ArrayVec<i64, MAX_ORDER>,
        /// Bits-per-coefficient
        precision: u32,
        /// Quantization level, in bits
        shift: i32,
        /// Predictor coefficients
        coefficients: ArrayVec<i32, MAX_ORDER>,
        /// Prediction residuals
        residual: Residual,
    },
    /// A reserved subframe type
    ///
    /// Since its size can't be known,
    /// nothing past its header is read.
    Reserved {
        /// The reserved type code
        type_code: u8,
    },
}

impl SubframeKind {
    /// The name of the subframe type
    pub fn subframe_type(&self) -> &'static str {
        match self {
            Self::Constant { .. } => "CONSTANT",
            Self::Verbatim { .. } => "VERBATIM",
            Self::Fixed { .. } => "FIXED",
            Self::Lpc { .. } => "LPC",
            Self::Reserved { .. } => "RESERVED",
        }
    }

    /// The subframe's residuals, if it has any
    pub fn residual(&self) -> Option<&Residual> {
        match self {
            Self::Fixed { residual, .. } | Self::Lpc { residual, .. } => Some(residual),
            Self::Constant { .. } | Self::Verbatim { .. } | Self::Reserved { .. } => None,
        }
    }
}

impl Subframe {
    /// Reads subframe for the given channel of the given frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSubframe`] if the stream
    /// ends within the subframe header,
    /// [`Error::InvalidSubframeType`] for a type code
    /// outside of 6 bits, or any error reading residuals.
    ///
    /// Wasted bits beyond the sample width are not an error;
    /// samples are then 0 bits wide.
    pub fn read<R: io::Read>(
        r: &mut BitCursor<R>,
        frame: &FrameHeader,
        channel: u8,
        options: &DecodeOptions,
    ) -> Result<Self, Error> {
        let header = match SubframeHeader::read(r) {
            Ok(header) => header,
            Err(_) if r.is_eof() => return Err(Error::MalformedSubframe(channel)),
            Err(err) => return Err(err.into()),
        };

        let sample_width = frame.bits_per_sample
            + u32::from(frame.channel_assignment.side_channel() == Some(channel));

        // excess wasted bits leave 0-bit samples, which read nothing
        let bits = sample_width.saturating_sub(header.wasted_bits);

        let kind = match header.type_code {
            0b000000 => SubframeKind::Constant {
                sample: r.read_signed(bits)?,
            },
            0b000001 => {
                r.skip(frame.block_size * bits)?;
                SubframeKind::Verbatim {
                    samples: frame.block_size,
                }
            }
            type_code @ (0b000010..=0b000111 | 0b010000..=0b011111) => {
                log::warn!("channel {channel} has reserved subframe type {type_code}");
                SubframeKind::Reserved { type_code }
            }
            type_code @ 0b001000..=0b001111 => {
                let order = type_code & 0b111;
                SubframeKind::Fixed {
                    order,
                    warm_up: read_warm_up(r, order, bits)?,
                    residual: Residual::read(r, frame.block_size, order, options)?,
                }
            }
            type_code @ 0b100000..=0b111111 => {
                let order = (type_code & 0b11111) + 1;
                let warm_up = read_warm_up(r, order, bits)?;
                let precision = r.read(4)? + 1;
                let shift = r.read_signed(5)? as i32;
                let coefficients = (0..order)
                    .map(|_| r.read_signed(precision).map(|c| c as i32))
                    .collect::<io::Result<ArrayVec<_, MAX_ORDER>>>()?;
                SubframeKind::Lpc {
                    order,
                    warm_up,
                    precision,
                    shift,
                    coefficients,
                    residual: Residual::read(r, frame.block_size, order, options)?,
                }
            }
            type_code => return Err(Error::InvalidSubframeType(type_code)),
        };

        log::trace!(
            "channel {channel} : {} subframe, {sample_width} bps, {} wasted",
            kind.subframe_type(),
            header.wasted_bits
        );

        Ok(Self {
            channel,
            sample_width,
            wasted_bits: header.wasted_bits,
            kind,
        })
    }
}

fn read_warm_up<R: io::Read>(
    r: &mut BitCursor<R>,
    order: u8,
    bits: u32,
) -> io::Result<ArrayVec<i64, MAX_ORDER>> {
    (0..order).map(|_| r.read_signed(bits)).collect()
}

#[cfg(test)]
fn test_header(
    channel_assignment: crate::stream::ChannelAssignment,
    block_size: u32,
    bits_per_sample: u32,
) -> FrameHeader {
    use crate::stream::CodedNumber;
    use crate::sync::SyncWord;

    FrameHeader {
        sync: SyncWord::FIXED,
        coded_number: CodedNumber::FrameNumber(0),
        block_size,
        sample_rate: 44100,
        channel_assignment,
        bits_per_sample,
        crc8: 0,
    }
}

#[test]
fn test_side_channel_width() {
    use crate::stream::ChannelAssignment;

    // a 17-bit CONSTANT subframe followed by a 16-bit one
    let data: &[u8] = &[0x00, 0x00, 0x01, 0x80, 0x00, 0x02, 0x00];
    let header = test_header(ChannelAssignment::from_code(0b1001), 192, 16);
    let options = DecodeOptions::default();
    let mut r = BitCursor::new(data);

    let side = Subframe::read(&mut r, &header, 0, &options).unwrap();
    assert_eq!(side.sample_width, 17);
    assert_eq!(side.kind, SubframeKind::Constant { sample: 3 });

    let right = Subframe::read(&mut r, &header, 1, &options).unwrap();
    assert_eq!(right.sample_width, 16);
    assert_eq!(right.kind, SubframeKind::Constant { sample: 4 });

    // the same bits read as independent channels land elsewhere
    let header = test_header(ChannelAssignment::Independent(2), 192, 16);
    let mut r = BitCursor::new(data);
    let first = Subframe::read(&mut r, &header, 0, &options).unwrap();
    assert_eq!(first.sample_width, 16);
    assert_eq!(first.kind, SubframeKind::Constant { sample: 1 });
}

#[test]
fn test_wasted_bits() {
    use crate::stream::ChannelAssignment;

    // CONSTANT with 3 wasted bits, leaving a 5-bit sample of -1
    let data: &[u8] = &[0b0_000000_1, 0b001_11111];
    let header = test_header(ChannelAssignment::Independent(1), 16, 8);
    let mut r = BitCursor::new(data);
    let subframe = Subframe::read(&mut r, &header, 0, &DecodeOptions::default()).unwrap();
    assert_eq!(subframe.wasted_bits, 3);
    assert_eq!(subframe.sample_width, 8);
    assert_eq!(subframe.kind, SubframeKind::Constant { sample: -1 });
    assert!(r.byte_aligned());

    // more wasted bits than bits-per-sample leave 0-bit samples
    let data: &[u8] = &[0b0_000000_1, 0b0000_0001, 0xAA];
    let header = test_header(ChannelAssignment::Independent(1), 16, 4);
    let mut r = BitCursor::new(data);
    let subframe = Subframe::read(&mut r, &header, 0, &DecodeOptions::default()).unwrap();
    assert_eq!(subframe.wasted_bits, 8);
    assert_eq!(subframe.kind, SubframeKind::Constant { sample: 0 });
    assert_eq!(r.read(8).unwrap(), 0xAA);

    // a reserved bits-per-sample with wasted bits reads nothing
    let data: &[u8] = &[0b0_000001_1, 0b1_0101010];
    let header = test_header(ChannelAssignment::Independent(1), 16, 0);
    let mut r = BitCursor::new(data);
    let subframe = Subframe::read(&mut r, &header, 0, &DecodeOptions::default()).unwrap();
    assert_eq!(subframe.sample_width, 0);
    assert_eq!(subframe.wasted_bits, 1);
    assert_eq!(subframe.kind, SubframeKind::Verbatim { samples: 16 });
    assert_eq!(r.read(7).unwrap(), 0b0101010);
}

#[test]
fn test_subframe_eof() {
    use crate::stream::ChannelAssignment;

    let header = test_header(ChannelAssignment::Independent(2), 192, 16);
    let data: &[u8] = &[];
    assert!(matches!(
        Subframe::read(
            &mut BitCursor::new(data),
            &header,
            1,
            &DecodeOptions::default()
        ),
        Err(Error::MalformedSubframe(1))
    ));

    // wasted bits run off the end of the stream
    let data: &[u8] = &[0b0_000000_1];
    assert!(matches!(
        Subframe::read(
            &mut BitCursor::new(data),
            &header,
            0,
            &DecodeOptions::default()
        ),
        Err(Error::MalformedSubframe(0))
    ));

    // once the header is read, running out is an I/O error
    let data: &[u8] = &[0b0_000000_0, 0x12];
    assert!(matches!(
        Subframe::read(
            &mut BitCursor::new(data),
            &header,
            0,
            &DecodeOptions::default()
        ),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_subframe_types() {
    use crate::stream::ChannelAssignment;

    let header = test_header(ChannelAssignment::Independent(1), 4, 8);
    let options = DecodeOptions::default();

    // VERBATIM consumes block size samples
    let data: &[u8] = &[0b0_000001_0, 1, 2, 3, 4, 0xAA];
    let mut r = BitCursor::new(data);
    let subframe = Subframe::read(&mut r, &header, 0, &options).unwrap();
    assert_eq!(subframe.kind, SubframeKind::Verbatim { samples: 4 });
    assert_eq!(r.read(8).unwrap(), 0xAA);

    // reserved types consume nothing past the header
    for type_code in (0b000010..=0b000111).chain(0b010000..=0b011111) {
        let data: &[u8] = &[type_code << 1, 0xAA];
        let mut r = BitCursor::new(data);
        let subframe = Subframe::read(&mut r, &header, 0, &options).unwrap();
        assert_eq!(subframe.kind, SubframeKind::Reserved { type_code });
        assert_eq!(subframe.kind.subframe_type(), "RESERVED");
        assert_eq!(r.read(8).unwrap(), 0xAA);
    }

    // FIXED, order 2: 2 warm-up samples, then a
    // Rice residual with partition order 0 and parameter 0
    // whose single partition holds all 4 codes
    let data: &[u8] = &[
        0b0_001010_0,
        0xFF,
        0x01,
        0b00_0000_00,
        0b00_1_01_1_1_0,
    ];
    let mut r = BitCursor::new(data);
    let subframe = Subframe::read(&mut r, &header, 0, &options).unwrap();
    match &subframe.kind {
        SubframeKind::Fixed {
            order,
            warm_up,
            residual,
        } => {
            assert_eq!(*order, 2);
            assert_eq!(warm_up.as_slice(), &[-1, 1]);
            assert_eq!(residual.partition_order, 0);
            assert_eq!(
                residual.partitions,
                vec![crate::residual::Partition::Rice {
                    parameter: 0,
                    samples: 4
                }]
            );
        }
        other => panic!("unexpected subframe {other:?}"),
    }
    assert!(subframe.kind.residual().is_some());

    // LPC, order 1: 1 warm-up sample, 4-bit precision,
    // 5-bit shift, 1 coefficient, then an escaped residual
    // partition of 3 samples at 2 bits each
    let data: &[u8] = &[
        0b0_100000_0,
        0x7F,
        0b0011_0001,
        0b0110_1000,
        0b0001_1110,
        0b0010_0110,
        0b1100_0000,
    ];
    let mut r = BitCursor::new(data);
    let subframe = Subframe::read(&mut r, &header, 0, &options).unwrap();
    assert_eq!(
        subframe.kind,
        SubframeKind::Lpc {
            order: 1,
            warm_up: [0x7F].into_iter().collect(),
            precision: 4,
            shift: 2,
            coefficients: [-3].into_iter().collect(),
            residual: Residual {
                method: crate::residual::CodingMethod::Rice,
                partition_order: 0,
                partitions: vec![crate::residual::Partition::Escaped {
                    bits: 2,
                    samples: 3
                }],
            },
        }
    );
    r.read_to_byte_boundary();
    assert!(r.read(1).is_err());
}
