// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling the residuals of predicted subframes

use crate::Error;
use crate::cursor::BitCursor;
use crate::decode::DecodeOptions;
use std::io;

/// How a subframe's residuals are coded
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CodingMethod {
    /// Partitioned Rice coding with 4-bit parameters
    Rice,
    /// Partitioned Rice coding with 5-bit parameters
    Rice2,
}

impl CodingMethod {
    /// Returns coding method from its 2-bit code
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedResidualCoding`]
    /// for the two reserved codes.
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(Self::Rice),
            1 => Ok(Self::Rice2),
            code => Err(Error::UnsupportedResidualCoding(code)),
        }
    }

    /// Size of each partition's Rice parameter, in bits
    #[inline]
    pub fn parameter_bits(self) -> u32 {
        match self {
            Self::Rice => 4,
            Self::Rice2 => 5,
        }
    }

    /// The parameter value indicating an escaped partition
    #[inline]
    pub fn escape_code(self) -> u32 {
        match self {
            Self::Rice => 0b1111,
            Self::Rice2 => 0b11111,
        }
    }
}

impl std::fmt::Display for CodingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Rice => "RICE".fmt(f),
            Self::Rice2 => "RICE2".fmt(f),
        }
    }
}

/// A single residual partition
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Partition {
    /// Residuals stored as Rice codes
    Rice {
        /// The partition's Rice parameter
        parameter: u8,
        /// Number of residuals read
        samples: u32,
    },
    /// Residuals stored as fixed-size raw values
    Escaped {
        /// Size of each residual, in bits
        bits: u8,
        /// Number of residuals read
        samples: u32,
    },
}

impl Partition {
    /// The partition's Rice parameter, if not escaped
    pub fn rice_parameter(&self) -> Option<u8> {
        match self {
            Self::Rice { parameter, .. } => Some(*parameter),
            Self::Escaped { .. } => None,
        }
    }

    /// Whether the partition's residuals are stored raw
    pub fn is_escaped(&self) -> bool {
        matches!(self, Self::Escaped { .. })
    }

    /// Size of each raw residual, if escaped
    pub fn escaped_bits(&self) -> Option<u8> {
        match self {
            Self::Escaped { bits, .. } => Some(*bits),
            Self::Rice { .. } => None,
        }
    }

    /// Number of residuals in the partition
    pub fn samples(&self) -> u32 {
        match self {
            Self::Rice { samples, .. } | Self::Escaped { samples, .. } => *samples,
        }
    }
}

/// Returns the number of residuals in the given partition
///
/// The first partition is shortened by the predictor order,
/// since those samples are stored as warm-up samples.
/// Returns `None` if the predictor order exceeds
/// the first partition's size.
///
/// # Example
/// ```
/// use flac_frames::residual::partition_samples;
///
/// assert_eq!(partition_samples(4096, 2, 3, 0), Some(510));
/// assert_eq!(partition_samples(4096, 2, 3, 1), Some(512));
/// assert_eq!(partition_samples(16, 8, 2, 0), None);
/// ```
pub fn partition_samples(
    block_size: u32,
    predictor_order: u8,
    partition_order: u8,
    partition: u32,
) -> Option<u32> {
    let samples = block_size.checked_shr(partition_order.into())?;
    match partition {
        0 => samples.checked_sub(predictor_order.into()),
        _ => Some(samples),
    }
}

/// A subframe's coded residuals
///
/// Residual values themselves are consumed but not kept.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Residual {
    /// The coding method
    pub method: CodingMethod,
    /// The partition order, with 2 ^ order partitions
    pub partition_order: u8,
    /// Each partition in stream order
    pub partitions: Vec<Partition>,
}

impl Residual {
    /// Reads residual block for a subframe of the given
    /// block size and predictor order
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedResidualCoding`] for
    /// reserved coding methods, [`Error::InvalidPartitionOrder`]
    /// if the first partition is smaller than the predictor order,
    /// or any I/O error.
    pub fn read<R: io::Read>(
        r: &mut BitCursor<R>,
        block_size: u32,
        predictor_order: u8,
        options: &DecodeOptions,
    ) -> Result<Self, Error> {
        let method = CodingMethod::from_code(r.read(2)? as u8)?;
        let partition_order = r.read(4)? as u8;

        let partitions = (0..(1 << partition_order))
            .map(|partition| -> Result<Partition, Error> {
                let samples = partition_samples(
                    block_size,
                    predictor_order,
                    partition_order,
                    partition,
                );

                match r.read(method.parameter_bits())? {
                    escape if escape == method.escape_code() => {
                        let samples = samples.ok_or(Error::InvalidPartitionOrder)?;
                        let bits = r.read(5)?;
                        r.skip(samples * bits)?;
                        Ok(Partition::Escaped {
                            bits: bits as u8,
                            samples,
                        })
                    }
                    parameter => {
                        let samples = match partition {
                            0 if options.unadjusted_rice_partitions => {
                                block_size >> partition_order
                            }
                            _ => samples.ok_or(Error::InvalidPartitionOrder)?,
                        };
                        for _ in 0..samples {
                            r.bits_to_next_one()?;
                            r.skip(parameter)?;
                        }
                        Ok(Partition::Rice {
                            parameter: parameter as u8,
                            samples,
                        })
                    }
                }
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            method,
            partition_order,
            partitions,
        })
    }

    /// Total number of residuals across all partitions
    pub fn samples(&self) -> u32 {
        self.partitions.iter().map(|p| p.samples()).sum()
    }
}

#[cfg(test)]
fn residual_bits<F>(build: F) -> Vec<u8>
where
    F: FnOnce(&mut bitstream_io::BitWriter<Vec<u8>, bitstream_io::BigEndian>) -> io::Result<()>,
{
    use bitstream_io::{BigEndian, BitWrite, BitWriter};

    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    build(&mut w).unwrap();
    w.byte_align().unwrap();
    w.into_writer()
}

#[test]
fn test_partition_samples() {
    assert_eq!(partition_samples(4096, 0, 0, 0), Some(4096));
    assert_eq!(partition_samples(4096, 2, 3, 0), Some(510));
    for partition in 1..8 {
        assert_eq!(partition_samples(4096, 2, 3, partition), Some(512));
    }
    assert_eq!(partition_samples(16, 4, 2, 0), Some(0));
    assert_eq!(partition_samples(16, 5, 2, 0), None);
    assert_eq!(partition_samples(16, 5, 2, 1), Some(4));
}

#[test]
fn test_coding_methods() {
    use bitstream_io::BitWrite;

    assert_eq!(CodingMethod::from_code(0).unwrap(), CodingMethod::Rice);
    assert_eq!(CodingMethod::from_code(1).unwrap(), CodingMethod::Rice2);
    assert!(matches!(
        CodingMethod::from_code(2),
        Err(Error::UnsupportedResidualCoding(2))
    ));
    assert!(matches!(
        CodingMethod::from_code(3),
        Err(Error::UnsupportedResidualCoding(3))
    ));

    let data = residual_bits(|w| w.write::<2, u8>(0b10));
    assert!(matches!(
        Residual::read(&mut BitCursor::new(data.as_slice()), 16, 0, &Default::default()),
        Err(Error::UnsupportedResidualCoding(2))
    ));
}

#[test]
fn test_rice_partitions() {
    use bitstream_io::BitWrite;

    // block size 8, order 1, two partitions of 3 and 4 residuals
    let data = residual_bits(|w| {
        w.write::<2, u8>(0)?;
        w.write::<4, u8>(1)?;
        w.write::<4, u8>(2)?;
        for quotient in [0, 3, 1] {
            for _ in 0..quotient {
                w.write_bit(false)?;
            }
            w.write_bit(true)?;
            w.write::<2, u8>(0b10)?;
        }
        w.write::<4, u8>(0)?;
        w.write::<4, u8>(0b1111)?;
        w.write::<8, u8>(0xAA)
    });

    let options = DecodeOptions::default().unadjusted_rice_partitions(false);
    let mut r = BitCursor::new(data.as_slice());
    let residual = Residual::read(&mut r, 8, 1, &options).unwrap();
    assert_eq!(residual.method, CodingMethod::Rice);
    assert_eq!(residual.partition_order, 1);
    assert_eq!(
        residual.partitions,
        vec![
            Partition::Rice {
                parameter: 2,
                samples: 3
            },
            Partition::Rice {
                parameter: 0,
                samples: 4
            },
        ]
    );
    assert_eq!(residual.samples(), 7);
    assert_eq!(residual.partitions[0].rice_parameter(), Some(2));
    assert!(!residual.partitions[1].is_escaped());
    assert_eq!(r.read(8).unwrap(), 0xAA);
}

#[test]
fn test_escaped_partitions() {
    use bitstream_io::BitWrite;

    // Rice2 with a single escaped partition of 4 residuals at 3 bits each
    let data = residual_bits(|w| {
        w.write::<2, u8>(1)?;
        w.write::<4, u8>(0)?;
        w.write::<5, u8>(0b11111)?;
        w.write::<5, u8>(3)?;
        w.write::<12, u16>(0xFFF)?;
        w.write::<8, u8>(0x55)
    });

    let mut r = BitCursor::new(data.as_slice());
    let residual = Residual::read(&mut r, 6, 2, &DecodeOptions::default()).unwrap();
    assert_eq!(residual.method, CodingMethod::Rice2);
    assert_eq!(
        residual.partitions,
        vec![Partition::Escaped {
            bits: 3,
            samples: 4
        }]
    );
    assert_eq!(residual.partitions[0].escaped_bits(), Some(3));
    assert_eq!(residual.partitions[0].rice_parameter(), None);
    assert_eq!(r.read(8).unwrap(), 0x55);

    // an escaped partition of zero-bit residuals consumes nothing
    let data = residual_bits(|w| {
        w.write::<2, u8>(0)?;
        w.write::<4, u8>(0)?;
        w.write::<4, u8>(0b1111)?;
        w.write::<5, u8>(0)?;
        w.write::<8, u8>(0x55)
    });
    let mut r = BitCursor::new(data.as_slice());
    let residual = Residual::read(&mut r, 4096, 4, &DecodeOptions::default()).unwrap();
    assert_eq!(residual.samples(), 4092);
    assert_eq!(r.read(8).unwrap(), 0x55);
}

#[test]
fn test_invalid_partition_order() {
    use bitstream_io::BitWrite;

    // 16 >> 3 leaves 2 samples in the first partition, less than order 4
    let data = residual_bits(|w| {
        w.write::<2, u8>(0)?;
        w.write::<4, u8>(3)?;
        w.write::<4, u8>(1)
    });
    assert!(matches!(
        Residual::read(
            &mut BitCursor::new(data.as_slice()),
            16,
            4,
            &DecodeOptions::default().unadjusted_rice_partitions(false)
        ),
        Err(Error::InvalidPartitionOrder)
    ));

    // escaped partitions are always checked
    let data = residual_bits(|w| {
        w.write::<2, u8>(0)?;
        w.write::<4, u8>(3)?;
        w.write::<4, u8>(0b1111)?;
        w.write::<5, u8>(1)
    });
    assert!(matches!(
        Residual::read(
            &mut BitCursor::new(data.as_slice()),
            16,
            4,
            &DecodeOptions::default()
        ),
        Err(Error::InvalidPartitionOrder)
    ));
}

#[test]
fn test_unadjusted_rice_partitions() {
    use bitstream_io::BitWrite;

    // block size 4, order 1, one Rice partition of parameter 0
    // with 4 unary codes present in the stream
    let data = residual_bits(|w| {
        w.write::<2, u8>(0)?;
        w.write::<4, u8>(0)?;
        w.write::<4, u8>(0)?;
        w.write::<4, u8>(0b1111)
    });

    // by default the unadjusted count reads all 4
    let options = DecodeOptions::default();
    let mut r = BitCursor::new(data.as_slice());
    let residual = Residual::read(&mut r, 4, 1, &options).unwrap();
    assert_eq!(
        residual.partitions,
        vec![Partition::Rice {
            parameter: 0,
            samples: 4
        }]
    );
    assert!(!r.read_bit().unwrap());

    // the adjusted count reads 3 residuals
    let adjusted = DecodeOptions::default().unadjusted_rice_partitions(false);
    let mut r = BitCursor::new(data.as_slice());
    let residual = Residual::read(&mut r, 4, 1, &adjusted).unwrap();
    assert_eq!(residual.samples(), 3);
    assert!(r.read_bit().unwrap());

    // but escaped partitions keep the adjusted count
    let data = residual_bits(|w| {
        w.write::<2, u8>(0)?;
        w.write::<4, u8>(0)?;
        w.write::<4, u8>(0b1111)?;
        w.write::<5, u8>(4)?;
        w.write::<12, u16>(0)?;
        w.write::<4, u8>(0b1010)
    });
    let mut r = BitCursor::new(data.as_slice());
    let residual = Residual::read(&mut r, 4, 1, &options).unwrap();
    assert_eq!(
        residual.partitions,
        vec![Partition::Escaped {
            bits: 4,
            samples: 3
        }]
    );
    assert_eq!(r.read(4).unwrap(), 0b1010);
}
