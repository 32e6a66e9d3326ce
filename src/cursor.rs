// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A bit cursor over a byte source

use bitstream_io::{BigEndian, BitRead, BitReader};
use std::io;

/// A most-significant-bit-first cursor over some byte source
///
/// Bytes are pulled from the source one at a time,
/// only when the next bit is actually needed,
/// so the cursor never reads ahead of its position.
///
/// Once any read runs off the end of the source,
/// [`BitCursor::is_eof`] reports it for the rest
/// of the cursor's life.
///
/// # Example
/// ```
/// use flac_frames::cursor::BitCursor;
///
/// let data: &[u8] = &[0b1011_0010, 0b0000_0000];
/// let mut r = BitCursor::new(data);
/// assert_eq!(r.read(3).unwrap(), 0b101);
/// assert_eq!(r.bits_to_next_one().unwrap(), 0);
/// assert_eq!(r.bits_to_next_one().unwrap(), 2);
/// assert!(!r.byte_aligned());
/// r.read_to_byte_boundary();
/// assert_eq!(r.read(8).unwrap(), 0);
/// assert!(r.read(1).is_err());
/// assert!(r.is_eof());
/// ```
pub struct BitCursor<R: io::Read> {
    reader: BitReader<R, BigEndian>,
    eof: bool,
}

impl<R: io::Read> BitCursor<R> {
    /// Wraps a byte source in a new cursor
    pub fn new(reader: R) -> Self {
        Self {
            reader: BitReader::endian(reader, BigEndian),
            eof: false,
        }
    }

    #[inline]
    fn track<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(err) = &result {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                self.eof = true;
            }
        }
        result
    }

    /// Reads an unsigned value of up to 32 bits
    ///
    /// Reading 0 bits always returns 0 and consumes nothing.
    pub fn read(&mut self, bits: u32) -> io::Result<u32> {
        match bits {
            0 => Ok(0),
            1..=32 => {
                let result = self.reader.read_unsigned_var(bits);
                self.track(result)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "excessive bits for unsigned read",
            )),
        }
    }

    /// Reads a two's complement signed value of up to 33 bits
    ///
    /// Reading 0 bits always returns 0 and consumes nothing.
    pub fn read_signed(&mut self, bits: u32) -> io::Result<i64> {
        match bits {
            0 => Ok(0),
            1..=33 => {
                let result = self.reader.read_signed_var(bits);
                self.track(result)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "excessive bits for signed read",
            )),
        }
    }

    /// Reads a single bit
    pub fn read_bit(&mut self) -> io::Result<bool> {
        let result = self.reader.read_bit();
        self.track(result)
    }

    /// Consumes 0 bits up to and including the next 1 bit,
    /// returning the number of 0 bits
    pub fn bits_to_next_one(&mut self) -> io::Result<u32> {
        let result = self.reader.read_unary::<1>();
        self.track(result)
    }

    /// Consumes 1 bits up to and including the next 0 bit,
    /// returning the number of 1 bits
    pub fn leading_ones(&mut self) -> io::Result<u32> {
        let result = self.reader.read_unary::<0>();
        self.track(result)
    }

    /// Discards the given number of bits
    pub fn skip(&mut self, bits: u32) -> io::Result<()> {
        match bits {
            0 => Ok(()),
            bits => {
                let result = self.reader.skip(bits);
                self.track(result)
            }
        }
    }

    /// Discards any remaining bits in the current byte
    #[inline]
    pub fn read_to_byte_boundary(&mut self) {
        self.reader.byte_align()
    }

    /// Whether the cursor sits on a byte boundary
    #[inline]
    pub fn byte_aligned(&self) -> bool {
        self.reader.byte_aligned()
    }

    /// Whether any read has run past the end of the source
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Returns the underlying byte source
    ///
    /// Any partially-consumed byte is discarded.
    pub fn into_reader(self) -> R {
        self.reader.into_reader()
    }
}

#[test]
fn test_cursor_reads() {
    let data: &[u8] = &[0b1100_1010, 0b0111_1110, 0b1000_0001];
    let mut r = BitCursor::new(data);

    assert_eq!(r.read(0).unwrap(), 0);
    assert_eq!(r.read(4).unwrap(), 0b1100);
    // crosses into the second byte
    assert_eq!(r.read_signed(6).unwrap(), -23); // 0b101001
    assert_eq!(r.leading_ones().unwrap(), 5);
    assert!(r.byte_aligned());
    assert_eq!(r.bits_to_next_one().unwrap(), 0);
    assert_eq!(r.bits_to_next_one().unwrap(), 6);
    assert!(r.byte_aligned());
    assert!(!r.is_eof());
}

#[test]
fn test_cursor_wide_reads() {
    let data: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0x80, 0x00, 0x00, 0x00, 0x00];
    let mut r = BitCursor::new(data);

    assert_eq!(r.read(32).unwrap(), u32::MAX);
    assert_eq!(r.read_signed(33).unwrap(), -(1 << 32));
    assert!(r.read(33).is_err());
    assert!(!r.is_eof());
}

#[test]
fn test_cursor_eof_is_sticky() {
    let data: &[u8] = &[0b0000_0000];
    let mut r = BitCursor::new(data);

    assert!(!r.is_eof());
    // eight zeros and no terminating one
    assert!(r.bits_to_next_one().is_err());
    assert!(r.is_eof());
    assert!(r.read(0).is_ok());
    assert!(r.is_eof());
}

#[test]
fn test_cursor_skip() {
    let data: &[u8] = &[0x00, 0x00, 0b0000_0101];
    let mut r = BitCursor::new(data);

    r.skip(3).unwrap();
    r.read_to_byte_boundary();
    r.skip(13).unwrap();
    assert_eq!(r.read(3).unwrap(), 0b101);
    assert!(r.skip(1).is_err());
    assert!(r.is_eof());
}
