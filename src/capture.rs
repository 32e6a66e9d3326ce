// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For recording the exact bytes of a frame as it is parsed

/// A reader which keeps a copy of every byte read through it
///
/// # Example
/// ```
/// use flac_frames::capture::CaptureReader;
/// use std::io::Read;
///
/// let data: &[u8] = &[1, 2, 3, 4, 5];
/// let mut r = CaptureReader::new(data);
/// let mut buf = [0; 3];
/// r.read_exact(&mut buf).unwrap();
/// assert_eq!(r.captured(), &[1, 2, 3]);
/// assert_eq!(r.into_inner(), &[4, 5]);
/// ```
pub struct CaptureReader<R> {
    reader: R,
    captured: Vec<u8>,
}

impl<R> CaptureReader<R> {
    /// Wraps reader with an empty capture buffer
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            captured: Vec::new(),
        }
    }

    /// All the bytes read so far
    #[inline]
    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    /// Total number of bytes read so far
    #[inline]
    pub fn len(&self) -> usize {
        self.captured.len()
    }

    /// Whether no bytes have been read yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.captured.is_empty()
    }

    /// Removes and returns everything captured so far,
    /// leaving the capture buffer empty
    pub fn take_captured(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.captured)
    }

    /// Returns the wrapped reader, discarding the capture buffer
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: std::io::Read> std::io::Read for CaptureReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf).inspect(|amt_read| {
            self.captured.extend_from_slice(&buf[0..*amt_read]);
        })
    }
}

#[test]
fn test_capture_partial_reads() {
    use std::io::Read;

    // a reader that only hands out one byte at a time
    struct Trickle<'d>(&'d [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((byte, rest)), Some(out)) => {
                    *out = *byte;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    let mut r = CaptureReader::new(Trickle(&[10, 20, 30, 40]));
    let mut buf = [0; 4];
    r.read_exact(&mut buf[0..3]).unwrap();
    assert_eq!(r.captured(), &[10, 20, 30]);

    // nothing extra is recorded on a short read at EOF
    assert!(r.read_exact(&mut buf).is_err());
    assert_eq!(r.captured(), &[10, 20, 30, 40]);

    assert_eq!(r.take_captured(), vec![10, 20, 30, 40]);
    assert!(r.is_empty());
}

#[test]
fn test_capture_through_cursor() {
    use crate::cursor::BitCursor;
    use std::io::Read;

    let data: &[u8] = &[0xAB, 0xCD, 0xEF];
    let mut capture = CaptureReader::new(data);
    let mut r = BitCursor::new(capture.by_ref());
    assert_eq!(r.read(4).unwrap(), 0xA);
    assert_eq!(r.read(8).unwrap(), 0xBC);
    drop(r);

    // only the bytes actually touched by the cursor are captured
    assert_eq!(capture.captured(), &[0xAB, 0xCD]);
    assert_eq!(capture.into_inner(), &[0xEF]);
}
