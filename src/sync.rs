// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For locating the start of FLAC frames

use crate::Error;

/// The 14-bit frame sync code
pub const SYNC_CODE: u16 = 0b11111111111110;

/// Whether the two bytes begin a FLAC frame
///
/// This is true whenever the top 14 bits of the
/// big-endian pair match [`SYNC_CODE`].
///
/// # Example
/// ```
/// use flac_frames::sync::is_sync;
///
/// assert!(is_sync(0xFF, 0xF8));
/// assert!(is_sync(0xFF, 0xF9));
/// assert!(!is_sync(0xFF, 0xF7));
/// assert!(!is_sync(0xFF, 0xFC));
/// ```
#[inline]
pub fn is_sync(b1: u8, b2: u8) -> bool {
    u16::from_be_bytes([b1, b2]) >> 2 == SYNC_CODE
}

/// A verified 2-byte frame sync word
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 14   | sync  | `0b11111111111110` |
/// | 1    | reserved | should be 0 |
/// | 1    | blocking strategy | 1 if variable block size |
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SyncWord([u8; 2]);

impl SyncWord {
    /// Sync word for fixed block size frames
    pub const FIXED: Self = Self([0xFF, 0xF8]);

    /// Sync word for variable block size frames
    pub const VARIABLE: Self = Self([0xFF, 0xF9]);

    /// Returns sync word if the bytes match the sync code
    #[inline]
    pub fn new(b1: u8, b2: u8) -> Option<Self> {
        is_sync(b1, b2).then_some(Self([b1, b2]))
    }

    /// Whether the frame's coded number is a sample number
    /// rather than a frame number
    #[inline]
    pub fn variable_blocksize(&self) -> bool {
        self.0[1] & 1 != 0
    }

    /// Returns the sync word as it appears in the stream
    #[inline]
    pub fn to_bytes(self) -> [u8; 2] {
        self.0
    }
}

/// The result of a successful sync scan
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SyncScan {
    /// The sync word found
    pub sync: SyncWord,
    /// Number of bytes discarded ahead of the sync word
    pub skipped: u64,
}

/// Scans forward a byte at a time until a sync word is found
///
/// Returns `None` if the stream ends first.
/// Nothing past the sync word itself is read.
///
/// A match is only a candidate;
/// the same bit pattern may occur inside frame data.
///
/// # Errors
///
/// Passes along any I/O error from the underlying stream.
///
/// # Example
/// ```
/// use flac_frames::sync::{SyncWord, scan_sync};
///
/// let data: &[u8] = &[0x00, 0xFF, 0xFF, 0xF9, 0x12];
/// let mut r = data;
/// let scan = scan_sync(&mut r).unwrap().unwrap();
/// assert_eq!(scan.sync, SyncWord::VARIABLE);
/// assert_eq!(scan.skipped, 2);
/// assert_eq!(r, &[0x12]);
/// ```
pub fn scan_sync<R: std::io::Read>(reader: R) -> std::io::Result<Option<SyncScan>> {
    use std::io::Read;

    let mut bytes = reader.bytes();

    let mut prev = match bytes.next().transpose()? {
        Some(byte) => byte,
        None => return Ok(None),
    };
    let mut skipped = 0;

    while let Some(byte) = bytes.next().transpose()? {
        if let Some(sync) = SyncWord::new(prev, byte) {
            if skipped > 0 {
                log::debug!("skipped {skipped} bytes ahead of frame sync");
            }
            return Ok(Some(SyncScan { sync, skipped }));
        }
        prev = byte;
        skipped += 1;
    }

    if skipped > 0 {
        log::debug!("discarded {} trailing bytes with no frame sync", skipped + 1);
    }
    Ok(None)
}

/// Reads the next two bytes as a sync word
///
/// Returns `None` if the stream is already at its end.
///
/// # Errors
///
/// Returns [`Error::SyncNotFound`] if the bytes
/// are not a sync word, or any I/O error
/// from the underlying stream.
pub fn read_sync<R: std::io::Read>(mut reader: R) -> Result<Option<SyncWord>, Error> {
    let mut b1 = [0; 1];
    match reader.read(&mut b1)? {
        0 => Ok(None),
        _ => {
            let mut b2 = [0; 1];
            reader.read_exact(&mut b2)?;
            SyncWord::new(b1[0], b2[0])
                .map(Some)
                .ok_or(Error::SyncNotFound)
        }
    }
}

#[test]
fn test_is_sync_exhaustive() {
    for word in 0..=u16::MAX {
        let [b1, b2] = word.to_be_bytes();
        assert_eq!(is_sync(b1, b2), (word >> 2) == 0x3FFE);
    }

    // boundaries just above and below the pattern
    assert!(!is_sync(0xFF, 0xF7));
    assert!(is_sync(0xFF, 0xF8));
    assert!(is_sync(0xFF, 0xFB));
    assert!(!is_sync(0xFF, 0xFC));
    assert!(!is_sync(0xFE, 0xF8));
}

#[test]
fn test_sync_word() {
    assert_eq!(SyncWord::new(0xFF, 0xF8), Some(SyncWord::FIXED));
    assert_eq!(SyncWord::new(0xFF, 0xF9), Some(SyncWord::VARIABLE));
    assert_eq!(SyncWord::new(0xFF, 0x00), None);
    assert!(!SyncWord::FIXED.variable_blocksize());
    assert!(SyncWord::VARIABLE.variable_blocksize());
    assert_eq!(SyncWord::VARIABLE.to_bytes(), [0xFF, 0xF9]);
}

#[test]
fn test_scan_sync() {
    // no sync at all
    let data: &[u8] = &[0x00, 0xFF, 0x12, 0xFF];
    assert_eq!(scan_sync(data).unwrap(), None);

    // empty and single-byte streams
    assert_eq!(scan_sync(&[0u8; 0][..]).unwrap(), None);
    assert_eq!(scan_sync(&[0xFFu8][..]).unwrap(), None);

    // sync right at the start
    let mut data: &[u8] = &[0xFF, 0xF8, 0x69];
    assert_eq!(
        scan_sync(&mut data).unwrap(),
        Some(SyncScan {
            sync: SyncWord::FIXED,
            skipped: 0
        })
    );
    assert_eq!(data, &[0x69]);

    // a run of 0xFF bytes ahead of the real sync byte
    let mut data: &[u8] = &[0xFF, 0xFF, 0xFF, 0xF8];
    assert_eq!(
        scan_sync(&mut data).unwrap(),
        Some(SyncScan {
            sync: SyncWord::FIXED,
            skipped: 2
        })
    );
    assert!(data.is_empty());
}

#[test]
fn test_read_sync() {
    assert!(matches!(read_sync(&[0u8; 0][..]), Ok(None)));
    assert!(matches!(
        read_sync(&[0xFFu8, 0xF9][..]),
        Ok(Some(SyncWord::VARIABLE))
    ));
    assert!(matches!(
        read_sync(&[0x00u8, 0xFF, 0xF8][..]),
        Err(Error::SyncNotFound)
    ));
    assert!(matches!(read_sync(&[0xFFu8][..]), Err(Error::Io(_))));
}
