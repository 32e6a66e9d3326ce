// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For reading FLAC frames from files and packets

use crate::Error;
use crate::capture::CaptureReader;
use crate::metadata::{Streaminfo, read_streaminfo};
use crate::stream::Frame;
use crate::sync::{SyncScan, SyncWord, read_sync, scan_sync};

/// Options for reading FLAC frames
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DecodeOptions {
    pub(crate) resync: bool,
    pub(crate) unadjusted_rice_partitions: bool,
}

impl DecodeOptions {
    /// Whether to skip over junk bytes ahead of each frame
    ///
    /// If false, each frame must begin exactly
    /// where the previous one ended.
    /// The default is true.
    pub fn resync(self, resync: bool) -> Self {
        Self { resync, ..self }
    }

    /// Whether the first Rice partition of each residual
    /// should ignore the predictor order when counting
    /// its residuals
    ///
    /// When true, a non-escaped first partition reads
    /// `block_size >> partition_order` Rice codes,
    /// while escaped partitions always account for the predictor order.
    /// Setting this to false shortens both by the predictor order.
    /// The default is true.
    pub fn unadjusted_rice_partitions(self, unadjusted: bool) -> Self {
        Self {
            unadjusted_rice_partitions: unadjusted,
            ..self
        }
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            resync: true,
            unadjusted_rice_partitions: true,
        }
    }
}

/// A reader of frames from a native FLAC file
///
/// Iterating over the reader yields each frame
/// along with its byte offset in the file,
/// stopping after the end of the stream or the first error.
///
/// Because this performs many small reads,
/// using a buffered reader may greatly improve performance
/// when reading from a raw `File`.
pub struct FrameReader<R> {
    reader: R,
    streaminfo: Streaminfo,
    options: DecodeOptions,
    offset: u64,
    failed: bool,
}

impl<R: std::io::Read> FrameReader<R> {
    /// Opens reader with default options
    ///
    /// This assumes the stream is positioned at the start
    /// of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata is invalid
    /// or an I/O error occurs reading it.
    pub fn new(reader: R) -> Result<Self, Error> {
        Self::with_options(reader, DecodeOptions::default())
    }

    /// Opens reader with the given options
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata is invalid
    /// or an I/O error occurs reading it.
    pub fn with_options(mut reader: R, options: DecodeOptions) -> Result<Self, Error> {
        use std::io::Read;

        let (streaminfo, offset) = read_streaminfo(reader.by_ref())?;

        Ok(Self {
            reader,
            streaminfo,
            options,
            offset,
            failed: false,
        })
    }

    /// The file's STREAMINFO block
    #[inline]
    pub fn streaminfo(&self) -> &Streaminfo {
        &self.streaminfo
    }

    /// Byte offset of the next unread byte in the file
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next frame and its byte offset in the file
    ///
    /// Returns `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is malformed,
    /// if its sync word is missing and resyncing is disabled,
    /// or if an I/O error occurs.
    pub fn read_frame(&mut self) -> Result<Option<(Frame, u64)>, Error> {
        use std::io::Read;

        let sync = if self.options.resync {
            match scan_sync(self.reader.by_ref())? {
                Some(SyncScan { sync, skipped }) => {
                    self.offset += skipped;
                    sync
                }
                None => return Ok(None),
            }
        } else {
            match read_sync(self.reader.by_ref())? {
                Some(sync) => sync,
                None => return Ok(None),
            }
        };

        let frame_offset = self.offset;
        let mut capture = CaptureReader::new(self.reader.by_ref());

        match Frame::read(&mut capture, sync, &self.streaminfo, &self.options) {
            Ok(frame) => {
                self.offset += frame.len() as u64;
                Ok(Some((frame, frame_offset)))
            }
            Err(err) => {
                self.offset += 2 + capture.len() as u64;
                log::debug!(
                    "{} frame at offset {frame_offset} failed: {err}",
                    err.stage()
                );
                Err(err)
            }
        }
    }

    /// Returns the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: std::io::Read> Iterator for FrameReader<R> {
    type Item = Result<(Frame, u64), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            // once we hit an error, stop any further reads
            None
        } else {
            match self.read_frame() {
                Ok(frame) => frame.map(Ok),
                Err(err) => {
                    self.failed = true;
                    Some(Err(err))
                }
            }
        }
    }
}

/// Reads a single frame from a packet
///
/// This is for frames delivered one per packet,
/// as in Ogg FLAC, where the packet must begin
/// with a frame's sync word.
/// Any bytes following the frame are ignored.
///
/// # Errors
///
/// Returns [`Error::SyncNotFound`] if the packet
/// doesn't start with a sync word,
/// or an error if the frame is malformed or truncated.
///
/// # Example
/// ```
/// use flac_frames::{Error, decode::read_packet, metadata::Streaminfo};
///
/// let streaminfo = Streaminfo::new(44100, 16, 1);
///
/// assert!(matches!(
///     read_packet(&[0x4F, 0x67, 0x67, 0x53], &streaminfo, &Default::default()),
///     Err(Error::SyncNotFound),
/// ));
/// ```
pub fn read_packet(
    packet: &[u8],
    streaminfo: &Streaminfo,
    options: &DecodeOptions,
) -> Result<Frame, Error> {
    let mut reader = packet;
    let sync: SyncWord = read_sync(&mut reader)?.ok_or(Error::SyncNotFound)?;

    let mut capture = CaptureReader::new(reader);
    let frame = Frame::read(&mut capture, sync, streaminfo, options)?;

    let trailing = capture.into_inner();
    if !trailing.is_empty() {
        log::debug!("ignoring {} bytes after frame in packet", trailing.len());
    }

    Ok(frame)
}

#[test]
fn test_decode_options() {
    let options = DecodeOptions::default();
    assert!(options.resync);
    assert!(options.unadjusted_rice_partitions);

    let options = options.resync(false).unadjusted_rice_partitions(false);
    assert!(!options.resync);
    assert!(!options.unadjusted_rice_partitions);
}

#[test]
fn test_read_packet_errors() {
    let streaminfo = Streaminfo::new(44100, 16, 1);
    let options = DecodeOptions::default();

    assert!(matches!(
        read_packet(&[], &streaminfo, &options),
        Err(Error::SyncNotFound)
    ));

    // truncated after the sync word
    assert!(matches!(
        read_packet(&[0xFF, 0xF8, 0x10], &streaminfo, &options),
        Err(Error::Io(_))
    ));
}
