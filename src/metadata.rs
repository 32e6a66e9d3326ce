// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling a FLAC file's metadata blocks
//!
//! Only STREAMINFO is parsed, since frame headers may defer
//! their sample rate and bits-per-sample to it.
//! All other blocks are skipped.

use crate::Error;
use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, FromBitStream, ToBitStream};
use std::num::NonZero;

/// A FLAC metadata block header
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 1    | `last` | final metadata block in file |
/// | 7    | `block_type` | type of block |
/// | 24   | `size` | block size, in bytes |
///
/// # Example
/// ```
/// use bitstream_io::{BitReader, BitRead, BigEndian};
/// use flac_frames::metadata::{BlockHeader, BlockType};
///
/// let data: &[u8] = &[0b1_0000000, 0x00, 0x00, 0x22];
/// let mut r = BitReader::endian(data, BigEndian);
/// assert_eq!(
///     r.parse::<BlockHeader>().unwrap(),
///     BlockHeader {
///         last: true,
///         block_type: BlockType::Streaminfo,
///         size: 0x00_00_22,
///     },
/// );
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockHeader {
    /// Whether we are the final block
    pub last: bool,
    /// Our block type
    pub block_type: BlockType,
    /// Our block size, in bytes
    pub size: u32,
}

impl BlockHeader {
    /// The largest possible block size, in bytes (2²⁴ - 1)
    pub const MAX_SIZE: u32 = (1 << 24) - 1;
}

impl FromBitStream for BlockHeader {
    type Error = Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        Ok(Self {
            last: r.read::<1, _>()?,
            block_type: r.parse()?,
            size: r.read::<24, _>()?,
        })
    }
}

impl ToBitStream for BlockHeader {
    type Error = Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        w.write::<1, _>(self.last)?;
        w.build(&self.block_type)?;
        w.write::<24, _>(self.size)?;
        Ok(())
    }
}

/// A FLAC metadata block type
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockType {
    /// The STREAMINFO block
    Streaminfo,
    /// The PADDING block
    Padding,
    /// The APPLICATION block
    Application,
    /// The SEEKTABLE block
    SeekTable,
    /// The VORBIS_COMMENT block
    VorbisComment,
    /// The CUESHEET block
    Cuesheet,
    /// The PICTURE block
    Picture,
    /// A reserved or invalid block type
    Reserved(u8),
}

impl FromBitStream for BlockType {
    type Error = Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        Ok(match r.read::<7, u8>()? {
            0 => Self::Streaminfo,
            1 => Self::Padding,
            2 => Self::Application,
            3 => Self::SeekTable,
            4 => Self::VorbisComment,
            5 => Self::Cuesheet,
            6 => Self::Picture,
            t => Self::Reserved(t),
        })
    }
}

impl ToBitStream for BlockType {
    type Error = Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        w.write::<7, u8>(match self {
            Self::Streaminfo => 0,
            Self::Padding => 1,
            Self::Application => 2,
            Self::SeekTable => 3,
            Self::VorbisComment => 4,
            Self::Cuesheet => 5,
            Self::Picture => 6,
            Self::Reserved(t) => *t,
        })
        .map_err(Error::Io)
    }
}

/// A STREAMINFO metadata block
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 16   | `minimum_block_size` | minimum block size, in samples |
/// | 16   | `maximum_block_size` | maximum block size, in samples |
/// | 24   | `minimum_frame_size` | minimum frame size, in bytes |
/// | 24   | `maximum_frame_size` | maximum frame size, in bytes |
/// | 20   | `sample_rate` | sample rate, in Hz |
/// | 3    | `channels` | channel count - 1 |
/// | 5    | `bits_per_sample` | bits-per-sample - 1 |
/// | 36   | `total_samples` | total channel-independent samples |
/// | 16×8 | `md5` | MD5 hash of decoded audio |
///
/// # Example
/// ```
/// use bitstream_io::{BitReader, BitRead, BigEndian};
/// use flac_frames::metadata::Streaminfo;
/// use std::num::NonZero;
///
/// let data: &[u8] = &[
///     0x10, 0x00,
///     0x10, 0x00,
///     0x00, 0x00, 0x0c,
///     0x00, 0x00, 0x0c,
///     0b00001010, 0b11000100, 0b0100_000_0, 0b1111_0000,
///     0b00000000, 0b00000000, 0b00000000, 0b01010000,
///     0xf5, 0x3f, 0x86, 0x87, 0x6d, 0xcd, 0x77, 0x83,
///     0x22, 0x5c, 0x93, 0xba, 0x8a, 0x93, 0x8c, 0x7d,
/// ];
///
/// let mut r = BitReader::endian(data, BigEndian);
/// let streaminfo = r.parse::<Streaminfo>().unwrap();
/// assert_eq!(streaminfo.minimum_block_size, 4096);
/// assert_eq!(streaminfo.minimum_frame_size, NonZero::new(12));
/// assert_eq!(streaminfo.sample_rate, 44100);
/// assert_eq!(streaminfo.channels, 1);
/// assert_eq!(streaminfo.bits_per_sample, 16);
/// assert_eq!(streaminfo.total_samples, NonZero::new(80));
/// assert!(streaminfo.md5.is_some());
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Streaminfo {
    /// The minimum block size (in samples) used in the stream,
    /// excluding the last block.
    pub minimum_block_size: u16,
    /// The maximum block size (in samples) used in the stream,
    /// excluding the last block.
    pub maximum_block_size: u16,
    /// The minimum framesize (in bytes) used in the stream.
    ///
    /// `None` indicates the value is unknown.
    pub minimum_frame_size: Option<NonZero<u32>>,
    /// The maximum framesize (in bytes) used in the stream.
    ///
    /// `None` indicates the value is unknown.
    pub maximum_frame_size: Option<NonZero<u32>>,
    /// Sample rate in Hz
    ///
    /// 0 indicates a non-audio stream.
    pub sample_rate: u32,
    /// Number of channels, from 1 to 8
    pub channels: u8,
    /// Number of bits-per-sample, from 1 to 32
    pub bits_per_sample: u32,
    /// Total number of interchannel samples in stream.
    ///
    /// `None` indicates the value is unknown.
    pub total_samples: Option<NonZero<u64>>,
    /// MD5 hash of unencoded audio data.
    ///
    /// `None` indicates the value is unknown.
    pub md5: Option<[u8; 16]>,
}

impl Streaminfo {
    /// The size of a STREAMINFO block, in bytes
    pub const SIZE: u32 = 34;

    /// Builds STREAMINFO from its stream parameters
    ///
    /// Frame headers may refer back to the sample rate
    /// and bits-per-sample for their own values.
    /// Everything else is left unknown.
    /// This is useful for frames not delivered in a native FLAC file,
    /// whose STREAMINFO arrives by some other route.
    pub fn new(sample_rate: u32, bits_per_sample: u32, channels: u8) -> Self {
        Self {
            minimum_block_size: 0,
            maximum_block_size: 0,
            minimum_frame_size: None,
            maximum_frame_size: None,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples: None,
            md5: None,
        }
    }
}

impl FromBitStream for Streaminfo {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        Ok(Self {
            minimum_block_size: r.read_to()?,
            maximum_block_size: r.read_to()?,
            minimum_frame_size: r.read::<24, _>()?,
            maximum_frame_size: r.read::<24, _>()?,
            sample_rate: r.read::<20, _>()?,
            channels: r.read::<3, u8>()? + 1,
            bits_per_sample: r.read::<5, u32>()? + 1,
            total_samples: r.read::<36, _>()?,
            md5: r
                .read_to()
                .map(|md5: [u8; 16]| md5.iter().any(|b| *b != 0).then_some(md5))?,
        })
    }
}

impl ToBitStream for Streaminfo {
    type Error = std::io::Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        w.write_from(self.minimum_block_size)?;
        w.write_from(self.maximum_block_size)?;
        w.write::<24, _>(self.minimum_frame_size)?;
        w.write::<24, _>(self.maximum_frame_size)?;
        w.write::<20, _>(self.sample_rate)?;
        w.write::<3, u8>(self.channels.saturating_sub(1))?;
        w.write::<5, u32>(self.bits_per_sample.saturating_sub(1))?;
        w.write::<36, _>(self.total_samples)?;
        w.write_from(self.md5.unwrap_or([0; 16]))?;
        Ok(())
    }
}

/// Reads a native FLAC file's metadata blocks,
/// returning its STREAMINFO and the total size
/// of the metadata in bytes, including the `fLaC` tag
///
/// The stream is left positioned at the first frame.
///
/// Because this may perform many small reads,
/// using a buffered reader may greatly improve performance
/// when reading from a raw `File`.
///
/// # Errors
///
/// Returns [`Error::MissingFlacTag`] if the stream
/// doesn't start with `fLaC`,
/// [`Error::MissingStreaminfo`] if STREAMINFO isn't the first block,
/// [`Error::MultipleStreaminfo`] if it occurs more than once,
/// [`Error::InvalidMetadataBlockSize`] if it's the wrong size,
/// or any I/O error from the underlying stream.
pub fn read_streaminfo<R: std::io::Read>(mut reader: R) -> Result<(Streaminfo, u64), Error> {
    use std::io::Read;

    let mut tag = [0; 4];
    reader.read_exact(&mut tag)?;
    if &tag != b"fLaC" {
        return Err(Error::MissingFlacTag);
    }
    let mut metadata_len = tag.len() as u64;

    let header = BitReader::endian(reader.by_ref(), BigEndian).parse::<BlockHeader>()?;
    if header.block_type != BlockType::Streaminfo {
        return Err(Error::MissingStreaminfo);
    }
    if header.size != Streaminfo::SIZE {
        return Err(Error::InvalidMetadataBlockSize);
    }

    let streaminfo = BitReader::endian(reader.by_ref(), BigEndian).parse::<Streaminfo>()?;
    metadata_len += 4 + u64::from(header.size);

    let mut last = header.last;
    while !last {
        let header = BitReader::endian(reader.by_ref(), BigEndian).parse::<BlockHeader>()?;
        match header.block_type {
            BlockType::Streaminfo => return Err(Error::MultipleStreaminfo),
            block_type => {
                let skipped = std::io::copy(
                    &mut reader.by_ref().take(header.size.into()),
                    &mut std::io::sink(),
                )?;
                if skipped != u64::from(header.size) {
                    return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
                }
                log::debug!("skipped {block_type:?} block of {} bytes", header.size);
            }
        }
        metadata_len += 4 + u64::from(header.size);
        last = header.last;
    }

    Ok((streaminfo, metadata_len))
}

#[cfg(test)]
fn test_metadata(blocks: &[(bool, BlockType, Vec<u8>)]) -> Vec<u8> {
    use bitstream_io::BitWriter;

    let mut w = BitWriter::endian(b"fLaC".to_vec(), BigEndian);
    for (last, block_type, data) in blocks {
        w.build(&BlockHeader {
            last: *last,
            block_type: *block_type,
            size: data.len() as u32,
        })
        .unwrap();
        w.write_bytes(data).unwrap();
    }
    w.into_writer()
}

#[cfg(test)]
fn test_streaminfo() -> Vec<u8> {
    use bitstream_io::BitWriter;

    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.build(&Streaminfo {
        minimum_block_size: 4096,
        maximum_block_size: 4096,
        minimum_frame_size: NonZero::new(14),
        maximum_frame_size: NonZero::new(3000),
        sample_rate: 48000,
        channels: 2,
        bits_per_sample: 24,
        total_samples: NonZero::new(1 << 33),
        md5: None,
    })
    .unwrap();
    w.into_writer()
}

#[test]
fn test_streaminfo_roundtrip() {
    let data = test_streaminfo();
    assert_eq!(data.len(), Streaminfo::SIZE as usize);

    let streaminfo = BitReader::endian(data.as_slice(), BigEndian)
        .parse::<Streaminfo>()
        .unwrap();
    assert_eq!(streaminfo.channels, 2);
    assert_eq!(streaminfo.bits_per_sample, 24);
    assert_eq!(streaminfo.sample_rate, 48000);
    assert_eq!(streaminfo.total_samples, NonZero::new(1 << 33));
    assert_eq!(streaminfo.md5, None);
}

#[test]
fn test_read_streaminfo() {
    let streaminfo = test_streaminfo();

    let mut data = test_metadata(&[
        (false, BlockType::Streaminfo, streaminfo.clone()),
        (false, BlockType::Padding, vec![0; 10]),
        (false, BlockType::Reserved(100), vec![1, 2, 3]),
        (true, BlockType::VorbisComment, vec![0; 8]),
    ]);
    let metadata_len = data.len() as u64;
    data.extend_from_slice(&[0xFF, 0xF8]);

    let mut r = data.as_slice();
    let (parsed, len) = read_streaminfo(&mut r).unwrap();
    assert_eq!(parsed.sample_rate, 48000);
    assert_eq!(len, metadata_len);
    assert_eq!(len, 4 + 4 + 34 + 4 + 10 + 4 + 3 + 4 + 8);
    assert_eq!(r, &[0xFF, 0xF8]);
}

#[test]
fn test_read_streaminfo_errors() {
    let streaminfo = test_streaminfo();

    assert!(matches!(
        read_streaminfo(&b"RIFF\x00\x00\x00\x00"[..]),
        Err(Error::MissingFlacTag)
    ));

    assert!(matches!(read_streaminfo(&b"fL"[..]), Err(Error::Io(_))));

    assert!(matches!(
        read_streaminfo(
            test_metadata(&[
                (false, BlockType::Padding, vec![0; 4]),
                (true, BlockType::Streaminfo, streaminfo.clone()),
            ])
            .as_slice()
        ),
        Err(Error::MissingStreaminfo)
    ));

    assert!(matches!(
        read_streaminfo(
            test_metadata(&[
                (false, BlockType::Streaminfo, streaminfo.clone()),
                (true, BlockType::Streaminfo, streaminfo.clone()),
            ])
            .as_slice()
        ),
        Err(Error::MultipleStreaminfo)
    ));

    assert!(matches!(
        read_streaminfo(
            test_metadata(&[(true, BlockType::Streaminfo, streaminfo[0..30].to_vec())]).as_slice()
        ),
        Err(Error::InvalidMetadataBlockSize)
    ));

    // a skipped block cut short
    let mut data = test_metadata(&[
        (false, BlockType::Streaminfo, streaminfo.clone()),
        (true, BlockType::Padding, vec![0; 10]),
    ]);
    data.truncate(data.len() - 1);
    assert!(matches!(read_streaminfo(data.as_slice()), Err(Error::Io(_))));
}
