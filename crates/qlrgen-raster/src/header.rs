//! First-image header reader built on the `tiff` decoder.
//!
//! The decoder wants `Read + Seek` while the raster sits behind an async
//! [`RangeReader`]. [`SparseFile`] answers reads from the ranges fetched so
//! far and remembers the first offset it could not serve; decoding restarts
//! once that range has been fetched. A COG keeps its header at the front of
//! the file, so the initial prefix read is usually the only one.

use bytes::Bytes;
use qlrgen_core::error::{QlrError, Result};
use std::io::{self, Read, Seek, SeekFrom};
use thiserror::Error;
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tiff::TiffResult;

use crate::source::RangeReader;

pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_MODEL_TRANSFORMATION: u16 = 34264;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GEO_DOUBLE_PARAMS: u16 = 34736;
pub const TAG_GEO_ASCII_PARAMS: u16 = 34737;
pub const TAG_GDAL_NODATA: u16 = 42113;

/// Default size of the first read
pub const DEFAULT_PREFIX_LEN: usize = 16 * 1024;

/// Follow-up reads start at this size and double each time
const MIN_FETCH: usize = 16 * 1024;
const MAX_FETCH: usize = 4 << 20;
const MAX_FETCHES: usize = 24;

#[derive(Debug, Error, PartialEq)]
pub enum GeoTiffError {
    #[error("not a readable TIFF: {0}")]
    Decode(String),

    #[error("malformed GeoTIFF: {0}")]
    Malformed(String),
}

/// Tags of the first image that describe a GeoTIFF
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u16,
    pub bits_per_sample: Vec<u64>,
    pub sample_format: Vec<u64>,
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoint: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    pub geo_key_directory: Option<Vec<u64>>,
    pub geo_double_params: Vec<f64>,
    pub geo_ascii_params: String,
    pub nodata: Option<String>,
}

impl ImageHeader {
    fn decode<R: Read + Seek>(reader: R) -> TiffResult<Self> {
        let mut decoder = Decoder::new(reader)?;
        let (width, height) = decoder.dimensions()?;

        let samples_per_pixel = decoder
            .find_tag(Tag::SamplesPerPixel)?
            .map(|value| value.into_u16())
            .transpose()?
            .unwrap_or(1);

        Ok(Self {
            width,
            height,
            samples_per_pixel,
            bits_per_sample: unsigned(&mut decoder, Tag::BitsPerSample)?.unwrap_or_else(|| vec![1]),
            sample_format: unsigned(&mut decoder, Tag::SampleFormat)?.unwrap_or_else(|| vec![1]),
            pixel_scale: floats(&mut decoder, geotiff_tag(TAG_MODEL_PIXEL_SCALE))?,
            tiepoint: floats(&mut decoder, geotiff_tag(TAG_MODEL_TIEPOINT))?,
            transformation: floats(&mut decoder, geotiff_tag(TAG_MODEL_TRANSFORMATION))?,
            geo_key_directory: unsigned(&mut decoder, geotiff_tag(TAG_GEO_KEY_DIRECTORY))?,
            geo_double_params: floats(&mut decoder, geotiff_tag(TAG_GEO_DOUBLE_PARAMS))?
                .unwrap_or_default(),
            geo_ascii_params: ascii(&mut decoder, geotiff_tag(TAG_GEO_ASCII_PARAMS))?
                .unwrap_or_default(),
            nodata: ascii(&mut decoder, geotiff_tag(TAG_GDAL_NODATA))?,
        })
    }
}

/// The decoder keys its directory by known tag names where it has one
fn geotiff_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn unsigned<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<Vec<u64>>> {
    decoder.find_tag(tag)?.map(|value| value.into_u64_vec()).transpose()
}

fn floats<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<Vec<f64>>> {
    decoder.find_tag(tag)?.map(|value| value.into_f64_vec()).transpose()
}

fn ascii<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<String>> {
    decoder.find_tag(tag)?.map(|value| value.into_string()).transpose()
}

/// Fetched byte ranges of a file, readable through `Read + Seek`
#[derive(Debug, Default)]
struct SparseFile {
    segments: Vec<(u64, Bytes)>,
    /// Known once a fetch came back short
    len: Option<u64>,
    position: u64,
    /// First read that fell outside the fetched ranges: offset and size
    missing: Option<(u64, usize)>,
}

impl SparseFile {
    fn new(prefix: Bytes, requested: usize) -> Self {
        let mut file = Self::default();
        file.insert(0, prefix, requested);
        file
    }

    fn insert(&mut self, offset: u64, bytes: Bytes, requested: usize) {
        if bytes.len() < requested {
            let end = offset + bytes.len() as u64;
            self.len = Some(self.len.map_or(end, |len| len.min(end)));
        }
        if !bytes.is_empty() {
            self.segments.push((offset, bytes));
        }
    }

    /// Start a fresh decode attempt
    fn rewind(&mut self) {
        self.position = 0;
        self.missing = None;
    }
}

impl Read for SparseFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.len.is_some_and(|len| self.position >= len) {
            return Ok(0);
        }

        let position = self.position;
        let segment = self
            .segments
            .iter()
            .filter(|(start, bytes)| position >= *start && position < start + bytes.len() as u64)
            .max_by_key(|(start, bytes)| start + bytes.len() as u64);

        match segment {
            Some((start, bytes)) => {
                let from = (position - start) as usize;
                let n = buf.len().min(bytes.len() - from);
                buf[..n].copy_from_slice(&bytes[from..from + n]);
                self.position += n as u64;
                Ok(n)
            }
            None => {
                self.missing.get_or_insert((position, buf.len()));
                Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("bytes at offset {} have not been fetched", position),
                ))
            }
        }
    }
}

impl Seek for SparseFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len.and_then(|len| len.checked_add_signed(delta)),
        };
        let target = target
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek outside the file"))?;
        self.position = target;
        Ok(target)
    }
}

/// Decode the first image header of a TIFF or BigTIFF.
///
/// Bytes that do not form a TIFF give `InvalidRaster`; read failures from the
/// source are passed through.
pub async fn read_image_header(reader: &dyn RangeReader, prefix_len: usize) -> Result<ImageHeader> {
    let location = reader.location();
    let invalid = |e: GeoTiffError| QlrError::invalid_raster(location, e.to_string());

    let prefix = reader.read_range(0, prefix_len).await?;
    let mut file = SparseFile::new(prefix, prefix_len);
    let mut fetches = 1;

    loop {
        file.rewind();
        // Keep only the message; the decoder error is not held across the fetch.
        let outcome = ImageHeader::decode(&mut file).map_err(|e| e.to_string());

        let reason = match (outcome, file.missing.take()) {
            (Ok(header), _) => {
                tracing::debug!(
                    source = %location,
                    width = header.width,
                    height = header.height,
                    fetches,
                    "Read image header"
                );
                return Ok(header);
            }
            (Err(reason), None) => reason,
            (Err(_), Some(_)) if fetches >= MAX_FETCHES => {
                format!("header is spread over more than {} reads", MAX_FETCHES)
            }
            (Err(_), Some((offset, wanted))) => {
                let step = (MIN_FETCH << (fetches - 1).min(8)).min(MAX_FETCH);
                let len = step.max(wanted.min(MAX_FETCH));
                tracing::debug!(
                    source = %location,
                    offset,
                    len,
                    "Header data lies beyond what was read, fetching"
                );
                let bytes = reader.read_range(offset, len).await?;
                fetches += 1;
                file.insert(offset, bytes, len);
                continue;
            }
        };

        return Err(invalid(GeoTiffError::Decode(reason)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRangeReader;
    use async_trait::async_trait;
    use qlrgen_test_utils::{ByteOrder, GeoTiffBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts reads made against a memory source
    struct CountingReader {
        inner: MemoryRangeReader,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl RangeReader for CountingReader {
        async fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_range(offset, len).await
        }

        fn location(&self) -> &str {
            self.inner.location()
        }
    }

    #[test]
    fn test_sparse_file_reads_and_misses() {
        let mut file = SparseFile::new(Bytes::from_static(b"abcdef"), 6);
        file.insert(100, Bytes::from_static(b"xyz"), 16);
        assert_eq!(file.len, Some(103));

        let mut buf = [0u8; 4];
        file.seek(SeekFrom::Start(4)).unwrap();
        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");

        assert!(file.read(&mut buf).is_err());
        assert_eq!(file.missing, Some((6, 4)));

        file.seek(SeekFrom::Start(101)).unwrap();
        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reads_tags_both_byte_orders() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let bytes = GeoTiffBuilder::new(7, 5)
                .bands(3)
                .data_type(16, 1)
                .byte_order(order)
                .pixel_scale(10.0, 20.0)
                .nodata("-1")
                .build();
            let reader = MemoryRangeReader::new("mem.tif", bytes);
            let header = read_image_header(&reader, DEFAULT_PREFIX_LEN).await.unwrap();

            assert_eq!((header.width, header.height), (7, 5));
            assert_eq!(header.samples_per_pixel, 3);
            assert_eq!(header.bits_per_sample, vec![16, 16, 16]);
            assert_eq!(header.pixel_scale, Some(vec![10.0, 20.0, 0.0]));
            assert_eq!(header.nodata.as_deref(), Some("-1"));
            assert_eq!(header.geo_key_directory, None);
        }
    }

    #[tokio::test]
    async fn test_reads_beyond_prefix() {
        let bytes = GeoTiffBuilder::new(4, 4).pixel_scale(1.0, 1.0).ifd_padding(40_000).build();
        let reader = CountingReader {
            inner: MemoryRangeReader::new("mem.tif", bytes),
            reads: AtomicUsize::new(0),
        };

        let header = read_image_header(&reader, 1024).await.unwrap();

        assert_eq!(header.pixel_scale, Some(vec![1.0, 1.0, 0.0]));
        assert!(reader.reads.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_small_file_takes_one_read() {
        let reader = CountingReader {
            inner: MemoryRangeReader::new("mem.tif", GeoTiffBuilder::new(4, 4).build()),
            reads: AtomicUsize::new(0),
        };
        read_image_header(&reader, DEFAULT_PREFIX_LEN).await.unwrap();
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_truncated_and_foreign_files_are_invalid() {
        let mut truncated = GeoTiffBuilder::new(4, 4).byte_order(ByteOrder::Big).build();
        truncated.truncate(20);

        for bytes in [truncated, b"GIF89a, not a tiff".to_vec(), Vec::new()] {
            let reader = MemoryRangeReader::new("mem.tif", bytes);
            let err = read_image_header(&reader, DEFAULT_PREFIX_LEN).await.unwrap_err();
            assert!(matches!(err, QlrError::InvalidRaster { .. }), "{err:?}");
        }
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_bytes_never_panic(mut bytes in proptest::collection::vec(any::<u8>(), 0..512), with_magic in any::<bool>()) {
                // Bias half the cases towards a valid header so the IFD walk is exercised.
                if bytes.len() >= 8 && with_magic {
                    bytes[..4].copy_from_slice(b"II*\0");
                }
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let reader = MemoryRangeReader::new("mem.tif", bytes);
                let result = runtime.block_on(read_image_header(&reader, 64));
                if let Err(err) = result {
                    prop_assert!(matches!(err, QlrError::InvalidRaster { .. }));
                }
            }
        }
    }
}
