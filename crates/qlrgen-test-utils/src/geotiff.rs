//! Synthetic GeoTIFF writer.
//!
//! Produces small single-strip TIFF or BigTIFF files with whatever
//! georeferencing tags a test needs. The pixel data is all zeros; only the
//! header and first IFD matter to the metadata reader.
//!
//! Little-endian files are written with the `tiff` encoder. The encoder only
//! writes little-endian and decides the layout itself, so big-endian files
//! and files with a padded layout are laid out by hand.

use std::io::{self, Cursor, Seek, Write};
use std::path::Path;

use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::TiffResult;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_DOUBLE: u16 = 12;
const TYPE_LONG8: u16 = 16;

const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_GEO_DOUBLE_PARAMS: u16 = 34736;
const TAG_GEO_ASCII_PARAMS: u16 = 34737;

/// Byte order marker written into the TIFF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `II`
    Little,
    /// `MM`
    Big,
}

/// Value of a single GeoKey
#[derive(Debug, Clone, PartialEq)]
pub enum GeoKey {
    Short(u16),
    Double(f64),
    Ascii(String),
}

/// Builder for a synthetic GeoTIFF.
///
/// # Example
///
/// ```
/// use qlrgen_test_utils::GeoTiffBuilder;
///
/// let bytes = GeoTiffBuilder::new(10, 10)
///     .with_extent(500000.0, 5900000.0, 500100.0, 5900100.0)
///     .projected_epsg(32630)
///     .build();
/// assert_eq!(&bytes[..4], b"II*\0");
/// ```
#[derive(Debug, Clone)]
pub struct GeoTiffBuilder {
    width: u32,
    height: u32,
    bands: u16,
    bits_per_sample: u16,
    sample_format: u16,
    byte_order: ByteOrder,
    big_tiff: bool,
    pixel_scale: Option<[f64; 3]>,
    tiepoint: Option<[f64; 6]>,
    transformation: Option<[f64; 16]>,
    geo_keys: Vec<(u16, GeoKey)>,
    nodata: Option<String>,
    ifd_padding: usize,
    value_padding: usize,
}

impl GeoTiffBuilder {
    /// Single band uint8 raster with no georeferencing
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bands: 1,
            bits_per_sample: 8,
            sample_format: 1,
            byte_order: ByteOrder::Little,
            big_tiff: false,
            pixel_scale: None,
            tiepoint: None,
            transformation: None,
            geo_keys: Vec::new(),
            nodata: None,
            ifd_padding: 0,
            value_padding: 0,
        }
    }

    pub fn bands(mut self, bands: u16) -> Self {
        self.bands = bands;
        self
    }

    /// BitsPerSample and SampleFormat (1 unsigned, 2 signed, 3 float)
    pub fn data_type(mut self, bits_per_sample: u16, sample_format: u16) -> Self {
        self.bits_per_sample = bits_per_sample;
        self.sample_format = sample_format;
        self
    }

    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn big_tiff(mut self) -> Self {
        self.big_tiff = true;
        self
    }

    pub fn pixel_scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.pixel_scale = Some([scale_x, scale_y, 0.0]);
        self
    }

    /// Tie raster position (i, j) to model position (x, y)
    pub fn tiepoint(mut self, i: f64, j: f64, x: f64, y: f64) -> Self {
        self.tiepoint = Some([i, j, 0.0, x, y, 0.0]);
        self
    }

    /// ModelTransformationTag, row-major 4x4
    pub fn transformation(mut self, matrix: [f64; 16]) -> Self {
        self.transformation = Some(matrix);
        self
    }

    /// North-up georeferencing covering the given extent exactly
    pub fn with_extent(self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        let scale_x = (max_x - min_x) / f64::from(self.width);
        let scale_y = (max_y - min_y) / f64::from(self.height);
        self.pixel_scale(scale_x, scale_y).tiepoint(0.0, 0.0, min_x, max_y)
    }

    /// Set a GeoKey, replacing any earlier value for the same key
    pub fn geo_key(mut self, id: u16, value: GeoKey) -> Self {
        self.geo_keys.retain(|(existing, _)| *existing != id);
        self.geo_keys.push((id, value));
        self
    }

    /// Projected model with an EPSG ProjectedCSTypeGeoKey
    pub fn projected_epsg(self, code: u16) -> Self {
        self.geo_key(1024, GeoKey::Short(1))
            .geo_key(1025, GeoKey::Short(1))
            .geo_key(3072, GeoKey::Short(code))
    }

    /// Geographic model with an EPSG GeographicTypeGeoKey
    pub fn geographic_epsg(self, code: u16) -> Self {
        self.geo_key(1024, GeoKey::Short(2))
            .geo_key(1025, GeoKey::Short(1))
            .geo_key(2048, GeoKey::Short(code))
    }

    /// RasterPixelIsPoint
    pub fn pixel_is_point(self) -> Self {
        self.geo_key(1025, GeoKey::Short(2))
    }

    pub fn citation(self, key: u16, text: &str) -> Self {
        self.geo_key(key, GeoKey::Ascii(text.to_string()))
    }

    pub fn nodata(mut self, nodata: &str) -> Self {
        self.nodata = Some(nodata.to_string());
        self
    }

    /// Zero bytes between the header and the IFD
    pub fn ifd_padding(mut self, bytes: usize) -> Self {
        self.ifd_padding = bytes;
        self
    }

    /// Zero bytes between the IFD and the out-of-line tag values
    pub fn value_padding(mut self, bytes: usize) -> Self {
        self.value_padding = bytes;
        self
    }

    /// Serialize the file
    pub fn build(&self) -> Vec<u8> {
        let padded = self.ifd_padding > 0 || self.value_padding > 0;
        if self.byte_order == ByteOrder::Big || padded {
            return self.build_by_hand();
        }

        let mut cursor = Cursor::new(Vec::new());
        let encoded = if self.big_tiff {
            TiffEncoder::new_big(&mut cursor).and_then(|mut encoder| {
                let mut dir = encoder.image_directory()?;
                self.write_tags(&mut dir)?;
                let offset = dir.write_data(self.strip().as_slice())?;
                dir.write_tag(Tag::StripOffsets, offset)?;
                dir.finish()
            })
        } else {
            TiffEncoder::new(&mut cursor).and_then(|mut encoder| {
                let mut dir = encoder.image_directory()?;
                self.write_tags(&mut dir)?;
                let offset = dir.write_data(self.strip().as_slice())?;
                let offset = u32::try_from(offset).expect("test file exceeds 4 GiB");
                dir.write_tag(Tag::StripOffsets, offset)?;
                dir.finish()
            })
        };
        encoded.expect("failed to encode synthetic GeoTIFF");
        cursor.into_inner()
    }

    /// Every tag except StripOffsets, which needs the data offset
    fn write_tags<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<W, K>,
    ) -> TiffResult<()> {
        let per_band = |value: u16| vec![value; usize::from(self.bands)];

        dir.write_tag(Tag::ImageWidth, self.width)?;
        dir.write_tag(Tag::ImageLength, self.height)?;
        dir.write_tag(Tag::BitsPerSample, per_band(self.bits_per_sample).as_slice())?;
        dir.write_tag(Tag::Compression, 1u16)?;
        dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
        dir.write_tag(Tag::SamplesPerPixel, self.bands)?;
        dir.write_tag(Tag::RowsPerStrip, self.height)?;
        dir.write_tag(Tag::StripByteCounts, self.strip_len() as u32)?;
        dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
        dir.write_tag(Tag::SampleFormat, per_band(self.sample_format).as_slice())?;
        if self.bands > 1 {
            let extra_samples = vec![0u16; usize::from(self.bands) - 1];
            dir.write_tag(Tag::ExtraSamples, extra_samples.as_slice())?;
        }

        if let Some(scale) = &self.pixel_scale {
            dir.write_tag(Tag::Unknown(33550), scale.as_slice())?;
        }
        if let Some(tiepoint) = &self.tiepoint {
            dir.write_tag(Tag::Unknown(33922), tiepoint.as_slice())?;
        }
        if let Some(matrix) = &self.transformation {
            dir.write_tag(Tag::Unknown(34264), matrix.as_slice())?;
        }
        if !self.geo_keys.is_empty() {
            let (directory, doubles, ascii) = self.geo_key_params();
            dir.write_tag(Tag::Unknown(34735), directory.as_slice())?;
            if !doubles.is_empty() {
                dir.write_tag(Tag::Unknown(TAG_GEO_DOUBLE_PARAMS), doubles.as_slice())?;
            }
            if !ascii.is_empty() {
                dir.write_tag(Tag::Unknown(TAG_GEO_ASCII_PARAMS), ascii.as_str())?;
            }
        }
        if let Some(nodata) = &self.nodata {
            dir.write_tag(Tag::Unknown(42113), nodata.as_str())?;
        }
        Ok(())
    }

    fn build_by_hand(&self) -> Vec<u8> {
        let mut entries = self.entries();
        entries.sort_by_key(|entry| entry.tag);

        let header_len = if self.big_tiff { 16 } else { 8 };
        let (entry_len, count_len, next_len, inline_len) =
            if self.big_tiff { (20, 8, 8, 8) } else { (12, 2, 4, 4) };

        let ifd_offset = align(header_len + self.ifd_padding);
        let ifd_len = count_len + entries.len() * entry_len + next_len;
        let mut value_offset = align(ifd_offset + ifd_len + self.value_padding);

        let mut offsets = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.payload.len() > inline_len {
                offsets.push(Some(value_offset));
                value_offset = align(value_offset + entry.payload.len());
            } else {
                offsets.push(None);
            }
        }
        let pixel_offset = value_offset;

        // The strip offset is always inline so patching it does not move anything.
        for entry in entries.iter_mut().filter(|e| e.tag == TAG_STRIP_OFFSETS) {
            let mut w = Writer::new(self.byte_order);
            if self.big_tiff {
                w.u64(pixel_offset as u64);
            } else {
                w.u32(pixel_offset as u32);
            }
            entry.payload = w.bytes;
        }

        let mut out = Writer::new(self.byte_order);
        out.bytes.extend_from_slice(match self.byte_order {
            ByteOrder::Little => b"II",
            ByteOrder::Big => b"MM",
        });
        if self.big_tiff {
            out.u16(43);
            out.u16(8);
            out.u16(0);
            out.u64(ifd_offset as u64);
        } else {
            out.u16(42);
            out.u32(ifd_offset as u32);
        }
        out.pad_to(ifd_offset);

        if self.big_tiff {
            out.u64(entries.len() as u64);
        } else {
            out.u16(entries.len() as u16);
        }
        for (entry, offset) in entries.iter().zip(&offsets) {
            out.u16(entry.tag);
            out.u16(entry.field_type);
            if self.big_tiff {
                out.u64(entry.count as u64);
            } else {
                out.u32(entry.count);
            }
            match offset {
                Some(offset) if self.big_tiff => out.u64(*offset as u64),
                Some(offset) => out.u32(*offset as u32),
                None => {
                    let end = out.bytes.len() + inline_len;
                    out.bytes.extend_from_slice(&entry.payload);
                    out.pad_to(end);
                }
            }
        }
        if self.big_tiff {
            out.u64(0);
        } else {
            out.u32(0);
        }

        for (entry, offset) in entries.iter().zip(&offsets) {
            if let Some(offset) = offset {
                out.pad_to(*offset);
                out.bytes.extend_from_slice(&entry.payload);
            }
        }
        out.pad_to(pixel_offset);
        out.bytes.extend_from_slice(&self.strip());

        out.bytes
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.build())
    }

    fn strip_len(&self) -> usize {
        self.width as usize
            * self.height as usize
            * usize::from(self.bands)
            * usize::from(self.bits_per_sample / 8)
    }

    fn strip(&self) -> Vec<u8> {
        vec![0; self.strip_len()]
    }

    fn entries(&self) -> Vec<Entry> {
        let order = self.byte_order;
        let per_band = |value: u16| vec![value; usize::from(self.bands)];

        let mut entries = vec![
            Entry::longs(order, 256, &[self.width]),
            Entry::longs(order, 257, &[self.height]),
            Entry::shorts(order, 258, &per_band(self.bits_per_sample)),
            Entry::shorts(order, 259, &[1]),
            Entry::shorts(order, 262, &[if self.bands >= 3 { 2 } else { 1 }]),
            Entry {
                tag: TAG_STRIP_OFFSETS,
                field_type: if self.big_tiff { TYPE_LONG8 } else { TYPE_LONG },
                count: 1,
                payload: Vec::new(),
            },
            Entry::shorts(order, 277, &[self.bands]),
            Entry::longs(order, 278, &[self.height]),
            Entry::longs(order, 279, &[self.strip_len() as u32]),
            Entry::shorts(order, 284, &[1]),
            Entry::shorts(order, 339, &per_band(self.sample_format)),
        ];

        if let Some(scale) = &self.pixel_scale {
            entries.push(Entry::doubles(order, 33550, scale));
        }
        if let Some(tiepoint) = &self.tiepoint {
            entries.push(Entry::doubles(order, 33922, tiepoint));
        }
        if let Some(matrix) = &self.transformation {
            entries.push(Entry::doubles(order, 34264, matrix));
        }
        if !self.geo_keys.is_empty() {
            entries.extend(self.geo_key_entries());
        }
        if let Some(nodata) = &self.nodata {
            entries.push(Entry::ascii(42113, nodata));
        }

        entries
    }

    /// GeoKeyDirectory plus the double and ASCII parameter tags it points into
    fn geo_key_entries(&self) -> Vec<Entry> {
        let order = self.byte_order;
        let (directory, doubles, ascii) = self.geo_key_params();

        let mut entries = vec![Entry::shorts(order, 34735, &directory)];
        if !doubles.is_empty() {
            entries.push(Entry::doubles(order, TAG_GEO_DOUBLE_PARAMS, &doubles));
        }
        if !ascii.is_empty() {
            entries.push(Entry::ascii(TAG_GEO_ASCII_PARAMS, &ascii));
        }
        entries
    }

    /// Key directory, double params and ASCII params, keys sorted by id
    fn geo_key_params(&self) -> (Vec<u16>, Vec<f64>, String) {
        let mut keys = self.geo_keys.clone();
        keys.sort_by_key(|(id, _)| *id);

        let mut directory = vec![1, 1, 0, keys.len() as u16];
        let mut doubles = Vec::new();
        let mut ascii = String::new();

        for (id, value) in &keys {
            match value {
                GeoKey::Short(v) => directory.extend([*id, 0, 1, *v]),
                GeoKey::Double(v) => {
                    directory.extend([*id, TAG_GEO_DOUBLE_PARAMS, 1, doubles.len() as u16]);
                    doubles.push(*v);
                }
                GeoKey::Ascii(text) => {
                    let count = text.len() as u16 + 1;
                    directory.extend([*id, TAG_GEO_ASCII_PARAMS, count, ascii.len() as u16]);
                    ascii.push_str(text);
                    ascii.push('|');
                }
            }
        }

        (directory, doubles, ascii)
    }
}

#[derive(Debug)]
struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    payload: Vec<u8>,
}

impl Entry {
    fn shorts(order: ByteOrder, tag: u16, values: &[u16]) -> Self {
        let mut w = Writer::new(order);
        values.iter().for_each(|v| w.u16(*v));
        Self {
            tag,
            field_type: TYPE_SHORT,
            count: values.len() as u32,
            payload: w.bytes,
        }
    }

    fn longs(order: ByteOrder, tag: u16, values: &[u32]) -> Self {
        let mut w = Writer::new(order);
        values.iter().for_each(|v| w.u32(*v));
        Self {
            tag,
            field_type: TYPE_LONG,
            count: values.len() as u32,
            payload: w.bytes,
        }
    }

    fn doubles(order: ByteOrder, tag: u16, values: &[f64]) -> Self {
        let mut w = Writer::new(order);
        values.iter().for_each(|v| w.f64(*v));
        Self {
            tag,
            field_type: TYPE_DOUBLE,
            count: values.len() as u32,
            payload: w.bytes,
        }
    }

    fn ascii(tag: u16, text: &str) -> Self {
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        Self {
            tag,
            field_type: TYPE_ASCII,
            count: payload.len() as u32,
            payload,
        }
    }
}

struct Writer {
    order: ByteOrder,
    bytes: Vec<u8>,
}

impl Writer {
    fn new(order: ByteOrder) -> Self {
        Self {
            order,
            bytes: Vec::new(),
        }
    }

    fn u16(&mut self, v: u16) {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn u32(&mut self, v: u32) {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn u64(&mut self, v: u64) {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn f64(&mut self, v: f64) {
        self.u64(v.to_bits());
    }

    fn pad_to(&mut self, len: usize) {
        if self.bytes.len() < len {
            self.bytes.resize(len, 0);
        }
    }
}

fn align(offset: usize) -> usize {
    (offset + 1) & !1
}
